use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use rideshare_core::repository::{CommitOutcome, RideSnapshot, RideStore, RideWrite};
use rideshare_core::{BookingError, BookingResult};

/// Bounded read-validate-commit retry for optimistic ride writes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Default::default()
        }
    }

    /// Upper bound of the delay after the given failed attempt (1-based): doubles
    /// each time, capped.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Jittered delay between half the ceiling and the full ceiling, so writers that
    /// lost the same race do not all re-read the ride at the same instant.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.backoff_ceiling(attempt).mul_f64(jitter)
    }

    /// Snapshot the ride, let `plan` validate it and produce the write, commit it
    /// conditionally. On a version conflict the whole cycle starts over; business
    /// rejections from `plan` end the loop immediately.
    pub async fn commit<T, F>(
        &self,
        store: &dyn RideStore,
        ride_id: Uuid,
        operation: &'static str,
        mut plan: F,
    ) -> BookingResult<(T, RideWrite)>
    where
        F: FnMut(&RideSnapshot) -> BookingResult<(RideWrite, T)>,
    {
        for attempt in 1..=self.max_attempts {
            let snapshot = store
                .snapshot(ride_id)
                .await?
                .ok_or(BookingError::RideNotFound)?;

            let (write, outcome) = plan(&snapshot)?;

            match store.commit(write.clone()).await? {
                CommitOutcome::Committed { version } => {
                    debug!(%ride_id, operation, attempt, version, "Ride write committed");
                    return Ok((outcome, write));
                }
                CommitOutcome::Conflict => {
                    warn!(%ride_id, operation, attempt, "Ride changed underneath, retrying");
                    if attempt < self.max_attempts {
                        sleep(self.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        Err(BookingError::TransientConflict {
            attempts: self.max_attempts,
        })
    }
}
