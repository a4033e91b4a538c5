use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use rideshare_core::clock::Clock;
use rideshare_core::collaborators::ConversationClient;
use rideshare_core::identity::Caller;
use rideshare_core::repository::{JoinChange, RideSnapshot, RideStore, RideWrite};
use rideshare_core::{BookingError, BookingResult};
use rideshare_shared::{Ride, RideStatus};

use crate::fanout::{NotificationFanout, RideEvent};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize)]
pub struct CancelResult {
    pub ride: Ride,
    pub notified: Vec<String>,
    /// `None` when the join cleanup failed and was left for later.
    pub joins_removed: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteResult {
    pub ride: Ride,
}

/// Driver-initiated transitions out of Active.
///
/// Active → Cancelled requires a note and cascades to riders; Active → Completed
/// leaves the Join records in place as history.
pub struct RideLifecycle {
    rides: Arc<dyn RideStore>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    fanout: NotificationFanout,
    conversations: Arc<dyn ConversationClient>,
}

impl RideLifecycle {
    pub fn new(
        rides: Arc<dyn RideStore>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        fanout: NotificationFanout,
        conversations: Arc<dyn ConversationClient>,
    ) -> Self {
        Self {
            rides,
            retry,
            clock,
            fanout,
            conversations,
        }
    }

    fn check_transition(snapshot: &RideSnapshot, caller: &Caller) -> BookingResult<()> {
        if !snapshot.ride.is_owned_by(&caller.user_id) {
            return Err(BookingError::NotAuthorized);
        }
        if !snapshot.ride.is_active() {
            return Err(BookingError::InvalidState {
                status: snapshot.ride.status,
            });
        }
        Ok(())
    }

    /// Cancel a ride. Once the status commit succeeds the ride stays cancelled;
    /// notifying riders, dropping joins and flagging the conversation are each
    /// attempted once and only logged on failure.
    pub async fn cancel(&self, ride_id: Uuid, caller: &Caller, note: &str) -> BookingResult<CancelResult> {
        let note = note.trim();
        if note.is_empty() {
            return Err(BookingError::NoteRequired);
        }
        let now = self.clock.now();

        let ((), write) = self
            .retry
            .commit(self.rides.as_ref(), ride_id, "cancel", |snapshot| {
                Self::check_transition(snapshot, caller)?;
                let mut ride = snapshot.ride.clone();
                ride.status = RideStatus::Cancelled;
                ride.cancellation_note = Some(note.to_string());
                ride.cancelled_at = Some(now);
                ride.cancelled_by = Some(caller.user_id.clone());
                let write = RideWrite {
                    expected_version: snapshot.version,
                    ride,
                    join_change: JoinChange::Keep,
                };
                Ok((write, ()))
            })
            .await?;
        let ride = write.ride;
        info!(%ride_id, owner_id = %caller.user_id, "Ride cancelled");

        let riders: Vec<String> = match self.rides.list_joins(ride_id).await {
            Ok(joins) => joins.into_iter().map(|j| j.rider_id).collect(),
            Err(e) => {
                error!(%ride_id, "Could not list riders of cancelled ride: {}", e);
                Vec::new()
            }
        };

        let notified = self
            .fanout
            .publish(RideEvent::RideCancelled {
                ride: ride.clone(),
                riders,
            })
            .await
            .into_iter()
            .collect();

        let joins_removed = match self.rides.delete_joins(ride_id).await {
            Ok(removed) => Some(removed),
            Err(e) => {
                error!(%ride_id, "Could not remove joins of cancelled ride: {}", e);
                None
            }
        };

        if let Err(e) = self.conversations.mark_cancelled(ride_id).await {
            warn!(%ride_id, "Could not flag ride conversation as cancelled: {}", e);
        }

        Ok(CancelResult {
            ride,
            notified,
            joins_removed,
        })
    }

    pub async fn complete(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<CompleteResult> {
        let now = self.clock.now();

        let ((), write) = self
            .retry
            .commit(self.rides.as_ref(), ride_id, "complete", |snapshot| {
                Self::check_transition(snapshot, caller)?;
                let mut ride = snapshot.ride.clone();
                ride.status = RideStatus::Completed;
                ride.completed_at = Some(now);
                let write = RideWrite {
                    expected_version: snapshot.version,
                    ride,
                    join_change: JoinChange::Keep,
                };
                Ok((write, ()))
            })
            .await?;

        info!(%ride_id, owner_id = %caller.user_id, "Ride completed");
        Ok(CompleteResult { ride: write.ride })
    }
}
