use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use rideshare_core::clock::Clock;
use rideshare_core::collaborators::ConversationClient;
use rideshare_core::identity::Caller;
use rideshare_core::policy::{CancellationPolicy, LeaveAssessment};
use rideshare_core::repository::RideStore;
use rideshare_core::BookingResult;
use rideshare_shared::{Join, Ride};

use crate::fanout::{NotificationFanout, RideEvent};
use crate::ledger::SeatLedger;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize)]
pub struct JoinResult {
    pub ride: Ride,
    pub join: Join,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveResult {
    pub ride: Ride,
    #[serde(flatten)]
    pub assessment: LeaveAssessment,
    pub notified: Vec<String>,
}

/// Rider-side seat operations. Each one is a retried optimistic transaction over
/// the ride and its Join set; side effects run only after the commit.
pub struct BookingTransaction {
    rides: Arc<dyn RideStore>,
    retry: RetryPolicy,
    policy: CancellationPolicy,
    clock: Arc<dyn Clock>,
    fanout: NotificationFanout,
    conversations: Arc<dyn ConversationClient>,
}

impl BookingTransaction {
    pub fn new(
        rides: Arc<dyn RideStore>,
        retry: RetryPolicy,
        policy: CancellationPolicy,
        clock: Arc<dyn Clock>,
        fanout: NotificationFanout,
        conversations: Arc<dyn ConversationClient>,
    ) -> Self {
        Self {
            rides,
            retry,
            policy,
            clock,
            fanout,
            conversations,
        }
    }

    /// Reserve one seat for the caller. `price_snapshot` defaults to the ride's current price.
    pub async fn join(
        &self,
        ride_id: Uuid,
        caller: &Caller,
        price_snapshot: Option<Decimal>,
    ) -> BookingResult<JoinResult> {
        let now = self.clock.now();

        let (join, write) = self
            .retry
            .commit(self.rides.as_ref(), ride_id, "join", |snapshot| {
                let price = price_snapshot.unwrap_or(snapshot.ride.price);
                SeatLedger::reserve(snapshot, &caller.user_id, caller.email.clone(), price, now)
            })
            .await?;

        let ride = write.ride;
        info!(
            %ride_id,
            rider_id = %caller.user_id,
            seats_available = ride.seats_available,
            "Rider joined ride"
        );

        if let Err(e) = self
            .conversations
            .ensure_ride_thread(ride_id, &ride.owner_id, &caller.user_id, &ride.route_label())
            .await
        {
            warn!(%ride_id, rider_id = %caller.user_id, "Could not open ride conversation: {}", e);
        }

        Ok(JoinResult { ride, join })
    }

    /// Give the caller's seat back and tell the people affected.
    pub async fn leave(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<LeaveResult> {
        let (riders_before, write) = self
            .retry
            .commit(self.rides.as_ref(), ride_id, "leave", |snapshot| {
                let write = SeatLedger::release(snapshot, &caller.user_id)?;
                let riders: Vec<String> = snapshot.rider_ids().map(String::from).collect();
                Ok((write, riders))
            })
            .await?;

        let ride = write.ride;
        let assessment = self.policy.assess_ride(&ride, self.clock.now());
        info!(
            %ride_id,
            rider_id = %caller.user_id,
            late = assessment.late,
            seats_available = ride.seats_available,
            "Rider left ride"
        );

        let notified = self
            .fanout
            .publish(RideEvent::RiderLeft {
                ride: ride.clone(),
                rider_id: caller.user_id.clone(),
                riders_before,
                assessment: assessment.clone(),
            })
            .await
            .into_iter()
            .collect();

        Ok(LeaveResult {
            ride,
            assessment,
            notified,
        })
    }
}
