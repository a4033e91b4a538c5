use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use rideshare_core::clock::Clock;
use rideshare_core::identity::Caller;
use rideshare_core::pin;
use rideshare_core::repository::{RideSnapshot, RideStore};
use rideshare_core::{BookingError, BookingResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiderPin {
    /// Withheld until the visibility window opens.
    pub pin: Option<String>,
    pub visible: bool,
    pub visible_from: DateTime<Utc>,
}

/// In-person rider check between driver and rider.
pub struct PinVerifier {
    rides: Arc<dyn RideStore>,
    clock: Arc<dyn Clock>,
    window_minutes: i64,
}

impl PinVerifier {
    pub fn new(rides: Arc<dyn RideStore>, clock: Arc<dyn Clock>, window_minutes: i64) -> Self {
        Self {
            rides,
            clock,
            window_minutes,
        }
    }

    async fn load(&self, ride_id: Uuid) -> BookingResult<RideSnapshot> {
        self.rides
            .snapshot(ride_id)
            .await?
            .ok_or(BookingError::RideNotFound)
    }

    fn pin_for(ride_id: Uuid, rider_id: &str) -> Option<String> {
        pin::pin(Some(&ride_id.to_string()), Some(rider_id))
    }

    pub async fn rider_pin(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<RiderPin> {
        let snapshot = self.load(ride_id).await?;
        if snapshot.join_for(&caller.user_id).is_none() {
            return Err(BookingError::NotJoined);
        }

        let ride_date = snapshot.ride.ride_date;
        let visible = pin::visible_within(self.clock.now(), ride_date, self.window_minutes);
        Ok(RiderPin {
            pin: if visible { Self::pin_for(ride_id, &caller.user_id) } else { None },
            visible,
            visible_from: ride_date - chrono::Duration::minutes(self.window_minutes),
        })
    }

    /// Driver enters the PIN a rider shows them.
    pub async fn verify(&self, ride_id: Uuid, caller: &Caller, rider_id: &str, entered: &str) -> BookingResult<bool> {
        let snapshot = self.load(ride_id).await?;
        if !snapshot.ride.is_owned_by(&caller.user_id) {
            return Err(BookingError::NotAuthorized);
        }
        if snapshot.join_for(rider_id).is_none() {
            return Err(BookingError::NotJoined);
        }

        let matched = Self::pin_for(ride_id, rider_id).is_some_and(|expected| pin::matches(&expected, entered));
        info!(%ride_id, rider_id, matched, "Rider PIN checked");
        Ok(matched)
    }
}
