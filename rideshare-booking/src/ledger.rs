use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use rideshare_core::repository::{JoinChange, RideSnapshot, RideWrite};
use rideshare_core::{BookingError, BookingResult};
use rideshare_shared::{Join, Ride, RideStatus};

/// Seat accounting for one ride: turns a validated snapshot into the conditional
/// write that reserves or frees exactly one seat.
///
/// All checks run against the snapshot the write will be conditioned on, so a write
/// produced here is only ever committed if the state it was validated against is
/// still current.
pub struct SeatLedger;

impl SeatLedger {
    /// Take one seat for `rider_id`. Returns the write along with the Join it inserts.
    pub fn reserve(
        snapshot: &RideSnapshot,
        rider_id: &str,
        rider_email: Option<String>,
        price_snapshot: Decimal,
        now: DateTime<Utc>,
    ) -> BookingResult<(RideWrite, Join)> {
        if !snapshot.ride.is_active() {
            return Err(BookingError::RideNotFound);
        }
        if snapshot.ride.is_owned_by(rider_id) {
            return Err(BookingError::NotAuthorized);
        }
        if snapshot.join_for(rider_id).is_some() {
            return Err(BookingError::AlreadyJoined);
        }
        if snapshot.ride.seats_available == 0 {
            return Err(BookingError::SoldOut);
        }

        let mut ride = snapshot.ride.clone();
        ride.seats_available -= 1;

        let join = Join::new(ride.id, rider_id.to_string(), rider_email, price_snapshot, now);

        let write = RideWrite {
            expected_version: snapshot.version,
            ride,
            join_change: JoinChange::Insert(join.clone()),
        };
        Ok((write, join))
    }

    /// Give `rider_id`'s seat back. The counter never exceeds capacity, even if it had drifted.
    pub fn release(snapshot: &RideSnapshot, rider_id: &str) -> BookingResult<RideWrite> {
        if snapshot.ride.status == RideStatus::Completed {
            return Err(BookingError::InvalidState {
                status: snapshot.ride.status,
            });
        }
        if snapshot.join_for(rider_id).is_none() {
            return Err(BookingError::NotJoined);
        }

        let mut ride = snapshot.ride.clone();
        ride.seats_available = ride.seats_available.saturating_add(1).min(ride.total_seats);

        Ok(RideWrite {
            expected_version: snapshot.version,
            ride,
            join_change: JoinChange::Remove {
                rider_id: rider_id.to_string(),
            },
        })
    }

    /// `0 <= seats_available <= total_seats` and `seats_available = total_seats - joins`.
    pub fn is_consistent(ride: &Ride, join_count: usize) -> bool {
        ride.seats_available <= ride.total_seats
            && u64::from(ride.total_seats) == u64::from(ride.seats_available) + join_count as u64
    }
}
