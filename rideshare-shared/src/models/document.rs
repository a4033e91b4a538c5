use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::ride::{Ride, RideStatus, Vehicle};

/// Incoming ride shape as clients have historically sent it.
///
/// Capacity arrives as `total_seats`, `totalSeats` or only `seats`; the vehicle as a
/// single `vehicle` or a `vehicles` list. Everything is folded into the canonical
/// [`Ride`] here so no read site has to re-derive it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideDocument {
    pub owner_name: Option<String>,
    pub price: Option<Decimal>,
    #[serde(alias = "fromAddress")]
    pub from_address: Option<String>,
    #[serde(alias = "toAddress")]
    pub to_address: Option<String>,
    #[serde(alias = "rideDate")]
    pub ride_date: Option<DateTime<Utc>>,
    #[serde(alias = "cancellationDeadline")]
    pub cancellation_deadline: Option<DateTime<Utc>>,
    #[serde(alias = "totalSeats")]
    pub total_seats: Option<u32>,
    pub seats: Option<u32>,
    pub tag: Option<String>,
    #[serde(alias = "driverNotes")]
    pub driver_notes: Option<String>,
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Price must not be negative")]
    NegativePrice,

    #[error("A ride needs at least one seat")]
    NoSeats,

    #[error("Cancellation deadline must not be after the ride date")]
    DeadlineAfterRide,
}

impl RideDocument {
    pub fn capacity(&self) -> Option<u32> {
        self.total_seats.or(self.seats)
    }

    pub fn primary_vehicle(&self) -> Option<Vehicle> {
        self.vehicle.clone().or_else(|| self.vehicles.first().cloned())
    }

    /// Builds a freshly hosted, Active ride with every seat available.
    pub fn into_ride(
        self,
        id: Uuid,
        owner_id: String,
        created_at: DateTime<Utc>,
    ) -> Result<Ride, DocumentError> {
        let total_seats = self.capacity().ok_or(DocumentError::MissingField("total_seats"))?;
        if total_seats == 0 {
            return Err(DocumentError::NoSeats);
        }

        let price = self.price.unwrap_or(Decimal::ZERO);
        if price < Decimal::ZERO {
            return Err(DocumentError::NegativePrice);
        }

        let ride_date = self.ride_date.ok_or(DocumentError::MissingField("ride_date"))?;
        if let Some(deadline) = self.cancellation_deadline {
            if deadline > ride_date {
                return Err(DocumentError::DeadlineAfterRide);
            }
        }

        let vehicle = self.primary_vehicle();
        let from_address = non_blank(self.from_address).ok_or(DocumentError::MissingField("from_address"))?;
        let to_address = non_blank(self.to_address).ok_or(DocumentError::MissingField("to_address"))?;

        Ok(Ride {
            id,
            owner_id,
            owner_name: non_blank(self.owner_name),
            price,
            from_address,
            to_address,
            ride_date,
            cancellation_deadline: self.cancellation_deadline,
            seats_available: total_seats,
            total_seats,
            status: RideStatus::Active,
            tag: non_blank(self.tag),
            driver_notes: non_blank(self.driver_notes),
            vehicle,
            cancellation_note: None,
            created_at,
            cancelled_at: None,
            cancelled_by: None,
            completed_at: None,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
