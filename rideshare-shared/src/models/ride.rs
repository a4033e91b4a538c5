use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::pii::Masked;

/// Ride status in the lifecycle. Cancelled and Completed are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Cancelled,
    Completed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::Cancelled => "cancelled",
            RideStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RideStatus::Active)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(RideStatus::Active),
            "cancelled" | "canceled" => Ok(RideStatus::Cancelled),
            "completed" => Ok(RideStatus::Completed),
            other => Err(format!("unknown ride status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vehicle {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub plate: String,
}

/// A hosted trip with a fixed seat capacity.
///
/// `seats_available` is only ever written through a committed booking or
/// lifecycle write; everything else treats it as read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ride {
    pub id: Uuid,
    pub owner_id: String,
    pub owner_name: Option<String>,
    pub price: Decimal,
    pub from_address: String,
    pub to_address: String,
    pub ride_date: DateTime<Utc>,
    pub cancellation_deadline: Option<DateTime<Utc>>,
    pub seats_available: u32,
    pub total_seats: u32,
    pub status: RideStatus,
    pub tag: Option<String>,
    pub driver_notes: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub cancellation_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ride {
    pub fn is_active(&self) -> bool {
        self.status == RideStatus::Active
    }

    pub fn is_sold_out(&self) -> bool {
        self.seats_available == 0
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Seats currently held by riders according to the counter.
    pub fn seats_taken(&self) -> u32 {
        self.total_seats.saturating_sub(self.seats_available)
    }

    pub fn route_label(&self) -> String {
        format!("{} → {}", self.from_address, self.to_address)
    }
}

/// One rider's reservation of exactly one seat, keyed by `(ride_id, rider_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Join {
    pub ride_id: Uuid,
    pub rider_id: String,
    pub rider_email: Option<Masked<String>>,
    pub joined_at: DateTime<Utc>,
    pub price_paid: Decimal,
}

impl Join {
    pub fn new(
        ride_id: Uuid,
        rider_id: String,
        rider_email: Option<String>,
        price_paid: Decimal,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ride_id,
            rider_id,
            rider_email: rider_email.filter(|e| !e.trim().is_empty()).map(Masked),
            joined_at,
            price_paid,
        }
    }
}
