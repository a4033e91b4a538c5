use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use rideshare_shared::{NotificationType, Ride};

/// Fee and notification shape for a rider leaving a ride.
///
/// Fees are advisory: they are computed and shown, never charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationPolicy {
    fee_rate: Decimal,
}

/// What the policy concluded for one particular leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveAssessment {
    pub late: bool,
    pub fee: Option<Decimal>,
    pub notice: NotificationType,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::new(25, 2),
        }
    }
}

impl CancellationPolicy {
    pub fn new(fee_rate: Decimal) -> Self {
        Self { fee_rate }
    }

    /// Builds the policy from a configured float rate, falling back to 25% when the
    /// value is unusable (NaN, negative, above 1).
    pub fn from_rate(rate: f64) -> Self {
        match Decimal::from_f64(rate) {
            Some(rate) if rate >= Decimal::ZERO && rate <= Decimal::ONE => Self::new(rate.normalize()),
            _ => {
                tracing::warn!("Ignoring invalid late fee rate {}, using default", rate);
                Self::default()
            }
        }
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn fee(&self, price: Decimal) -> Decimal {
        (price * self.fee_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn is_late(now: DateTime<Utc>, deadline: Option<DateTime<Utc>>) -> bool {
        matches!(deadline, Some(deadline) if now > deadline)
    }

    pub fn assess(&self, now: DateTime<Utc>, deadline: Option<DateTime<Utc>>, price: Decimal) -> LeaveAssessment {
        if Self::is_late(now, deadline) {
            LeaveAssessment {
                late: true,
                fee: Some(self.fee(price)),
                notice: NotificationType::LateCancellation,
            }
        } else {
            LeaveAssessment {
                late: false,
                fee: None,
                notice: NotificationType::RideLeft,
            }
        }
    }

    pub fn assess_ride(&self, ride: &Ride, now: DateTime<Utc>) -> LeaveAssessment {
        self.assess(now, ride.cancellation_deadline, ride.price)
    }

    /// Policy text shown to a rider before they leave.
    pub fn describe(&self, ride: &Ride) -> String {
        match ride.cancellation_deadline {
            Some(deadline) => format!(
                "Leaving after {} incurs a {}% late cancellation fee (${}).",
                deadline.format("%b %e, %Y %H:%M UTC"),
                (self.fee_rate * Decimal::ONE_HUNDRED).normalize(),
                self.fee(ride.price)
            ),
            None => "This ride has no cancellation deadline; leaving is free.".to_string(),
        }
    }
}
