use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use rideshare_core::clock::Clock;
use rideshare_core::collaborators::ProfileDirectory;
use rideshare_core::policy::LeaveAssessment;
use rideshare_core::repository::NotificationStore;
use rideshare_shared::{NotificationDraft, NotificationType, Ride};

const DELIVERY_ATTEMPTS: u32 = 3;
const FALLBACK_RIDER_NAME: &str = "A rider";

/// Whether fanout is awaited by the operation that triggered it or handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    Inline,
    Background,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: Vec<String>,
}

/// A committed booking or lifecycle change that other users hear about.
#[derive(Debug, Clone)]
pub enum RideEvent {
    RiderLeft {
        ride: Ride,
        rider_id: String,
        /// Riders joined before the leave was applied, the leaver included.
        riders_before: Vec<String>,
        assessment: LeaveAssessment,
    },
    RideCancelled {
        ride: Ride,
        riders: Vec<String>,
    },
}

impl RideEvent {
    /// Late leaves go to the owner alone; on-time leaves also reach every other rider.
    pub fn recipients(&self) -> BTreeSet<String> {
        match self {
            RideEvent::RiderLeft {
                ride,
                rider_id,
                riders_before,
                assessment,
            } => {
                let mut recipients = BTreeSet::from([ride.owner_id.clone()]);
                if !assessment.late {
                    recipients.extend(riders_before.iter().filter(|r| *r != rider_id).cloned());
                }
                recipients
            }
            RideEvent::RideCancelled { riders, .. } => riders.iter().cloned().collect(),
        }
    }

    pub fn draft(&self, actor_name: &str) -> NotificationDraft {
        let ride = match self {
            RideEvent::RiderLeft { ride, .. } | RideEvent::RideCancelled { ride, .. } => ride,
        };
        let (kind, title, body) = match self {
            RideEvent::RiderLeft { assessment, .. } if assessment.late => (
                NotificationType::LateCancellation,
                "Late cancellation".to_string(),
                match assessment.fee {
                    Some(fee) => format!(
                        "{} left {} after the cancellation deadline. Late fee: ${}.",
                        actor_name,
                        ride.route_label(),
                        fee
                    ),
                    None => format!(
                        "{} left {} after the cancellation deadline.",
                        actor_name,
                        ride.route_label()
                    ),
                },
            ),
            RideEvent::RiderLeft { .. } => (
                NotificationType::RideLeft,
                "A rider left the ride".to_string(),
                format!("{} left {}. A seat is open again.", actor_name, ride.route_label()),
            ),
            RideEvent::RideCancelled { .. } => (
                NotificationType::RideCancelled,
                "Ride cancelled".to_string(),
                ride.cancellation_note.clone().unwrap_or_default(),
            ),
        };

        NotificationDraft {
            kind,
            title,
            body,
            ride_id: Some(ride.id),
            from_address: Some(ride.from_address.clone()),
            to_address: Some(ride.to_address.clone()),
        }
    }
}

/// Persists one notification per recipient. Never fails the caller: every
/// recipient is attempted independently and failures end up in the report and the log.
#[derive(Clone)]
pub struct NotificationFanout {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
    profiles: Arc<dyn ProfileDirectory>,
    mode: DispatchMode,
}

impl NotificationFanout {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
        profiles: Arc<dyn ProfileDirectory>,
        mode: DispatchMode,
    ) -> Self {
        Self {
            store,
            clock,
            profiles,
            mode,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Plan and send the notifications for `event`. Returns the planned recipients;
    /// in background mode delivery may still be in flight.
    pub async fn publish(&self, event: RideEvent) -> BTreeSet<String> {
        let recipients = event.recipients();
        if recipients.is_empty() {
            debug!("No recipients for ride event");
            return recipients;
        }

        let actor_name = match &event {
            RideEvent::RiderLeft { rider_id, .. } => self
                .profiles
                .display_name(rider_id)
                .await
                .unwrap_or_else(|| FALLBACK_RIDER_NAME.to_string()),
            RideEvent::RideCancelled { ride, .. } => ride
                .owner_name
                .clone()
                .unwrap_or_else(|| "The driver".to_string()),
        };
        let draft = event.draft(&actor_name);

        match self.mode {
            DispatchMode::Inline => {
                self.deliver(recipients.clone(), draft).await;
            }
            DispatchMode::Background => {
                let fanout = self.clone();
                let targets = recipients.clone();
                tokio::spawn(async move {
                    fanout.deliver(targets, draft).await;
                });
            }
        }
        recipients
    }

    pub async fn deliver(&self, recipients: BTreeSet<String>, draft: NotificationDraft) -> FanoutReport {
        let now = self.clock.now();
        let attempts = recipients.iter().map(|user_id| {
            let notification = draft.addressed_to(user_id, now);
            async move {
                for attempt in 1..=DELIVERY_ATTEMPTS {
                    match self.store.insert(&notification).await {
                        Ok(()) => return Ok(()),
                        Err(e) => warn!(
                            user_id = %notification.user_id,
                            kind = %notification.kind,
                            attempt,
                            "Failed to store notification: {}",
                            e
                        ),
                    }
                }
                Err(notification.user_id.clone())
            }
        });

        let mut report = FanoutReport::default();
        for outcome in join_all(attempts).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(user_id) => report.failed.push(user_id),
            }
        }

        if report.failed.is_empty() {
            info!(kind = %draft.kind, delivered = report.delivered, "Notifications delivered");
        } else {
            error!(
                kind = %draft.kind,
                delivered = report.delivered,
                failed = ?report.failed,
                "Some notifications could not be delivered"
            );
        }
        report
    }
}
