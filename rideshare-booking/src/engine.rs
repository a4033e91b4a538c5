use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use rideshare_core::clock::{Clock, SystemClock};
use rideshare_core::collaborators::{ConversationClient, NoopConversations, ProfileDirectory, StaticProfileDirectory};
use rideshare_core::identity::Caller;
use rideshare_core::pin::DEFAULT_VISIBILITY_WINDOW_MINUTES;
use rideshare_core::policy::CancellationPolicy;
use rideshare_core::repository::{NotificationStore, RideStore};
use rideshare_core::BookingResult;
use rideshare_shared::{Notification, Ride, RideDocument};

use crate::fanout::{DispatchMode, NotificationFanout};
use crate::hosting::{RideHosting, RideListing, RosterEntry};
use crate::inbox::Inbox;
use crate::lifecycle::{CancelResult, CompleteResult, RideLifecycle};
use crate::retry::RetryPolicy;
use crate::transaction::{BookingTransaction, JoinResult, LeaveResult};
use crate::verification::{PinVerifier, RiderPin};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    pub policy: CancellationPolicy,
    pub pin_window_minutes: i64,
    pub dispatch: DispatchMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            policy: CancellationPolicy::default(),
            pin_window_minutes: DEFAULT_VISIBILITY_WINDOW_MINUTES,
            dispatch: DispatchMode::Inline,
        }
    }
}

impl EngineSettings {
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.retry = RetryPolicy::new(max_attempts, backoff);
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }
}

/// Collaborators the engine talks to besides its own stores.
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub conversations: Arc<dyn ConversationClient>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            profiles: Arc::new(StaticProfileDirectory::new()),
            conversations: Arc::new(NoopConversations),
        }
    }
}

/// Entry point for every ride operation, wired over one ride store and one notification store.
pub struct RideEngine {
    hosting: RideHosting,
    bookings: BookingTransaction,
    lifecycle: RideLifecycle,
    pins: PinVerifier,
    inbox: Inbox,
    policy: CancellationPolicy,
}

impl RideEngine {
    pub fn new(
        rides: Arc<dyn RideStore>,
        notifications: Arc<dyn NotificationStore>,
        settings: EngineSettings,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            clock,
            profiles,
            conversations,
        } = collaborators;

        let fanout = NotificationFanout::new(notifications.clone(), clock.clone(), profiles.clone(), settings.dispatch);

        Self {
            hosting: RideHosting::new(rides.clone(), clock.clone(), profiles),
            bookings: BookingTransaction::new(
                rides.clone(),
                settings.retry.clone(),
                settings.policy,
                clock.clone(),
                fanout.clone(),
                conversations.clone(),
            ),
            lifecycle: RideLifecycle::new(rides.clone(), settings.retry, clock.clone(), fanout, conversations),
            pins: PinVerifier::new(rides, clock.clone(), settings.pin_window_minutes),
            inbox: Inbox::new(notifications, clock),
            policy: settings.policy,
        }
    }

    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    pub async fn host(&self, caller: &Caller, document: RideDocument) -> BookingResult<Ride> {
        self.hosting.host(caller, document).await
    }

    pub async fn browse(&self, caller: &Caller, tag: Option<String>) -> BookingResult<Vec<RideListing>> {
        self.hosting.browse(caller, tag).await
    }

    pub async fn ride(&self, ride_id: Uuid) -> BookingResult<RideListing> {
        self.hosting.get(ride_id).await
    }

    pub async fn roster(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<Vec<RosterEntry>> {
        self.hosting.roster(ride_id, caller).await
    }

    pub async fn join(&self, ride_id: Uuid, caller: &Caller, price_snapshot: Option<Decimal>) -> BookingResult<JoinResult> {
        self.bookings.join(ride_id, caller, price_snapshot).await
    }

    pub async fn leave(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<LeaveResult> {
        self.bookings.leave(ride_id, caller).await
    }

    pub async fn cancel(&self, ride_id: Uuid, caller: &Caller, note: &str) -> BookingResult<CancelResult> {
        self.lifecycle.cancel(ride_id, caller, note).await
    }

    pub async fn complete(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<CompleteResult> {
        self.lifecycle.complete(ride_id, caller).await
    }

    pub async fn rider_pin(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<RiderPin> {
        self.pins.rider_pin(ride_id, caller).await
    }

    pub async fn verify_pin(&self, ride_id: Uuid, caller: &Caller, rider_id: &str, entered: &str) -> BookingResult<bool> {
        self.pins.verify(ride_id, caller, rider_id, entered).await
    }

    pub async fn notifications(&self, caller: &Caller) -> BookingResult<Vec<Notification>> {
        self.inbox.list(caller).await
    }

    pub async fn mark_notification_read(&self, caller: &Caller, id: Uuid) -> BookingResult<Notification> {
        self.inbox.mark_read(caller, id).await
    }

    pub async fn delete_notification(&self, caller: &Caller, id: Uuid) -> BookingResult<()> {
        self.inbox.delete(caller, id).await
    }
}
