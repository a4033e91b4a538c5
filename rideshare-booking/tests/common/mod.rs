#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use rideshare_booking::{Collaborators, EngineSettings, RideEngine};
use rideshare_core::clock::FixedClock;
use rideshare_core::collaborators::{ConversationClient, NoopConversations, StaticProfileDirectory};
use rideshare_core::identity::Caller;
use rideshare_core::repository::{
    CommitOutcome, NotificationStore, RideFilter, RideSnapshot, RideStore, RideWrite,
};
use rideshare_core::{StoreError, StoreResult};
use rideshare_shared::{Join, Notification, NotificationType, Ride, RideDocument};
use rideshare_store::{MemoryNotificationStore, MemoryRideStore};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub struct Harness {
    pub engine: RideEngine,
    pub rides: Arc<MemoryRideStore>,
    pub notifications: Arc<MemoryNotificationStore>,
    pub clock: Arc<FixedClock>,
    pub profiles: Arc<StaticProfileDirectory>,
}

impl Harness {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_conversations(settings, Arc::new(NoopConversations))
    }

    pub fn with_conversations(settings: EngineSettings, conversations: Arc<dyn ConversationClient>) -> Self {
        let rides = Arc::new(MemoryRideStore::new());
        let notifications = Arc::new(MemoryNotificationStore::new());
        let clock = Arc::new(FixedClock::new(start()));
        let profiles = Arc::new(StaticProfileDirectory::new());
        let engine = RideEngine::new(
            rides.clone(),
            notifications.clone(),
            settings,
            Collaborators {
                clock: clock.clone(),
                profiles: profiles.clone(),
                conversations,
            },
        );
        Self {
            engine,
            rides,
            notifications,
            clock,
            profiles,
        }
    }

    /// A ride departing one day after `start()`, cancellable free of charge until two hours before.
    pub async fn host(&self, owner: &str, seats: u32, price: i64) -> Ride {
        let ride_date = start() + Duration::days(1);
        self.engine
            .host(
                &Caller::new(owner),
                RideDocument {
                    price: Some(Decimal::new(price, 0)),
                    from_address: Some("UCSB".into()),
                    to_address: Some("LAX".into()),
                    ride_date: Some(ride_date),
                    cancellation_deadline: Some(ride_date - Duration::hours(2)),
                    total_seats: Some(seats),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    pub async fn snapshot(&self, ride_id: Uuid) -> RideSnapshot {
        self.rides.snapshot(ride_id).await.unwrap().unwrap()
    }

    pub async fn inbox(&self, user_id: &str) -> Vec<Notification> {
        self.notifications.list_for_user(user_id).await.unwrap()
    }

    pub async fn count_of(&self, user_id: &str, kind: NotificationType) -> usize {
        self.inbox(user_id).await.iter().filter(|n| n.kind == kind).count()
    }
}

/// Notification store that refuses to persist anything addressed to the listed users.
pub struct RejectingNotificationStore {
    inner: MemoryNotificationStore,
    rejected: HashSet<String>,
    pub attempts: AtomicU32,
}

impl RejectingNotificationStore {
    pub fn new(rejected: &[&str]) -> Self {
        Self {
            inner: MemoryNotificationStore::new(),
            rejected: rejected.iter().map(|s| s.to_string()).collect(),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl NotificationStore for RejectingNotificationStore {
    async fn insert(&self, notification: &Notification) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(&notification.user_id) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.inner.insert(notification).await
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Notification>> {
        self.inner.list_for_user(user_id).await
    }

    async fn mark_read(&self, id: Uuid, user_id: &str, now: DateTime<Utc>) -> StoreResult<Option<Notification>> {
        self.inner.mark_read(id, user_id, now).await
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> StoreResult<bool> {
        self.inner.delete(id, user_id).await
    }
}

/// Ride store whose commits always lose the race.
pub struct ContendedRideStore {
    pub inner: MemoryRideStore,
    pub commits: AtomicU32,
}

impl ContendedRideStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRideStore::new(),
            commits: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl RideStore for ContendedRideStore {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()> {
        self.inner.insert_ride(ride).await
    }

    async fn snapshot(&self, ride_id: Uuid) -> StoreResult<Option<RideSnapshot>> {
        self.inner.snapshot(ride_id).await
    }

    async fn commit(&self, _write: RideWrite) -> StoreResult<CommitOutcome> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitOutcome::Conflict)
    }

    async fn list_joins(&self, ride_id: Uuid) -> StoreResult<Vec<Join>> {
        self.inner.list_joins(ride_id).await
    }

    async fn delete_joins(&self, ride_id: Uuid) -> StoreResult<usize> {
        self.inner.delete_joins(ride_id).await
    }

    async fn list_rides(&self, filter: &RideFilter) -> StoreResult<Vec<Ride>> {
        self.inner.list_rides(filter).await
    }
}

/// Ride store whose post-cancel cleanup reads and deletes can be made to fail.
#[derive(Default)]
pub struct FlakyCleanupRideStore {
    pub inner: MemoryRideStore,
    pub fail_list_joins: AtomicBool,
    pub fail_delete_joins: AtomicBool,
}

#[async_trait]
impl RideStore for FlakyCleanupRideStore {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()> {
        self.inner.insert_ride(ride).await
    }

    async fn snapshot(&self, ride_id: Uuid) -> StoreResult<Option<RideSnapshot>> {
        self.inner.snapshot(ride_id).await
    }

    async fn commit(&self, write: RideWrite) -> StoreResult<CommitOutcome> {
        self.inner.commit(write).await
    }

    async fn list_joins(&self, ride_id: Uuid) -> StoreResult<Vec<Join>> {
        if self.fail_list_joins.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("replica lagging".into()));
        }
        self.inner.list_joins(ride_id).await
    }

    async fn delete_joins(&self, ride_id: Uuid) -> StoreResult<usize> {
        if self.fail_delete_joins.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.delete_joins(ride_id).await
    }

    async fn list_rides(&self, filter: &RideFilter) -> StoreResult<Vec<Ride>> {
        self.inner.list_rides(filter).await
    }
}

/// Engine over arbitrary stores with the fixed clock and no profiles.
pub fn engine_over(
    rides: Arc<dyn RideStore>,
    notifications: Arc<dyn NotificationStore>,
    settings: EngineSettings,
) -> RideEngine {
    RideEngine::new(
        rides,
        notifications,
        settings,
        Collaborators {
            clock: Arc::new(FixedClock::new(start())),
            profiles: Arc::new(StaticProfileDirectory::new()),
            conversations: Arc::new(NoopConversations),
        },
    )
}

/// A ride departing one day after `start()` with no cancellation deadline.
pub fn ride_document(seats: u32) -> RideDocument {
    RideDocument {
        price: Some(Decimal::new(20, 0)),
        from_address: Some("UCSB".into()),
        to_address: Some("SBA".into()),
        ride_date: Some(start() + Duration::days(1)),
        total_seats: Some(seats),
        ..Default::default()
    }
}

/// Messaging backend that is always down but records what it was asked to do.
#[derive(Default)]
pub struct BrokenConversations {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ConversationClient for BrokenConversations {
    async fn ensure_ride_thread(
        &self,
        ride_id: Uuid,
        _owner_id: &str,
        rider_id: &str,
        _ride_info: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.calls.lock().unwrap().push(format!("thread:{}:{}", ride_id, rider_id));
        Err("messaging unavailable".into())
    }

    async fn mark_cancelled(&self, ride_id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.calls.lock().unwrap().push(format!("cancelled:{}", ride_id));
        Err("messaging unavailable".into())
    }
}
