use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rideshare_shared::{Join, Notification, Ride, RideStatus};

use crate::StoreResult;

/// A ride, its Join set and the version both were read at.
#[derive(Debug, Clone)]
pub struct RideSnapshot {
    pub ride: Ride,
    pub version: u64,
    pub joins: Vec<Join>,
}

impl RideSnapshot {
    pub fn join_for(&self, rider_id: &str) -> Option<&Join> {
        self.joins.iter().find(|j| j.rider_id == rider_id)
    }

    pub fn rider_ids(&self) -> impl Iterator<Item = &str> {
        self.joins.iter().map(|j| j.rider_id.as_str())
    }
}

/// Change to the Join set committed together with the ride document.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinChange {
    Keep,
    Insert(Join),
    Remove { rider_id: String },
}

/// Conditional write: applied only if the ride is still at `expected_version`.
#[derive(Debug, Clone)]
pub struct RideWrite {
    pub expected_version: u64,
    pub ride: Ride,
    pub join_change: JoinChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { version: u64 },
    Conflict,
}

#[derive(Debug, Clone, Default)]
pub struct RideFilter {
    pub status: Option<RideStatus>,
    pub tag: Option<String>,
    pub owner_id: Option<String>,
}

impl RideFilter {
    pub fn active() -> Self {
        Self {
            status: Some(RideStatus::Active),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        self.status.map_or(true, |s| ride.status == s)
            && self.tag.as_deref().map_or(true, |t| ride.tag.as_deref() == Some(t))
            && self.owner_id.as_deref().map_or(true, |o| ride.owner_id == o)
    }
}

/// Ride documents and their Join sets, with optimistic-concurrency commits.
///
/// Every committed change to a ride or its Join set bumps the ride version, so a
/// commit against a stale snapshot is always detected.
#[async_trait]
pub trait RideStore: Send + Sync {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()>;

    async fn snapshot(&self, ride_id: Uuid) -> StoreResult<Option<RideSnapshot>>;

    async fn commit(&self, write: RideWrite) -> StoreResult<CommitOutcome>;

    async fn list_joins(&self, ride_id: Uuid) -> StoreResult<Vec<Join>>;

    /// Removes every Join of the ride, returning how many were deleted.
    async fn delete_joins(&self, ride_id: Uuid) -> StoreResult<usize>;

    /// Rides matching `filter`, ordered by departure.
    async fn list_rides(&self, filter: &RideFilter) -> StoreResult<Vec<Ride>>;
}

/// Append-only per-recipient inbox.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> StoreResult<()>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Notification>>;

    /// `None` when the notification does not exist or belongs to someone else.
    async fn mark_read(
        &self,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Notification>>;

    async fn delete(&self, id: Uuid, user_id: &str) -> StoreResult<bool>;
}
