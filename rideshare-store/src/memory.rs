use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use rideshare_core::repository::{
    CommitOutcome, JoinChange, NotificationStore, RideFilter, RideSnapshot, RideStore, RideWrite,
};
use rideshare_core::{StoreError, StoreResult};
use rideshare_shared::{Join, Notification, Ride};

struct RideEntry {
    ride: Ride,
    version: u64,
    joins: BTreeMap<String, Join>,
}

/// Process-local ride store. Snapshot and commit take the lock separately, so
/// concurrent writers race exactly like they would against a real database and
/// the version check is what keeps them honest.
#[derive(Default)]
pub struct MemoryRideStore {
    rides: RwLock<HashMap<Uuid, RideEntry>>,
}

impl MemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for MemoryRideStore {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()> {
        let mut rides = self.rides.write().await;
        if rides.contains_key(&ride.id) {
            return Err(StoreError::Backend(format!("ride {} already exists", ride.id)));
        }
        rides.insert(
            ride.id,
            RideEntry {
                ride: ride.clone(),
                version: 0,
                joins: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn snapshot(&self, ride_id: Uuid) -> StoreResult<Option<RideSnapshot>> {
        let rides = self.rides.read().await;
        Ok(rides.get(&ride_id).map(|entry| RideSnapshot {
            ride: entry.ride.clone(),
            version: entry.version,
            joins: entry.joins.values().cloned().collect(),
        }))
    }

    async fn commit(&self, write: RideWrite) -> StoreResult<CommitOutcome> {
        let mut rides = self.rides.write().await;
        let Some(entry) = rides.get_mut(&write.ride.id) else {
            return Ok(CommitOutcome::Conflict);
        };
        if entry.version != write.expected_version {
            return Ok(CommitOutcome::Conflict);
        }

        match write.join_change {
            JoinChange::Keep => {}
            JoinChange::Insert(join) => {
                if entry.joins.contains_key(&join.rider_id) {
                    return Ok(CommitOutcome::Conflict);
                }
                entry.joins.insert(join.rider_id.clone(), join);
            }
            JoinChange::Remove { rider_id } => {
                if entry.joins.remove(&rider_id).is_none() {
                    return Ok(CommitOutcome::Conflict);
                }
            }
        }

        entry.ride = write.ride;
        entry.version += 1;
        Ok(CommitOutcome::Committed { version: entry.version })
    }

    async fn list_joins(&self, ride_id: Uuid) -> StoreResult<Vec<Join>> {
        let rides = self.rides.read().await;
        Ok(rides
            .get(&ride_id)
            .map(|entry| entry.joins.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_joins(&self, ride_id: Uuid) -> StoreResult<usize> {
        let mut rides = self.rides.write().await;
        let Some(entry) = rides.get_mut(&ride_id) else {
            return Ok(0);
        };
        let removed = entry.joins.len();
        entry.joins.clear();
        entry.version += 1;
        Ok(removed)
    }

    async fn list_rides(&self, filter: &RideFilter) -> StoreResult<Vec<Ride>> {
        let rides = self.rides.read().await;
        let mut matching: Vec<Ride> = rides
            .values()
            .filter(|entry| filter.matches(&entry.ride))
            .map(|entry| entry.ride.clone())
            .collect();
        matching.sort_by_key(|ride| ride.ride_date);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: RwLock<HashMap<Uuid, Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored notification, regardless of recipient.
    pub async fn all(&self) -> Vec<Notification> {
        self.notifications.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> StoreResult<()> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut inbox: Vec<Notification> = notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inbox)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Notification>> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.mark_read(now);
                Ok(Some(n.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> StoreResult<bool> {
        let mut notifications = self.notifications.write().await;
        match notifications.get(&id) {
            Some(n) if n.user_id == user_id => {
                notifications.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_shared::{NotificationDraft, NotificationType, RideDocument};
    use rust_decimal::Decimal;

    fn ride(seats: u32) -> Ride {
        RideDocument {
            price: Some(Decimal::new(20, 0)),
            from_address: Some("UCSB".into()),
            to_address: Some("SBA".into()),
            ride_date: Some(Utc::now()),
            total_seats: Some(seats),
            ..Default::default()
        }
        .into_ride(Uuid::new_v4(), "owner".into(), Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_stale_commit_is_rejected() {
        let store = MemoryRideStore::new();
        let ride = ride(2);
        store.insert_ride(&ride).await.unwrap();

        let snap = store.snapshot(ride.id).await.unwrap().unwrap();
        let mut next = snap.ride.clone();
        next.seats_available -= 1;
        let join = Join::new(ride.id, "rider-a".into(), None, ride.price, Utc::now());

        let first = store
            .commit(RideWrite {
                expected_version: snap.version,
                ride: next.clone(),
                join_change: JoinChange::Insert(join.clone()),
            })
            .await
            .unwrap();
        assert_eq!(first, CommitOutcome::Committed { version: 1 });

        let second = store
            .commit(RideWrite {
                expected_version: snap.version,
                ride: next,
                join_change: JoinChange::Keep,
            })
            .await
            .unwrap();
        assert_eq!(second, CommitOutcome::Conflict);

        let after = store.snapshot(ride.id).await.unwrap().unwrap();
        assert_eq!(after.ride.seats_available, 1);
        assert_eq!(after.joins, vec![join]);
    }

    #[tokio::test]
    async fn test_delete_joins_bumps_version() {
        let store = MemoryRideStore::new();
        let ride = ride(1);
        store.insert_ride(&ride).await.unwrap();
        assert_eq!(store.delete_joins(ride.id).await.unwrap(), 0);
        assert_eq!(store.snapshot(ride.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_inbox_is_private_and_newest_first() {
        let store = MemoryNotificationStore::new();
        let draft = NotificationDraft {
            kind: NotificationType::RideLeft,
            title: "t".into(),
            body: "b".into(),
            ride_id: None,
            from_address: None,
            to_address: None,
        };
        let now = Utc::now();
        let older = draft.addressed_to("a", now - chrono::Duration::minutes(5));
        let newer = draft.addressed_to("a", now);
        let other = draft.addressed_to("b", now);
        for n in [&older, &newer, &other] {
            store.insert(n).await.unwrap();
        }

        let inbox = store.list_for_user("a").await.unwrap();
        assert_eq!(inbox.iter().map(|n| n.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        assert!(store.mark_read(other.id, "a", now).await.unwrap().is_none());
        assert!(!store.delete(other.id, "a").await.unwrap());
        assert!(store.delete(other.id, "b").await.unwrap());
    }
}
