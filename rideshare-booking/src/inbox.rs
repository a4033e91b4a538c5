use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use rideshare_core::clock::Clock;
use rideshare_core::identity::Caller;
use rideshare_core::repository::NotificationStore;
use rideshare_core::{BookingError, BookingResult};
use rideshare_shared::Notification;

/// A user's own notifications. Someone else's notification is indistinguishable from a missing one.
pub struct Inbox {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
}

impl Inbox {
    pub fn new(store: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self, caller: &Caller) -> BookingResult<Vec<Notification>> {
        Ok(self.store.list_for_user(&caller.user_id).await?)
    }

    pub async fn mark_read(&self, caller: &Caller, id: Uuid) -> BookingResult<Notification> {
        self.store
            .mark_read(id, &caller.user_id, self.clock.now())
            .await?
            .ok_or(BookingError::NotificationNotFound)
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> BookingResult<()> {
        if self.store.delete(id, &caller.user_id).await? {
            debug!(notification_id = %id, user_id = %caller.user_id, "Notification deleted");
            Ok(())
        } else {
            Err(BookingError::NotificationNotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rideshare_core::clock::FixedClock;
    use rideshare_shared::{NotificationDraft, NotificationType};
    use rideshare_store::MemoryNotificationStore;

    #[tokio::test]
    async fn test_mark_read_keeps_first_stamp_and_hides_others() {
        let store = Arc::new(MemoryNotificationStore::new());
        let start = Utc::now();
        let clock = Arc::new(FixedClock::new(start));
        let inbox = Inbox::new(store.clone(), clock.clone());

        let notification = NotificationDraft {
            kind: NotificationType::RideCancelled,
            title: "Ride cancelled".into(),
            body: "car trouble".into(),
            ride_id: None,
            from_address: None,
            to_address: None,
        }
        .addressed_to("rider", start);
        store.insert(&notification).await.unwrap();

        let rider = Caller::new("rider");
        let first = inbox.mark_read(&rider, notification.id).await.unwrap();
        assert_eq!(first.read_at, Some(start));

        clock.set(start + Duration::minutes(3));
        let again = inbox.mark_read(&rider, notification.id).await.unwrap();
        assert_eq!(again.read_at, Some(start));

        let stranger = Caller::new("stranger");
        assert_eq!(
            inbox.mark_read(&stranger, notification.id).await.unwrap_err(),
            BookingError::NotificationNotFound
        );
        assert_eq!(
            inbox.delete(&stranger, notification.id).await.unwrap_err(),
            BookingError::NotificationNotFound
        );

        inbox.delete(&rider, notification.id).await.unwrap();
        assert!(inbox.list(&rider).await.unwrap().is_empty());
    }
}
