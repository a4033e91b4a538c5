use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use rideshare_core::clock::Clock;
use rideshare_core::collaborators::ProfileDirectory;
use rideshare_core::identity::Caller;
use rideshare_core::repository::{RideFilter, RideStore};
use rideshare_core::{BookingError, BookingResult};
use rideshare_shared::{Ride, RideDocument};

/// A ride as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct RideListing {
    #[serde(flatten)]
    pub ride: Ride,
    pub sold_out: bool,
}

impl From<Ride> for RideListing {
    fn from(ride: Ride) -> Self {
        Self {
            sold_out: ride.is_sold_out(),
            ride,
        }
    }
}

/// One line of the driver's rider roster.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub rider_id: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub price_paid: Decimal,
}

/// Creating rides and the read paths around them.
pub struct RideHosting {
    rides: Arc<dyn RideStore>,
    clock: Arc<dyn Clock>,
    profiles: Arc<dyn ProfileDirectory>,
}

impl RideHosting {
    pub fn new(rides: Arc<dyn RideStore>, clock: Arc<dyn Clock>, profiles: Arc<dyn ProfileDirectory>) -> Self {
        Self { rides, clock, profiles }
    }

    pub async fn host(&self, caller: &Caller, mut document: RideDocument) -> BookingResult<Ride> {
        if document.owner_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            document.owner_name = self.profiles.display_name(&caller.user_id).await;
        }

        let ride = document.into_ride(Uuid::new_v4(), caller.user_id.clone(), self.clock.now())?;
        self.rides.insert_ride(&ride).await?;

        info!(
            ride_id = %ride.id,
            owner_id = %ride.owner_id,
            total_seats = ride.total_seats,
            "Ride hosted"
        );
        Ok(ride)
    }

    /// Active rides by departure time, optionally restricted to one tag. The
    /// caller's own rides are left out since they cannot join them.
    pub async fn browse(&self, caller: &Caller, tag: Option<String>) -> BookingResult<Vec<RideListing>> {
        let tag = tag.filter(|t| !t.trim().is_empty());
        let rides = self.rides.list_rides(&RideFilter::active().with_tag(tag)).await?;
        Ok(rides
            .into_iter()
            .filter(|ride| !ride.is_owned_by(&caller.user_id))
            .map(RideListing::from)
            .collect())
    }

    pub async fn get(&self, ride_id: Uuid) -> BookingResult<RideListing> {
        self.rides
            .snapshot(ride_id)
            .await?
            .map(|snapshot| RideListing::from(snapshot.ride))
            .ok_or(BookingError::RideNotFound)
    }

    /// Currently joined riders, for the owner only.
    pub async fn roster(&self, ride_id: Uuid, caller: &Caller) -> BookingResult<Vec<RosterEntry>> {
        let snapshot = self
            .rides
            .snapshot(ride_id)
            .await?
            .ok_or(BookingError::RideNotFound)?;
        if !snapshot.ride.is_owned_by(&caller.user_id) {
            return Err(BookingError::NotAuthorized);
        }

        let mut roster = Vec::with_capacity(snapshot.joins.len());
        for join in snapshot.joins {
            let display_name = match self.profiles.display_name(&join.rider_id).await {
                Some(name) => name,
                None => join
                    .rider_email
                    .map(|email| email.into_inner())
                    .unwrap_or_else(|| join.rider_id.clone()),
            };
            roster.push(RosterEntry {
                rider_id: join.rider_id,
                display_name,
                joined_at: join.joined_at,
                price_paid: join.price_paid,
            });
        }
        roster.sort_by_key(|entry| entry.joined_at);
        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rideshare_core::clock::FixedClock;
    use rideshare_core::collaborators::StaticProfileDirectory;
    use rideshare_store::MemoryRideStore;

    fn document(tag: Option<&str>, hours_ahead: i64) -> RideDocument {
        RideDocument {
            price: Some(Decimal::new(25, 0)),
            from_address: Some("UCSB".into()),
            to_address: Some("Downtown SB".into()),
            ride_date: Some(Utc::now() + Duration::hours(hours_ahead)),
            seats: Some(3),
            tag: tag.map(String::from),
            ..Default::default()
        }
    }

    fn hosting() -> RideHosting {
        let profiles = StaticProfileDirectory::new();
        profiles.insert("owner", "Olivia");
        RideHosting::new(
            Arc::new(MemoryRideStore::new()),
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(profiles),
        )
    }

    #[tokio::test]
    async fn test_host_fills_owner_name_and_seats() {
        let hosting = hosting();
        let ride = hosting.host(&Caller::new("owner"), document(None, 2)).await.unwrap();
        assert_eq!(ride.owner_name.as_deref(), Some("Olivia"));
        assert_eq!(ride.total_seats, 3);
        assert_eq!(ride.seats_available, 3);

        let listing = hosting.get(ride.id).await.unwrap();
        assert!(!listing.sold_out);
    }

    #[tokio::test]
    async fn test_host_rejects_invalid_document() {
        let hosting = hosting();
        let mut doc = document(None, 2);
        doc.seats = Some(0);
        assert!(matches!(
            hosting.host(&Caller::new("owner"), doc).await,
            Err(BookingError::InvalidRide(_))
        ));
    }

    #[tokio::test]
    async fn test_browse_orders_by_date_and_filters_tag() {
        let hosting = hosting();
        let owner = Caller::new("owner");
        let later = hosting.host(&owner, document(Some("airport"), 5)).await.unwrap();
        let sooner = hosting.host(&owner, document(Some("airport"), 1)).await.unwrap();
        hosting.host(&owner, document(Some("campus"), 3)).await.unwrap();

        let rider = Caller::new("rider");
        let airport = hosting.browse(&rider, Some("airport".into())).await.unwrap();
        let ids: Vec<Uuid> = airport.iter().map(|l| l.ride.id).collect();
        assert_eq!(ids, vec![sooner.id, later.id]);
        assert_eq!(hosting.browse(&rider, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_browse_hides_callers_own_rides() {
        let hosting = hosting();
        hosting.host(&Caller::new("owner"), document(None, 2)).await.unwrap();
        let other = hosting.host(&Caller::new("neighbor"), document(None, 3)).await.unwrap();

        let listings = hosting.browse(&Caller::new("owner"), None).await.unwrap();
        let ids: Vec<Uuid> = listings.iter().map(|l| l.ride.id).collect();
        assert_eq!(ids, vec![other.id]);
    }

    #[tokio::test]
    async fn test_roster_is_owner_only() {
        let hosting = hosting();
        let ride = hosting.host(&Caller::new("owner"), document(None, 2)).await.unwrap();
        assert_eq!(
            hosting.roster(ride.id, &Caller::new("rider")).await.unwrap_err(),
            BookingError::NotAuthorized
        );
        assert!(hosting.roster(ride.id, &Caller::new("owner")).await.unwrap().is_empty());
    }
}
