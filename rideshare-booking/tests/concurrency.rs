mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{start, ContendedRideStore, Harness, RejectingNotificationStore};
use rideshare_booking::ledger::SeatLedger;
use rideshare_booking::{Collaborators, EngineSettings, RideEngine};
use rideshare_core::clock::FixedClock;
use rideshare_core::collaborators::{NoopConversations, StaticProfileDirectory};
use rideshare_core::identity::Caller;
use rideshare_core::repository::{NotificationStore, RideStore};
use rideshare_core::BookingError;
use rideshare_store::MemoryNotificationStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_oversell() {
    const SEATS: u32 = 3;
    const RIDERS: usize = 12;

    // A rider can only lose the race to a successful join, so SEATS + 1 attempts always suffice.
    let h = Arc::new(Harness::new(
        EngineSettings::default().with_retry(SEATS + 1, Duration::from_millis(1)),
    ));
    let ride = h.host("owner", SEATS, 20).await;

    let mut handles = Vec::with_capacity(RIDERS);
    for i in 0..RIDERS {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.engine.join(ride.id, &Caller::new(format!("rider-{}", i)), None).await
        }));
    }

    let mut joined = 0;
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(BookingError::SoldOut) => sold_out += 1,
            Err(other) => panic!("unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(joined, SEATS as usize);
    assert_eq!(sold_out, RIDERS - SEATS as usize);

    let snapshot = h.snapshot(ride.id).await;
    assert_eq!(snapshot.ride.seats_available, 0);
    assert_eq!(snapshot.joins.len(), SEATS as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_default_retry_budget_fills_every_seat() {
    const SEATS: u32 = 16;

    let settings = EngineSettings::default();
    assert!(SEATS > settings.retry.max_attempts);
    let h = Arc::new(Harness::new(settings));
    let ride = h.host("owner", SEATS, 20).await;

    let handles: Vec<_> = (0..SEATS)
        .map(|i| {
            let h = h.clone();
            tokio::spawn(async move { h.engine.join(ride.id, &Caller::new(format!("rider-{}", i)), None).await })
        })
        .collect();

    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            panic!("every rider should get a seat, got {:?}", err);
        }
    }

    let snapshot = h.snapshot(ride.id).await;
    assert_eq!(snapshot.ride.seats_available, 0);
    assert_eq!(snapshot.joins.len(), SEATS as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_leaves_all_count() {
    let h = Arc::new(Harness::new(EngineSettings::default().with_retry(8, Duration::from_millis(1))));
    let ride = h.host("owner", 6, 20).await;
    for i in 0..6 {
        h.engine.join(ride.id, &Caller::new(format!("rider-{}", i)), None).await.unwrap();
    }

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let h = h.clone();
            tokio::spawn(async move { h.engine.leave(ride.id, &Caller::new(format!("rider-{}", i))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = h.snapshot(ride.id).await;
    assert_eq!(snapshot.ride.seats_available, 6);
    assert!(snapshot.joins.is_empty());
}

#[tokio::test]
async fn test_random_sequences_keep_seat_ledger_consistent() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let riders: Vec<Caller> = (0..6).map(|i| Caller::new(format!("rider-{}", i))).collect();

    for _round in 0..20 {
        let h = Harness::new(EngineSettings::default());
        let seats = rng.gen_range(1..=4);
        let ride = h.host("owner", seats, 20).await;
        let mut joined: BTreeSet<String> = BTreeSet::new();

        for _step in 0..40 {
            let rider = &riders[rng.gen_range(0..riders.len())];
            if rng.gen_bool(0.6) {
                match h.engine.join(ride.id, rider, None).await {
                    Ok(_) => assert!(joined.insert(rider.user_id.clone())),
                    Err(BookingError::AlreadyJoined) => assert!(joined.contains(&rider.user_id)),
                    Err(BookingError::SoldOut) => assert_eq!(joined.len(), seats as usize),
                    Err(other) => panic!("unexpected join outcome: {:?}", other),
                }
            } else {
                match h.engine.leave(ride.id, rider).await {
                    Ok(_) => assert!(joined.remove(&rider.user_id)),
                    Err(BookingError::NotJoined) => assert!(!joined.contains(&rider.user_id)),
                    Err(other) => panic!("unexpected leave outcome: {:?}", other),
                }
            }

            let snapshot = h.snapshot(ride.id).await;
            assert!(SeatLedger::is_consistent(&snapshot.ride, snapshot.joins.len()));
            let stored: BTreeSet<String> = snapshot.rider_ids().map(String::from).collect();
            assert_eq!(stored, joined);
        }
    }
}

#[tokio::test]
async fn test_exhausted_retries_surface_transient_conflict() {
    let rides = Arc::new(ContendedRideStore::new());
    let engine = RideEngine::new(
        rides.clone(),
        Arc::new(MemoryNotificationStore::new()),
        EngineSettings::default().with_retry(3, Duration::from_millis(1)),
        Collaborators {
            clock: Arc::new(FixedClock::new(start())),
            profiles: Arc::new(StaticProfileDirectory::new()),
            conversations: Arc::new(NoopConversations),
        },
    );
    let ride = engine
        .host(
            &Caller::new("owner"),
            rideshare_shared::RideDocument {
                from_address: Some("UCSB".into()),
                to_address: Some("SBA".into()),
                ride_date: Some(start()),
                total_seats: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = engine.join(ride.id, &Caller::new("A"), None).await.unwrap_err();
    assert_eq!(err, BookingError::TransientConflict { attempts: 3 });
    assert!(err.is_transient());
    assert_eq!(rides.commits.load(Ordering::SeqCst), 3);

    let snapshot = rides.inner.snapshot(ride.id).await.unwrap().unwrap();
    assert_eq!(snapshot.ride.seats_available, 1);
    assert!(snapshot.joins.is_empty());
}

#[tokio::test]
async fn test_partial_fanout_failure_still_delivers_to_the_rest() {
    let notifications = Arc::new(RejectingNotificationStore::new(&["C"]));
    let rides = Arc::new(rideshare_store::MemoryRideStore::new());
    let engine = RideEngine::new(
        rides,
        notifications.clone(),
        EngineSettings::default(),
        Collaborators {
            clock: Arc::new(FixedClock::new(start())),
            profiles: Arc::new(StaticProfileDirectory::new()),
            conversations: Arc::new(NoopConversations),
        },
    );
    let ride = engine
        .host(
            &Caller::new("owner"),
            rideshare_shared::RideDocument {
                from_address: Some("UCSB".into()),
                to_address: Some("SBA".into()),
                ride_date: Some(start() + chrono::Duration::days(1)),
                total_seats: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for rider in ["A", "B", "C", "D", "E"] {
        engine.join(ride.id, &Caller::new(rider), None).await.unwrap();
    }

    let result = engine.cancel(ride.id, &Caller::new("owner"), "engine light").await.unwrap();
    assert_eq!(result.notified.len(), 5);
    assert_eq!(result.joins_removed, Some(5));

    for rider in ["A", "B", "D", "E"] {
        assert_eq!(notifications.list_for_user(rider).await.unwrap().len(), 1);
    }
    assert!(notifications.list_for_user("C").await.unwrap().is_empty());
    // Four deliveries on the first try, three tries for the rejected recipient.
    assert_eq!(notifications.attempts.load(Ordering::SeqCst), 7);
}
