//! Concurrency tests for spot allocation.
//!
//! This test validates:
//! 1. Two simultaneous bookings for the last spot: exactly one wins
//! 2. N concurrent bookings against K free spots: exactly K succeed
//! 3. No spot is ever held by two live bookings under mixed create/cancel load

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use futures::future::join_all;
use parkbest_core::core::{
    Booking, BookingStatus, ParkingError, ResourceStore, SpotAllocator, ZoneId,
};
use parkbest_core::runtime::CancelBookingRequest;
use rand::Rng;

fn race(h: &common::Harness, zone: ZoneId, contenders: usize) -> Vec<Result<Booking, ParkingError>> {
    let barrier = Barrier::new(contenders);
    thread::scope(|s| {
        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    h.book(zone, &format!("u{i}"), 1)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("booking thread panicked"))
            .collect()
    })
}

fn assert_no_shared_spots(h: &common::Harness) {
    let live = h
        .store
        .read(|t| {
            t.bookings_where(|b| !b.status().is_terminal())
                .into_iter()
                .map(|b| b.spot_id().expect("live booking holds a spot"))
                .collect::<Vec<_>>()
        })
        .unwrap();
    let unique: HashSet<_> = live.iter().copied().collect();
    assert_eq!(unique.len(), live.len(), "a spot is held by two live bookings");
    for spot in live {
        let flags = h.store.read(|t| t.spot(spot).unwrap().flags()).unwrap();
        assert!(!flags.is_free(), "live booking references a free spot");
    }
}

#[test]
fn test_two_bookers_one_spot() {
    let h = common::harness();
    let zone = h.zone("B", 8_000, 1);

    let results = race(&h, zone, 2);
    let won = results.iter().filter(|r| r.is_ok()).count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(ParkingError::ResourceExhausted { .. })))
        .count();
    assert_eq!((won, exhausted), (1, 1));
    assert_no_shared_spots(&h);
}

#[test]
fn test_n_bookers_k_spots() {
    const SPOTS: u32 = 5;
    const BOOKERS: usize = 24;
    let h = common::harness();
    let zone = h.zone("CBD", 10_000, SPOTS);

    let results = race(&h, zone, BOOKERS);
    let won: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(ParkingError::ResourceExhausted { .. })))
        .count();
    assert_eq!(won.len(), SPOTS as usize);
    assert_eq!(exhausted, BOOKERS - SPOTS as usize);

    let spots: HashSet<_> = won.iter().map(|b| b.spot_id()).collect();
    assert_eq!(spots.len(), SPOTS as usize);
    assert!(h.service().zone_spots(zone).unwrap().is_empty());
    assert_no_shared_spots(&h);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_from_tasks() {
    let h = Arc::new(common::harness());
    let zone = h.zone("Upper Hill", 10_000, 3);
    let allocator = SpotAllocator::new(Arc::clone(&h.store));

    let claims = join_all((0..12).map(|_| {
        let allocator = allocator.clone();
        tokio::task::spawn_blocking(move || allocator.claim(zone))
    }))
    .await;
    let claimed: Vec<_> = claims
        .into_iter()
        .map(|joined| joined.expect("claim task panicked"))
        .filter_map(Result::ok)
        .collect();
    assert_eq!(claimed.len(), 3);
    let numbers: HashSet<_> = claimed.iter().map(|s| s.number()).collect();
    assert_eq!(numbers, HashSet::from([1, 2, 3]));
}

#[test]
fn test_mixed_create_cancel_stress() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 40;
    let h = common::harness();
    let zone = h.zone("Stress", 10_000, 4);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let (h, barrier) = (&h, &barrier);
            s.spawn(move || {
                let mut rng = rand::rng();
                barrier.wait();
                for round in 0..ROUNDS {
                    match h.book(zone, &format!("t{t}-{round}"), rng.random_range(1..=24)) {
                        Ok(booking) if rng.random_bool(0.7) => {
                            h.service()
                                .cancel_booking(&CancelBookingRequest {
                                    booking_id: booking.id(),
                                })
                                .expect("cancel own confirmed booking");
                        }
                        Ok(_) => {}
                        Err(e) => assert!(
                            matches!(
                                e,
                                ParkingError::ResourceExhausted { .. } | ParkingError::Conflict { .. }
                            ),
                            "unexpected error: {e}"
                        ),
                    }
                }
            });
        }
    });

    assert_no_shared_spots(&h);
    let live = h
        .store
        .read(|t| {
            t.bookings_where(|b| b.status() == BookingStatus::Confirmed)
                .len()
        })
        .unwrap();
    let free = h.service().zone_spots(zone).unwrap().len();
    assert_eq!(live + free, 4);
}
