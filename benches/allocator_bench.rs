//! Benchmarks for the reservation core.
//!
//! Benchmarks cover:
//! - Spot claim/release against zones of different sizes
//! - Booking create/cancel through the service facade
//! - Contended claims from several threads
//! - Payment initiation plus callback reconciliation

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use parkbest_core::builders::{build_service, ServiceParts};
use parkbest_core::config::ParkingConfig;
use parkbest_core::core::{Money, NewZone, SpotAllocator, ZoneId};
use parkbest_core::infra::{InMemoryStore, SandboxGateway};
use parkbest_core::runtime::{CancelBookingRequest, CreateBookingRequest, InitiatePaymentRequest};
use parkbest_core::util::SystemClock;

use tokio::runtime::Runtime;

// ============================================================================
// Fixtures
// ============================================================================

type Parts = ServiceParts<InMemoryStore, Arc<SandboxGateway>>;

fn wired(spots: u32) -> (Parts, Arc<InMemoryStore>, Arc<SandboxGateway>, ZoneId) {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(SandboxGateway::new());
    let parts = build_service(
        &ParkingConfig::default(),
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::new(SystemClock),
    )
    .unwrap();
    let zone = parts
        .service
        .create_zone(NewZone {
            name: "Bench".into(),
            location: "Nairobi".into(),
            hourly_rate: Money::from_minor(10_000),
            total_spots: spots,
        })
        .unwrap()
        .id();
    (parts, store, gateway, zone)
}

fn booking_request(zone: ZoneId) -> CreateBookingRequest {
    CreateBookingRequest {
        user_id: "bench-user".into(),
        zone_id: zone,
        plate: "KAA 001A".into(),
        duration_hours: 2,
    }
}

// ============================================================================
// Allocation
// ============================================================================

fn bench_claim_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator");
    group.throughput(Throughput::Elements(1));

    for spots in [10u32, 100, 1_000] {
        let (_parts, store, _gateway, zone) = wired(spots);
        let allocator = SpotAllocator::new(store);
        group.bench_with_input(BenchmarkId::new("claim_release", spots), &zone, |b, &zone| {
            b.iter(|| {
                let spot = allocator.claim(black_box(zone)).unwrap();
                allocator.release(spot.id()).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_contended_claims(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator_contended");

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64));
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &threads| {
            b.iter_batched(
                || {
                    let spots = u32::try_from(threads / 2).unwrap_or(1).max(1);
                    let (_parts, store, _gateway, zone) = wired(spots);
                    (SpotAllocator::new(store), zone)
                },
                |(allocator, zone)| {
                    thread::scope(|s| {
                        for _ in 0..threads {
                            let allocator = &allocator;
                            s.spawn(move || black_box(allocator.claim(zone).is_ok()));
                        }
                    });
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// Service operations
// ============================================================================

fn bench_create_cancel(c: &mut Criterion) {
    let (parts, _store, _gateway, zone) = wired(50);

    c.bench_function("service/create_cancel", |b| {
        b.iter(|| {
            let booking = parts.service.create_booking(booking_request(zone)).unwrap();
            parts
                .service
                .cancel_booking(&CancelBookingRequest {
                    booking_id: black_box(booking.id()),
                })
                .unwrap();
        });
    });
}

fn bench_payment_round_trip(c: &mut Criterion) {
    let (parts, _store, gateway, zone) = wired(10);
    let parts = Arc::new(parts);

    c.bench_function("service/initiate_and_reconcile", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| {
            let parts = Arc::clone(&parts);
            let gateway = Arc::clone(&gateway);
            async move {
                let booking = parts.service.create_booking(booking_request(zone)).unwrap();
                let initiated = parts
                    .service
                    .initiate_payment(InitiatePaymentRequest {
                        booking_id: booking.id(),
                        payer: "254712345678".into(),
                    })
                    .await
                    .unwrap();
                let raw = gateway
                    .success_callback(&initiated.correlation_id, "BENCH")
                    .unwrap()
                    .to_bytes()
                    .unwrap();
                black_box(parts.service.gateway_callback(&raw));
                parts
                    .service
                    .cancel_booking(&CancelBookingRequest {
                        booking_id: booking.id(),
                    })
                    .unwrap();
            }
        });
    });
}

criterion_group!(allocator_benches, bench_claim_release, bench_contended_claims);
criterion_group!(service_benches, bench_create_cancel, bench_payment_round_trip);
criterion_main!(allocator_benches, service_benches);
