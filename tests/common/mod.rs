//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parkbest_core::builders::{build_service, ServiceParts};
use parkbest_core::config::ParkingConfig;
use parkbest_core::core::{
    Booking, Money, NewZone, ParkingError, ResourceStore, StoreError, Tables, Tx, UserId, ZoneId,
};
use parkbest_core::infra::{InMemoryStore, SandboxGateway};
use parkbest_core::runtime::CreateBookingRequest;
use parkbest_core::util::ManualClock;

pub type Service<S = InMemoryStore> = parkbest_core::runtime::ParkingService<S, Arc<SandboxGateway>>;

pub struct Harness<S: ResourceStore = InMemoryStore> {
    pub parts: ServiceParts<S, Arc<SandboxGateway>>,
    pub store: Arc<S>,
    pub gateway: Arc<SandboxGateway>,
    pub clock: Arc<ManualClock>,
}

impl<S: ResourceStore> Harness<S> {
    pub fn service(&self) -> &Service<S> {
        &self.parts.service
    }

    pub fn zone(&self, name: &str, rate_minor: u64, spots: u32) -> ZoneId {
        self.service()
            .create_zone(NewZone {
                name: name.into(),
                location: "Nairobi CBD".into(),
                hourly_rate: Money::from_minor(rate_minor),
                total_spots: spots,
            })
            .expect("zone created")
            .id()
    }

    pub fn book(&self, zone: ZoneId, user: &str, hours: u32) -> Result<Booking, ParkingError> {
        self.service().create_booking(CreateBookingRequest {
            user_id: UserId::new(user),
            zone_id: zone,
            plate: format!("KAA {user}"),
            duration_hours: hours,
        })
    }
}

pub fn config() -> ParkingConfig {
    let mut cfg = ParkingConfig::default();
    cfg.gateway.timeout_secs = 1;
    cfg
}

pub fn harness() -> Harness {
    harness_with(Arc::new(InMemoryStore::new()))
}

pub fn harness_with<S: ResourceStore>(store: Arc<S>) -> Harness<S> {
    let gateway = Arc::new(SandboxGateway::new());
    let clock = Arc::new(ManualClock::starting_now());
    let parts = build_service(&config(), Arc::clone(&store), Arc::clone(&gateway), clock.clone())
        .expect("service wired");
    Harness {
        parts,
        store,
        gateway,
        clock,
    }
}

/// Store wrapper whose next `n` transactions fail at commit time, after the closure ran.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

impl ResourceStore for FlakyStore {
    fn read<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Tables) -> R,
    {
        self.inner.read(f)
    }

    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        self.inner.transaction(|tx| {
            let result = f(tx)?;
            if fail {
                return Err(StoreError::Backend("injected commit failure".into()).into());
            }
            Ok(result)
        })
    }
}
