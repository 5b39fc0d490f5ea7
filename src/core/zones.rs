//! Zone provisioning and availability queries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::ParkingError;
use crate::core::model::{Money, Spot, Zone, ZoneId};
use crate::core::store::ResourceStore;

/// Upper bound on spots provisioned for one zone.
pub const MAX_SPOTS_PER_ZONE: u32 = 10_000;

/// Request to provision a zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewZone {
    /// Display name.
    pub name: String,
    /// Location description.
    pub location: String,
    /// Hourly rate.
    pub hourly_rate: Money,
    /// Spots to create, numbered from 1.
    pub total_spots: u32,
}

/// Active zone with its current free-spot count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAvailability {
    /// Zone record.
    pub zone: Zone,
    /// Spots neither occupied nor reserved.
    pub available_spots: usize,
}

/// Administrative access to zones.
pub struct ZoneDirectory<S> {
    store: Arc<S>,
}

impl<S: ResourceStore> ZoneDirectory<S> {
    /// Create a directory over a shared store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a zone and its spots in one transaction.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty name, zero rate, or a spot count outside
    /// `1..=MAX_SPOTS_PER_ZONE`.
    pub fn create_zone(&self, request: NewZone) -> Result<Zone, ParkingError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ParkingError::Validation("zone name is required".into()));
        }
        if request.hourly_rate.is_zero() {
            return Err(ParkingError::Validation("hourly rate must be positive".into()));
        }
        if request.total_spots == 0 || request.total_spots > MAX_SPOTS_PER_ZONE {
            return Err(ParkingError::Validation(format!(
                "total spots must be between 1 and {MAX_SPOTS_PER_ZONE}"
            )));
        }

        let zone = Zone::new(
            name.to_owned(),
            request.location.trim().to_owned(),
            request.hourly_rate,
            request.total_spots,
        );
        let zone_id = zone.id();
        self.store.transaction(|tx| -> Result<(), ParkingError> {
            tx.insert_zone(zone.clone())?;
            for number in 1..=request.total_spots {
                tx.insert_spot(Spot::new(zone_id, number))?;
            }
            Ok(())
        })?;
        tracing::info!(zone_id = %zone_id, name = %zone.name(), spots = zone.total_spots(), "zone created");
        Ok(zone)
    }

    /// Change the hourly rate for future bookings.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero rate, `NotFound` for an unknown zone.
    pub fn set_hourly_rate(&self, zone: ZoneId, rate: Money) -> Result<Zone, ParkingError> {
        if rate.is_zero() {
            return Err(ParkingError::Validation("hourly rate must be positive".into()));
        }
        self.update(zone, |z| z.set_hourly_rate(rate))
    }

    /// Open or close a zone for new bookings.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown zone.
    pub fn set_active(&self, zone: ZoneId, active: bool) -> Result<Zone, ParkingError> {
        self.update(zone, |z| z.set_active(active))
    }

    /// Look up a zone.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown zone.
    pub fn zone(&self, zone: ZoneId) -> Result<Zone, ParkingError> {
        self.store
            .read(|tables| tables.zone(zone).cloned())?
            .ok_or_else(|| ParkingError::not_found("zone", zone))
    }

    /// Active zones ordered by name, with free-spot counts.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn availability(&self) -> Result<Vec<ZoneAvailability>, ParkingError> {
        let mut zones = self.store.read(|tables| {
            tables
                .zones()
                .filter(|z| z.is_active())
                .map(|z| ZoneAvailability {
                    zone: z.clone(),
                    available_spots: tables.free_spots(z.id()).len(),
                })
                .collect::<Vec<_>>()
        })?;
        zones.sort_by(|a, b| a.zone.name().cmp(b.zone.name()));
        Ok(zones)
    }

    /// Free spots of a zone, lowest number first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown zone.
    pub fn free_spots(&self, zone: ZoneId) -> Result<Vec<Spot>, ParkingError> {
        self.store
            .read(|tables| {
                tables
                    .zone(zone)
                    .map(|_| tables.free_spots(zone).into_iter().cloned().collect::<Vec<_>>())
            })?
            .ok_or_else(|| ParkingError::not_found("zone", zone))
    }

    fn update<F>(&self, zone: ZoneId, f: F) -> Result<Zone, ParkingError>
    where
        F: FnOnce(&mut Zone),
    {
        let updated = self.store.transaction(|tx| -> Result<Zone, ParkingError> {
            if tx.zone(zone).is_none() {
                return Err(ParkingError::not_found("zone", zone));
            }
            Ok(tx.update_zone(zone, f)?)
        })?;
        tracing::info!(
            zone_id = %zone,
            hourly_rate = %updated.hourly_rate(),
            active = updated.is_active(),
            "zone updated"
        );
        Ok(updated)
    }
}
