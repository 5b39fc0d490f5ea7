//! Spot allocation under contention.
//!
//! A claim reads the zone's free spots, then tries each candidate in spot-number order
//! with a compare-and-swap of the spot flags (`FREE -> RESERVED`). A failed swap means a
//! concurrent caller won that spot, so the next candidate is tried. The candidate list
//! bounds the retries.

use std::sync::Arc;

use crate::core::error::{ParkingError, StoreError};
use crate::core::model::{Spot, SpotFlags, SpotId, ZoneId};
use crate::core::store::{ResourceStore, Tx};

/// Finds and atomically claims free spots.
pub struct SpotAllocator<S> {
    store: Arc<S>,
}

impl<S> Clone for SpotAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ResourceStore> SpotAllocator<S> {
    /// Create an allocator over a shared store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Free spots of a zone, lowest spot number first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the zone does not exist.
    pub fn candidates(&self, zone: ZoneId) -> Result<Vec<Spot>, ParkingError> {
        self.store
            .read(|tables| {
                tables.zone(zone).map(|_| {
                    tables
                        .free_spots(zone)
                        .into_iter()
                        .cloned()
                        .collect::<Vec<_>>()
                })
            })?
            .ok_or_else(|| ParkingError::not_found("zone", zone))
    }

    /// Claim one free spot, marking it reserved.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the zone has no free spot, `Conflict` when every candidate
    /// was lost to concurrent claims while others remain free, `NotFound` for an unknown zone.
    pub fn claim(&self, zone: ZoneId) -> Result<Spot, ParkingError> {
        self.claim_with(zone, |_, spot| Ok(spot.clone()))
    }

    /// Claim one free spot and run `then` in the same transaction.
    ///
    /// If `then` fails the reservation is rolled back together with anything `then` wrote,
    /// so no spot is left reserved without its dependent rows.
    ///
    /// # Errors
    ///
    /// As [`claim`](Self::claim), plus any error returned by `then`.
    pub fn claim_with<R, F>(&self, zone: ZoneId, mut then: F) -> Result<R, ParkingError>
    where
        F: FnMut(&mut Tx<'_>, &Spot) -> Result<R, ParkingError>,
    {
        let candidates = self.candidates(zone)?;
        if candidates.is_empty() {
            return Err(ParkingError::ResourceExhausted { zone });
        }

        for candidate in &candidates {
            let claimed = self.store.transaction(|tx| -> Result<Option<R>, ParkingError> {
                if !tx.compare_and_set_spot(candidate.id(), SpotFlags::FREE, SpotFlags::RESERVED)? {
                    return Ok(None);
                }
                let spot = tx
                    .spot(candidate.id())
                    .cloned()
                    .ok_or_else(|| StoreError::MissingRecord(format!("spot {}", candidate.id())))?;
                then(tx, &spot).map(Some)
            })?;

            match claimed {
                Some(result) => {
                    tracing::debug!(zone_id = %zone, spot = %candidate.label(), "spot claimed");
                    return Ok(result);
                }
                None => {
                    tracing::debug!(zone_id = %zone, spot = %candidate.label(), "lost claim race, trying next spot");
                }
            }
        }

        let still_free = self.store.read(|tables| tables.free_spots(zone).len())?;
        if still_free == 0 {
            Err(ParkingError::ResourceExhausted { zone })
        } else {
            tracing::warn!(zone_id = %zone, attempts = candidates.len(), "claim lost every race");
            Err(ParkingError::Conflict {
                zone,
                attempts: candidates.len(),
            })
        }
    }

    /// Clear both flags on a spot. Releasing a free spot is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` if the spot does not exist.
    pub fn release(&self, spot: SpotId) -> Result<(), ParkingError> {
        self.store.transaction(|tx| {
            if tx.spot(spot).is_none() {
                return Err(ParkingError::not_found("spot", spot));
            }
            release_in(tx, spot)?;
            Ok(())
        })
    }
}

/// Release a spot inside an open transaction; returns whether the flags changed.
pub(crate) fn release_in(tx: &mut Tx<'_>, spot: SpotId) -> Result<bool, StoreError> {
    let changed = tx.set_spot_flags(spot, SpotFlags::FREE)?;
    if changed {
        tracing::debug!(spot_id = %spot, "spot released");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Money, Zone};
    use crate::infra::store::InMemoryStore;

    fn zone_with_spots(count: u32) -> (Arc<InMemoryStore>, ZoneId) {
        let store = Arc::new(InMemoryStore::new());
        let zone = Zone::new("B".into(), "Moi Avenue".into(), Money::from_minor(8_000), count);
        let zone_id = zone.id();
        store
            .transaction(|tx| {
                tx.insert_zone(zone)?;
                for n in (1..=count).rev() {
                    tx.insert_spot(Spot::new(zone_id, n))?;
                }
                Ok::<_, StoreError>(())
            })
            .unwrap();
        (store, zone_id)
    }

    #[test]
    fn test_claims_lowest_number_first() {
        let (store, zone) = zone_with_spots(3);
        let allocator = SpotAllocator::new(store);
        assert_eq!(allocator.claim(zone).unwrap().number(), 1);
        assert_eq!(allocator.claim(zone).unwrap().number(), 2);
        assert_eq!(allocator.claim(zone).unwrap().number(), 3);
        assert!(matches!(
            allocator.claim(zone),
            Err(ParkingError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_failed_follow_up_returns_spot() {
        let (store, zone) = zone_with_spots(1);
        let allocator = SpotAllocator::new(Arc::clone(&store));
        let result: Result<(), ParkingError> =
            allocator.claim_with(zone, |_, _| Err(ParkingError::Validation("insert failed".into())));
        assert!(result.is_err());
        assert_eq!(allocator.candidates(zone).unwrap().len(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (store, zone) = zone_with_spots(1);
        let allocator = SpotAllocator::new(store);
        let spot = allocator.claim(zone).unwrap();
        allocator.release(spot.id()).unwrap();
        allocator.release(spot.id()).unwrap();
        assert_eq!(allocator.candidates(zone).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_zone_is_not_found() {
        let (store, _) = zone_with_spots(1);
        let allocator = SpotAllocator::new(store);
        assert!(matches!(
            allocator.claim(ZoneId::new()),
            Err(ParkingError::NotFound { .. })
        ));
    }
}
