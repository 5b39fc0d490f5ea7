//! Persistence contract: the table set, transactional writes and the `ResourceStore` trait.
//!
//! The store is the single mutable source of truth. Every write goes through a [`Tx`],
//! which records an undo entry per change. A transaction that returns `Err` (or unwinds)
//! restores every touched row, so multi-row mutations such as claim + insert or a batch
//! expiry are all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::core::error::StoreError;
use crate::core::model::{
    Booking, BookingId, BookingStatus, Payment, PaymentId, PaymentStatus, Spot, SpotFlags, SpotId,
    Zone, ZoneId,
};

/// Abstraction for persistence backends.
///
/// Implementations must serialise transactions against each other so that every
/// conditional write observes the latest committed state.
pub trait ResourceStore: Send + Sync + 'static {
    /// Run a read-only closure against a consistent view of the tables.
    fn read<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Tables) -> R;

    /// Run a closure inside a transaction; commit on `Ok`, roll back on `Err`.
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<R, E>,
        E: From<StoreError>;
}

/// Serializable image of all tables, used for durable snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Zone rows.
    pub zones: Vec<Zone>,
    /// Spot rows.
    pub spots: Vec<Spot>,
    /// Booking rows.
    pub bookings: Vec<Booking>,
    /// Payment rows.
    pub payments: Vec<Payment>,
}

/// In-memory table set shared by the bundled backends.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    zones: BTreeMap<ZoneId, Zone>,
    spots: BTreeMap<SpotId, Spot>,
    bookings: BTreeMap<BookingId, Booking>,
    payments: BTreeMap<PaymentId, Payment>,
    by_correlation: HashMap<String, PaymentId>,
    by_number: BTreeMap<(ZoneId, u32), SpotId>,
}

impl Tables {
    /// Look up a zone.
    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    /// All zones, in id order.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Look up a spot.
    #[must_use]
    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(&id)
    }

    /// Spots of a zone ordered by spot number.
    #[must_use]
    pub fn spots_in_zone(&self, zone: ZoneId) -> Vec<&Spot> {
        self.zone_spots(zone).collect()
    }

    /// Spots of a zone that are neither occupied nor reserved, lowest number first.
    #[must_use]
    pub fn free_spots(&self, zone: ZoneId) -> Vec<&Spot> {
        self.zone_spots(zone).filter(|s| s.flags().is_free()).collect()
    }

    fn zone_spots(&self, zone: ZoneId) -> impl Iterator<Item = &Spot> {
        self.by_number
            .range((zone, u32::MIN)..=(zone, u32::MAX))
            .filter_map(|(_, id)| self.spots.get(id))
    }

    /// Look up a booking.
    #[must_use]
    pub fn booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.get(&id)
    }

    /// Bookings matching a predicate.
    pub fn bookings_where<P>(&self, predicate: P) -> Vec<&Booking>
    where
        P: Fn(&Booking) -> bool,
    {
        self.bookings.values().filter(|b| predicate(b)).collect()
    }

    /// Look up a payment.
    #[must_use]
    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    /// Look up a payment by gateway correlation id.
    #[must_use]
    pub fn payment_by_correlation(&self, correlation_id: &str) -> Option<&Payment> {
        self.by_correlation
            .get(correlation_id)
            .and_then(|id| self.payments.get(id))
    }

    /// Payments matching a predicate.
    pub fn payments_where<P>(&self, predicate: P) -> Vec<&Payment>
    where
        P: Fn(&Payment) -> bool,
    {
        self.payments.values().filter(|p| predicate(p)).collect()
    }

    /// The completed payment for a booking, if any.
    #[must_use]
    pub fn completed_payment_for(&self, booking: BookingId) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.booking_id() == booking && p.status() == PaymentStatus::Completed)
    }

    /// Copy every row into a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            zones: self.zones.values().cloned().collect(),
            spots: self.spots.values().cloned().collect(),
            bookings: self.bookings.values().cloned().collect(),
            payments: self.payments.values().cloned().collect(),
        }
    }

    /// Rebuild tables (and indexes) from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` or `StoreError::MissingRecord` when the snapshot
    /// violates key or reference constraints.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut tables = Self::default();
        let mut tx = Tx::begin(&mut tables);
        for zone in snapshot.zones {
            tx.insert_zone(zone)?;
        }
        for spot in snapshot.spots {
            tx.insert_spot(spot)?;
        }
        for booking in snapshot.bookings {
            tx.insert_booking(booking)?;
        }
        for payment in snapshot.payments {
            tx.insert_payment(payment)?;
        }
        tx.commit();
        Ok(tables)
    }
}

enum Undo {
    Zone(ZoneId, Option<Zone>),
    Spot(SpotId, Option<Spot>),
    Booking(BookingId, Option<Booking>),
    Payment(PaymentId, Option<Payment>),
}

/// Write handle for one transaction.
///
/// Dereferences to [`Tables`] for reads. Dropping an uncommitted `Tx` rolls back every
/// write made through it.
pub struct Tx<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Tx<'a> {
    /// Open a transaction over exclusively borrowed tables.
    pub fn begin(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    /// Keep all writes.
    pub fn commit(mut self) {
        self.committed = true;
        self.undo.clear();
    }

    /// Number of rows written so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.undo.len()
    }

    /// Insert a new zone.
    ///
    /// # Errors
    ///
    /// `StoreError::Duplicate` if the id exists.
    pub fn insert_zone(&mut self, zone: Zone) -> Result<(), StoreError> {
        let id = zone.id();
        if self.tables.zones.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("zone {id}")));
        }
        self.tables.zones.insert(id, zone);
        self.undo.push(Undo::Zone(id, None));
        Ok(())
    }

    /// Apply `f` to an existing zone and return the updated copy.
    ///
    /// # Errors
    ///
    /// `StoreError::MissingRecord` if the zone does not exist.
    pub fn update_zone<F>(&mut self, id: ZoneId, f: F) -> Result<Zone, StoreError>
    where
        F: FnOnce(&mut Zone),
    {
        let zone = self
            .tables
            .zones
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRecord(format!("zone {id}")))?;
        self.undo.push(Undo::Zone(id, Some(zone.clone())));
        f(zone);
        Ok(zone.clone())
    }

    /// Insert a new spot; its zone must exist and its number must be unused in that zone.
    ///
    /// # Errors
    ///
    /// `StoreError::MissingRecord` or `StoreError::Duplicate`.
    pub fn insert_spot(&mut self, spot: Spot) -> Result<(), StoreError> {
        let id = spot.id();
        if !self.tables.zones.contains_key(&spot.zone_id()) {
            return Err(StoreError::MissingRecord(format!("zone {}", spot.zone_id())));
        }
        let key = (spot.zone_id(), spot.number());
        if self.tables.spots.contains_key(&id) || self.tables.by_number.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "spot {} in zone {}",
                spot.label(),
                spot.zone_id()
            )));
        }
        self.tables.by_number.insert(key, id);
        self.tables.spots.insert(id, spot);
        self.undo.push(Undo::Spot(id, None));
        Ok(())
    }

    /// Set a spot's flags to `next` only if they currently equal `expected`.
    ///
    /// Returns `false` when another writer changed the spot first.
    ///
    /// # Errors
    ///
    /// `StoreError::MissingRecord` if the spot does not exist.
    pub fn compare_and_set_spot(
        &mut self,
        id: SpotId,
        expected: SpotFlags,
        next: SpotFlags,
    ) -> Result<bool, StoreError> {
        let spot = self
            .tables
            .spots
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRecord(format!("spot {id}")))?;
        if spot.flags() != expected {
            return Ok(false);
        }
        self.undo.push(Undo::Spot(id, Some(spot.clone())));
        spot.set_flags(next);
        Ok(true)
    }

    /// Overwrite a spot's flags. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// `StoreError::MissingRecord` if the spot does not exist.
    pub fn set_spot_flags(&mut self, id: SpotId, flags: SpotFlags) -> Result<bool, StoreError> {
        let spot = self
            .tables
            .spots
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRecord(format!("spot {id}")))?;
        if spot.flags() == flags {
            return Ok(false);
        }
        self.undo.push(Undo::Spot(id, Some(spot.clone())));
        spot.set_flags(flags);
        Ok(true)
    }

    /// Insert a new booking.
    ///
    /// # Errors
    ///
    /// `StoreError::Duplicate` if the id exists.
    pub fn insert_booking(&mut self, booking: Booking) -> Result<(), StoreError> {
        let id = booking.id();
        if self.tables.bookings.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("booking {id}")));
        }
        self.tables.bookings.insert(id, booking);
        self.undo.push(Undo::Booking(id, None));
        Ok(())
    }

    /// Apply `f` to a booking only if its status is one of `allowed`.
    ///
    /// Returns the updated copy, or `None` when the status predicate did not hold.
    ///
    /// # Errors
    ///
    /// `StoreError::MissingRecord` if the booking does not exist.
    pub fn update_booking_if<F>(
        &mut self,
        id: BookingId,
        allowed: &[BookingStatus],
        f: F,
    ) -> Result<Option<Booking>, StoreError>
    where
        F: FnOnce(&mut Booking),
    {
        let booking = self
            .tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRecord(format!("booking {id}")))?;
        if !allowed.contains(&booking.status()) {
            return Ok(None);
        }
        self.undo.push(Undo::Booking(id, Some(booking.clone())));
        f(booking);
        Ok(Some(booking.clone()))
    }

    /// Insert a new payment.
    ///
    /// # Errors
    ///
    /// `StoreError::Duplicate` if the id or correlation id exists, `StoreError::MissingRecord`
    /// if the booking does not.
    pub fn insert_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        let id = payment.id();
        if !self.tables.bookings.contains_key(&payment.booking_id()) {
            return Err(StoreError::MissingRecord(format!(
                "booking {}",
                payment.booking_id()
            )));
        }
        if self.tables.payments.contains_key(&id)
            || self.tables.by_correlation.contains_key(payment.correlation_id())
        {
            return Err(StoreError::Duplicate(format!(
                "payment {id} / correlation {}",
                payment.correlation_id()
            )));
        }
        self.tables
            .by_correlation
            .insert(payment.correlation_id().to_owned(), id);
        self.tables.payments.insert(id, payment);
        self.undo.push(Undo::Payment(id, None));
        Ok(())
    }

    /// Apply `f` to a payment only if its status is one of `allowed`.
    ///
    /// # Errors
    ///
    /// `StoreError::MissingRecord` if the payment does not exist.
    pub fn update_payment_if<F>(
        &mut self,
        id: PaymentId,
        allowed: &[PaymentStatus],
        f: F,
    ) -> Result<Option<Payment>, StoreError>
    where
        F: FnOnce(&mut Payment),
    {
        let payment = self
            .tables
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRecord(format!("payment {id}")))?;
        if !allowed.contains(&payment.status()) {
            return Ok(None);
        }
        self.undo.push(Undo::Payment(id, Some(payment.clone())));
        f(payment);
        Ok(Some(payment.clone()))
    }

    fn undo_all(&mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Zone(id, Some(zone)) => {
                    self.tables.zones.insert(id, zone);
                }
                Undo::Zone(id, None) => {
                    self.tables.zones.remove(&id);
                }
                Undo::Spot(id, Some(spot)) => {
                    self.tables.spots.insert(id, spot);
                }
                Undo::Spot(id, None) => {
                    if let Some(spot) = self.tables.spots.remove(&id) {
                        self.tables.by_number.remove(&(spot.zone_id(), spot.number()));
                    }
                }
                Undo::Booking(id, Some(booking)) => {
                    self.tables.bookings.insert(id, booking);
                }
                Undo::Booking(id, None) => {
                    self.tables.bookings.remove(&id);
                }
                Undo::Payment(id, Some(payment)) => {
                    self.tables.payments.insert(id, payment);
                }
                Undo::Payment(id, None) => {
                    if let Some(payment) = self.tables.payments.remove(&id) {
                        self.tables.by_correlation.remove(payment.correlation_id());
                    }
                }
            }
        }
    }
}

impl Deref for Tx<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &*self.tables
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            tracing::debug!(writes = self.undo.len(), "rolling back transaction");
            self.undo_all();
        }
    }
}
