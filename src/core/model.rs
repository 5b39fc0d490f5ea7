//! Domain records: zones, spots, bookings, payments and the value types they share.
//!
//! Records are owned by the [`ResourceStore`](crate::core::ResourceStore). Copies handed
//! out to callers are snapshots valid for one operation; every mutation goes back through
//! a store transaction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a parking zone.
    ZoneId
);
uuid_id!(
    /// Unique identifier for a parking spot.
    SpotId
);
uuid_id!(
    /// Unique identifier for a booking.
    BookingId
);
uuid_id!(
    /// Unique identifier for one payment attempt.
    PaymentId
);

/// Opaque reference to a user owned by the identity collaborator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a user reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Currency amount in integer minor units (cents).
///
/// All cost arithmetic is exact; there is no floating-point path into or out of this type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units, `None` on overflow.
    #[must_use]
    pub const fn checked_from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Whole major units (rounded down).
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.0 / 100
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity, `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Parses a decimal string in major units (`"200"`, `"200.5"`, `"200.50"`).
    ///
    /// At most two fractional digits are accepted; signs and exponents are rejected.
    #[must_use]
    pub fn parse_major(input: &str) -> Option<Self> {
        let input = input.trim();
        let (whole, fraction) = match input.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (input, ""),
        };
        if whole.is_empty() || fraction.len() > 2 {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let whole: u64 = whole.parse().ok()?;
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };
        whole.checked_mul(100)?.checked_add(cents).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Zones and spots
// ============================================================================

/// A named area holding a fixed set of spots at one hourly rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    id: ZoneId,
    name: String,
    location: String,
    hourly_rate: Money,
    total_spots: u32,
    active: bool,
}

impl Zone {
    pub(crate) fn new(name: String, location: String, hourly_rate: Money, total_spots: u32) -> Self {
        Self {
            id: ZoneId::new(),
            name,
            location,
            hourly_rate,
            total_spots,
            active: true,
        }
    }

    /// Zone identifier.
    #[must_use]
    pub const fn id(&self) -> ZoneId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form location description.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Current hourly rate. Only affects bookings created after a change.
    #[must_use]
    pub const fn hourly_rate(&self) -> Money {
        self.hourly_rate
    }

    /// Number of spots provisioned for this zone.
    #[must_use]
    pub const fn total_spots(&self) -> u32 {
        self.total_spots
    }

    /// Whether new bookings are accepted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_hourly_rate(&mut self, rate: Money) {
        self.hourly_rate = rate;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Occupancy flags of a spot, the unit of compare-and-swap for allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotFlags {
    /// A vehicle is checked in.
    pub occupied: bool,
    /// Held for a confirmed booking that has not checked in yet.
    pub reserved: bool,
}

impl SpotFlags {
    /// Neither occupied nor reserved.
    pub const FREE: Self = Self {
        occupied: false,
        reserved: false,
    };
    /// Held for a confirmed booking.
    pub const RESERVED: Self = Self {
        occupied: false,
        reserved: true,
    };
    /// In use by an active booking.
    pub const OCCUPIED: Self = Self {
        occupied: true,
        reserved: false,
    };

    /// True when the spot can be claimed.
    #[must_use]
    pub const fn is_free(self) -> bool {
        !self.occupied && !self.reserved
    }
}

/// One physical parking position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    id: SpotId,
    zone_id: ZoneId,
    number: u32,
    occupied: bool,
    reserved: bool,
}

impl Spot {
    pub(crate) fn new(zone_id: ZoneId, number: u32) -> Self {
        Self {
            id: SpotId::new(),
            zone_id,
            number,
            occupied: false,
            reserved: false,
        }
    }

    /// Spot identifier.
    #[must_use]
    pub const fn id(&self) -> SpotId {
        self.id
    }

    /// Owning zone.
    #[must_use]
    pub const fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    /// Spot number, unique within the zone.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Zero-padded label shown on signage, e.g. `"007"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:03}", self.number)
    }

    /// Whether a vehicle is checked in.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Whether the spot is held for a confirmed booking.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Current flags.
    #[must_use]
    pub const fn flags(&self) -> SpotFlags {
        SpotFlags {
            occupied: self.occupied,
            reserved: self.reserved,
        }
    }

    pub(crate) fn set_flags(&mut self, flags: SpotFlags) {
        self.occupied = flags.occupied;
        self.reserved = flags.reserved;
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Spot reserved, vehicle not yet checked in.
    Confirmed,
    /// Vehicle checked in.
    Active,
    /// Checked out or expired.
    Completed,
    /// Cancelled before check-in.
    Cancelled,
}

impl BookingStatus {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed or cancelled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment shadow flag carried on a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    /// No completed payment recorded.
    Unpaid,
    /// A payment for this booking completed while it was confirmed.
    Paid,
}

/// A time-bounded claim on one spot by one user, with a frozen cost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    user_id: UserId,
    spot_id: Option<SpotId>,
    vehicle_plate: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_cost: Money,
    status: BookingStatus,
    payment_status: BookingPaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Booking {
    pub(crate) fn confirmed(
        user_id: UserId,
        spot_id: SpotId,
        vehicle_plate: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        total_cost: Money,
    ) -> Self {
        Self {
            id: BookingId::new(),
            user_id,
            spot_id: Some(spot_id),
            vehicle_plate,
            start_time,
            end_time,
            total_cost,
            status: BookingStatus::Confirmed,
            payment_status: BookingPaymentStatus::Unpaid,
            created_at: start_time,
            updated_at: start_time,
        }
    }

    /// Booking identifier.
    #[must_use]
    pub const fn id(&self) -> BookingId {
        self.id
    }

    /// Owning user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Held spot; `None` once the booking is completed or cancelled.
    #[must_use]
    pub const fn spot_id(&self) -> Option<SpotId> {
        self.spot_id
    }

    /// Vehicle registration plate (normalised to upper case).
    #[must_use]
    pub fn vehicle_plate(&self) -> &str {
        &self.vehicle_plate
    }

    /// Start of the booked window.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// End of the booked window.
    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Cost frozen at creation.
    #[must_use]
    pub const fn total_cost(&self) -> Money {
        self.total_cost
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn status(&self) -> BookingStatus {
        self.status
    }

    /// Payment shadow flag.
    #[must_use]
    pub const fn payment_status(&self) -> BookingPaymentStatus {
        self.payment_status
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last transition timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn activate(&mut self, at: DateTime<Utc>) {
        self.status = BookingStatus::Active;
        self.updated_at = at;
    }

    pub(crate) fn complete(&mut self, at: DateTime<Utc>) {
        self.status = BookingStatus::Completed;
        self.spot_id = None;
        self.updated_at = at;
    }

    pub(crate) fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = BookingStatus::Cancelled;
        self.spot_id = None;
        self.updated_at = at;
    }

    pub(crate) fn mark_paid(&mut self, at: DateTime<Utc>) {
        self.payment_status = BookingPaymentStatus::Paid;
        self.updated_at = at;
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Payment attempt state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Initiated at the gateway, outcome unknown.
    Pending,
    /// Gateway confirmed success; receipt recorded.
    Completed,
    /// Gateway reported failure, or the attempt went stale.
    Failed,
}

impl PaymentStatus {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed or failed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to pay for a booking through the external gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    booking_id: BookingId,
    amount: Money,
    payer: String,
    correlation_id: String,
    status: PaymentStatus,
    receipt: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub(crate) fn pending(
        booking_id: BookingId,
        amount: Money,
        payer: String,
        correlation_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            booking_id,
            amount,
            payer,
            correlation_id,
            status: PaymentStatus::Pending,
            receipt: None,
            created_at,
            completed_at: None,
        }
    }

    /// Payment identifier.
    #[must_use]
    pub const fn id(&self) -> PaymentId {
        self.id
    }

    /// Booking this attempt pays for.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    /// Amount requested; equals the booking's total cost.
    #[must_use]
    pub const fn amount(&self) -> Money {
        self.amount
    }

    /// Payer identifier (phone number) sent to the gateway.
    #[must_use]
    pub fn payer(&self) -> &str {
        &self.payer
    }

    /// Gateway checkout request id.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Attempt state.
    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Gateway receipt, present iff the payment completed.
    #[must_use]
    pub fn receipt(&self) -> Option<&str> {
        self.receipt.as_deref()
    }

    /// When the attempt was initiated.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the gateway confirmed success.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub(crate) fn complete(&mut self, receipt: String, at: DateTime<Utc>) {
        self.status = PaymentStatus::Completed;
        self.receipt = Some(receipt);
        self.completed_at = Some(at);
    }

    pub(crate) fn fail(&mut self) {
        self.status = PaymentStatus::Failed;
        self.receipt = None;
    }
}
