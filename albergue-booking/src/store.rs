use albergue_catalog::{Bed, OccupancyStats};
use albergue_shared::GuestRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{Reservation, StayRange};
use crate::payment::{PaymentEvent, PaymentRecord};

/// The engine's store handle. Each mutating method is one atomic unit: the
/// reservation-status and bed-status writes it describes either all land or
/// none do, and the preconditions are re-checked inside the unit — a caller's
/// earlier availability read is never trusted.
///
/// Implementations: an in-memory store (one write-lock scope per unit) and a
/// Postgres store (one transaction per unit, bed row locked FOR UPDATE).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert catalog beds whose `(room_number, bed_number)` position is not
    /// present yet. Idempotent: existing beds, their ids and their prices are
    /// left untouched. Returns how many beds were inserted.
    async fn seed_beds(&self, beds: Vec<Bed>) -> Result<usize, BookingError>;

    /// All beds ordered by room number, then bed number.
    async fn list_beds(&self) -> Result<Vec<Bed>, BookingError>;

    async fn get_bed(&self, bed_id: Uuid) -> Result<Bed, BookingError>;

    async fn get_reservation(&self, reservation_id: Uuid) -> Result<Reservation, BookingError>;

    async fn get_payment(&self, reservation_id: Uuid) -> Result<PaymentRecord, BookingError>;

    /// Reservations that still claim a bed and overlap the stay.
    async fn active_reservations(&self, stay: &StayRange)
        -> Result<Vec<Reservation>, BookingError>;

    /// Place a hold: re-check the bed inside the unit (status AVAILABLE and no
    /// overlapping claim), create the RESERVED reservation with its PENDING
    /// payment record, and flip the bed to RESERVED. `BedUnavailable` when a
    /// concurrent request got there first.
    async fn create_hold(
        &self,
        bed_id: Uuid,
        guest_ref: GuestRef,
        stay: StayRange,
        hold_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError>;

    /// Settlement: RESERVED → CONFIRMED, bed → OCCUPIED, payment → COMPLETED,
    /// in one unit. `SettlementConflict` when the reservation is no longer
    /// RESERVED (expired, cancelled, or already settled) — never partial
    /// effects.
    async fn confirm_and_occupy(
        &self,
        reservation_id: Uuid,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError>;

    /// Mark the payment record FAILED after a declined payment. The
    /// reservation keeps its hold and runs out naturally.
    async fn record_payment_failure(
        &self,
        reservation_id: Uuid,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError>;

    /// Expire one lapsed hold: RESERVED → EXPIRED, bed → AVAILABLE, pending
    /// payment → CANCELLED. The status transition is the idempotence guard;
    /// a hold already moved on yields `InvalidTransition`.
    async fn expire_hold(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError>;

    /// Ids of reservations due for expiry: RESERVED, deadline passed, not yet
    /// swept. Ordered by deadline so the oldest holds free up first.
    async fn due_expiries(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, BookingError>;

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError>;

    async fn check_in(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError>;

    async fn check_out(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError>;

    async fn occupancy_stats(&self) -> Result<OccupancyStats, BookingError>;
}
