use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldCreatedEvent {
    pub reservation_id: Uuid,
    pub bed_id: Uuid,
    pub hold_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldExpiredEvent {
    pub reservation_id: Uuid,
    pub bed_id: Uuid,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationConfirmedEvent {
    pub reservation_id: Uuid,
    pub bed_id: Uuid,
    pub amount_cents: i32,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationCancelledEvent {
    pub reservation_id: Uuid,
    pub bed_id: Option<Uuid>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct GuestCheckedInEvent {
    pub reservation_id: Uuid,
    pub bed_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct GuestCheckedOutEvent {
    pub reservation_id: Uuid,
    pub bed_id: Uuid,
    pub checked_out_at: DateTime<Utc>,
}

/// Envelope for the engine's single broadcast channel. Downstream consumers
/// (SSE fan-out, compliance reporting) subscribe once and match on the variant.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub enum BookingEvent {
    HoldCreated(HoldCreatedEvent),
    HoldExpired(HoldExpiredEvent),
    ReservationConfirmed(ReservationConfirmedEvent),
    ReservationCancelled(ReservationCancelledEvent),
    GuestCheckedIn(GuestCheckedInEvent),
    GuestCheckedOut(GuestCheckedOutEvent),
}
