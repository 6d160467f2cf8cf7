use albergue_catalog::{Bed, BedStatus};
use albergue_shared::GuestRef;
use chrono::{DateTime, Utc};

use crate::error::BookingError;
use crate::models::{Reservation, ReservationStatus, StayRange};

// ── Reservation State Machine ─────────────────────────────────────
//
// Pure transition functions over a `(Reservation, Bed)` pair. Every function
// checks the source state and returns the updated pair; the store
// implementations apply them inside a single atomic unit so the reservation
// and its bed always move together. Keeping the rules here means both the
// in-memory and the Postgres store enforce exactly the same machine.

/// Create a RESERVED reservation and flip the bed to RESERVED with the hold
/// deadline. The bed must currently be AVAILABLE; anything else means a
/// concurrent request won the bed first.
pub fn place_hold(
    bed: &Bed,
    guest_ref: GuestRef,
    stay: StayRange,
    hold_deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(Reservation, Bed), BookingError> {
    if bed.status != BedStatus::Available {
        return Err(BookingError::BedUnavailable);
    }

    let reservation = Reservation::new(guest_ref, bed.id, stay, hold_deadline, now);

    let mut bed = bed.clone();
    bed.status = BedStatus::Reserved;
    bed.held_until = Some(hold_deadline);

    Ok((reservation, bed))
}

/// RESERVED → CONFIRMED on payment success; the bed moves RESERVED → OCCUPIED.
/// Settlement is the only path that may occupy a bed.
pub fn confirm(
    reservation: &Reservation,
    bed: &Bed,
    now: DateTime<Utc>,
) -> Result<(Reservation, Bed), BookingError> {
    expect_status(reservation, ReservationStatus::Reserved, "CONFIRMED")?;
    if bed.status != BedStatus::Reserved {
        return Err(BookingError::invalid_transition(
            bed.status.as_str(),
            "OCCUPIED",
        ));
    }

    let mut reservation = reservation.clone();
    reservation.status = ReservationStatus::Confirmed;
    reservation.updated_at = now;

    let mut bed = bed.clone();
    bed.status = BedStatus::Occupied;
    bed.held_until = None;

    Ok((reservation, bed))
}

/// RESERVED → EXPIRED once the hold deadline has passed; the bed frees up.
/// The status check doubles as the idempotence guard: a hold can only leave
/// RESERVED once, so a second sweep (or a concurrent one) finds nothing to do.
pub fn expire(
    reservation: &Reservation,
    bed: &Bed,
    now: DateTime<Utc>,
) -> Result<(Reservation, Bed), BookingError> {
    expect_status(reservation, ReservationStatus::Reserved, "EXPIRED")?;
    if reservation.cleanup_processed || now <= reservation.hold_deadline {
        // Still inside its deadline, or already swept: not expirable.
        return Err(BookingError::invalid_transition("RESERVED", "EXPIRED"));
    }

    let mut reservation = reservation.clone();
    reservation.status = ReservationStatus::Expired;
    reservation.cleanup_processed = true;
    reservation.updated_at = now;

    let bed = release(bed);
    Ok((reservation, bed))
}

/// Guest or staff cancellation. Allowed from RESERVED (before payment) and
/// from CONFIRMED (staff void before arrival); the bed frees up either way.
pub fn cancel(
    reservation: &Reservation,
    bed: &Bed,
    now: DateTime<Utc>,
) -> Result<(Reservation, Bed), BookingError> {
    if !matches!(
        reservation.status,
        ReservationStatus::Reserved | ReservationStatus::Confirmed
    ) {
        return Err(BookingError::invalid_transition(
            reservation.status.as_str(),
            "CANCELLED",
        ));
    }

    let mut reservation = reservation.clone();
    reservation.status = ReservationStatus::Cancelled;
    reservation.updated_at = now;

    let bed = release(bed);
    Ok((reservation, bed))
}

/// CONFIRMED → CHECKED_IN on arrival. The bed was occupied at settlement and
/// stays that way.
pub fn check_in(
    reservation: &Reservation,
    bed: &Bed,
    now: DateTime<Utc>,
) -> Result<(Reservation, Bed), BookingError> {
    expect_status(reservation, ReservationStatus::Confirmed, "CHECKED_IN")?;

    let mut reservation = reservation.clone();
    reservation.status = ReservationStatus::CheckedIn;
    reservation.updated_at = now;

    let mut bed = bed.clone();
    bed.status = BedStatus::Occupied;
    bed.held_until = None;

    Ok((reservation, bed))
}

/// CHECKED_IN → CHECKED_OUT on departure; the bed returns to AVAILABLE.
pub fn check_out(
    reservation: &Reservation,
    bed: &Bed,
    now: DateTime<Utc>,
) -> Result<(Reservation, Bed), BookingError> {
    expect_status(reservation, ReservationStatus::CheckedIn, "CHECKED_OUT")?;

    let mut reservation = reservation.clone();
    reservation.status = ReservationStatus::CheckedOut;
    reservation.updated_at = now;

    let bed = release(bed);
    Ok((reservation, bed))
}

fn release(bed: &Bed) -> Bed {
    let mut bed = bed.clone();
    bed.status = BedStatus::Available;
    bed.held_until = None;
    bed
}

fn expect_status(
    reservation: &Reservation,
    expected: ReservationStatus,
    target: &str,
) -> Result<(), BookingError> {
    if reservation.status != expected {
        return Err(BookingError::invalid_transition(
            reservation.status.as_str(),
            target,
        ));
    }
    Ok(())
}
