use albergue_catalog::RoomType;
use albergue_shared::GuestRef;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;

/// A half-open stay interval: the guest sleeps the nights
/// `[check_in, check_out)` and the bed frees up on the check-out morning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::InvalidStay);
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// Reservation status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Reserved,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "RESERVED",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::CheckedIn => "CHECKED_IN",
            ReservationStatus::CheckedOut => "CHECKED_OUT",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RESERVED" => Some(ReservationStatus::Reserved),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "CHECKED_IN" => Some(ReservationStatus::CheckedIn),
            "CHECKED_OUT" => Some(ReservationStatus::CheckedOut),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            "EXPIRED" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    /// True while the reservation claims its bed for the stay. This is the
    /// status set the double-allocation invariant quantifies over.
    pub fn claims_bed(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Reserved
                | ReservationStatus::Confirmed
                | ReservationStatus::CheckedIn
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::CheckedOut
                | ReservationStatus::Cancelled
                | ReservationStatus::Expired
        )
    }
}

/// One booking: the single source of truth for a guest's claim on a bed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub guest_ref: GuestRef,
    pub bed_id: Option<Uuid>,
    pub stay: StayRange,
    pub status: ReservationStatus,
    pub hold_deadline: DateTime<Utc>,
    pub cleanup_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        guest_ref: GuestRef,
        bed_id: Uuid,
        stay: StayRange,
        hold_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guest_ref,
            bed_id: Some(bed_id),
            stay,
            status: ReservationStatus::Reserved,
            hold_deadline,
            cleanup_processed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What the registration form submits once the guest's documents clear.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub guest_ref: GuestRef,
    pub stay: StayRange,
    pub room_type_preference: Option<RoomType>,
}

/// Returned to the caller when a hold is placed: the reference the payment
/// collaborator will settle against, and how long the guest has to pay.
#[derive(Debug, Clone, Serialize)]
pub struct HoldConfirmation {
    pub reservation_id: Uuid,
    pub bed_id: Uuid,
    pub hold_deadline: DateTime<Utc>,
}

/// Best-effort availability counts for a date range.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AvailabilitySummary {
    pub total_beds: usize,
    pub available_beds: usize,
    pub occupied_beds: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn stay_range_rejects_inverted_and_zero_night_stays() {
        assert!(StayRange::new(d("2025-08-01"), d("2025-08-02")).is_ok());
        assert!(matches!(
            StayRange::new(d("2025-08-02"), d("2025-08-01")),
            Err(BookingError::InvalidStay)
        ));
        assert!(matches!(
            StayRange::new(d("2025-08-01"), d("2025-08-01")),
            Err(BookingError::InvalidStay)
        ));
    }

    #[test]
    fn nights_counts_half_open() {
        let stay = StayRange::new(d("2025-08-01"), d("2025-08-04")).unwrap();
        assert_eq!(stay.nights(), 3);
    }

    #[test]
    fn claims_bed_matches_non_terminal_claiming_states() {
        assert!(ReservationStatus::Reserved.claims_bed());
        assert!(ReservationStatus::Confirmed.claims_bed());
        assert!(ReservationStatus::CheckedIn.claims_bed());
        assert!(!ReservationStatus::CheckedOut.claims_bed());
        assert!(!ReservationStatus::Cancelled.claims_bed());
        assert!(!ReservationStatus::Expired.claims_bed());
    }

    #[test]
    fn terminal_states_are_disjoint_from_claiming_states() {
        for status in [
            ReservationStatus::Reserved,
            ReservationStatus::Confirmed,
            ReservationStatus::CheckedIn,
            ReservationStatus::CheckedOut,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ] {
            assert!(status.claims_bed() != status.is_terminal());
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
    }
}
