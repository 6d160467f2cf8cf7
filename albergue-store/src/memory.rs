use std::collections::HashMap;

use albergue_booking::error::BookingError;
use albergue_booking::lifecycle;
use albergue_booking::models::{Reservation, StayRange};
use albergue_booking::payment::{PaymentEvent, PaymentRecord, PaymentStatus};
use albergue_booking::store::BookingStore;
use albergue_booking::availability;
use albergue_catalog::{Bed, OccupancyStats};
use albergue_shared::GuestRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    beds: HashMap<Uuid, Bed>,
    reservations: HashMap<Uuid, Reservation>,
    payments: HashMap<Uuid, PaymentRecord>,
}

/// In-memory store. One `RwLock` guards the whole table set; every mutating
/// trait method takes the write guard exactly once, which makes that method
/// the compare-and-swap unit the engine's atomicity contract asks for. Reads
/// share the read guard.
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn bed_for<'a>(
    state: &'a State,
    reservation: &Reservation,
) -> Result<&'a Bed, BookingError> {
    let bed_id = reservation
        .bed_id
        .ok_or_else(|| BookingError::Store("reservation has no bed assigned".into()))?;
    state
        .beds
        .get(&bed_id)
        .ok_or(BookingError::NotFound(bed_id))
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn seed_beds(&self, beds: Vec<Bed>) -> Result<usize, BookingError> {
        let mut state = self.state.write().await;
        let existing: std::collections::HashSet<(i32, i32)> =
            state.beds.values().map(|b| b.position()).collect();

        let mut inserted = 0;
        for bed in beds {
            if existing.contains(&bed.position()) {
                continue;
            }
            state.beds.insert(bed.id, bed);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list_beds(&self) -> Result<Vec<Bed>, BookingError> {
        let state = self.state.read().await;
        let mut beds: Vec<Bed> = state.beds.values().cloned().collect();
        beds.sort_by_key(|b| b.position());
        Ok(beds)
    }

    async fn get_bed(&self, bed_id: Uuid) -> Result<Bed, BookingError> {
        let state = self.state.read().await;
        state
            .beds
            .get(&bed_id)
            .cloned()
            .ok_or(BookingError::NotFound(bed_id))
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        let state = self.state.read().await;
        state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))
    }

    async fn get_payment(&self, reservation_id: Uuid) -> Result<PaymentRecord, BookingError> {
        let state = self.state.read().await;
        state
            .payments
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))
    }

    async fn active_reservations(
        &self,
        stay: &StayRange,
    ) -> Result<Vec<Reservation>, BookingError> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.status.claims_bed() && availability::overlaps(&r.stay, stay))
            .cloned()
            .collect())
    }

    async fn create_hold(
        &self,
        bed_id: Uuid,
        guest_ref: GuestRef,
        stay: StayRange,
        hold_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.write().await;

        let bed = state
            .beds
            .get(&bed_id)
            .ok_or(BookingError::NotFound(bed_id))?;

        // Re-check under the write guard: the caller's availability read may
        // be stale by now.
        let active: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.status.claims_bed())
            .cloned()
            .collect();
        if availability::has_overlapping_claim(bed, &active, &stay) {
            return Err(BookingError::BedUnavailable);
        }

        let (reservation, updated_bed) =
            lifecycle::place_hold(bed, guest_ref, stay, hold_deadline, now)?;
        let payment = PaymentRecord::pending(
            reservation.id,
            (stay.nights() as i32) * updated_bed.price_cents,
            updated_bed.currency.clone(),
            now,
        );

        state.beds.insert(updated_bed.id, updated_bed);
        state.payments.insert(reservation.id, payment);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn confirm_and_occupy(
        &self,
        reservation_id: Uuid,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.write().await;

        let reservation = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))?;
        let bed = bed_for(&state, &reservation)?;

        let (reservation, bed) = lifecycle::confirm(&reservation, bed, now).map_err(|e| {
            match e {
                // A hold that already expired, got cancelled, or settled
                // before this payment arrived: the settlement loses cleanly.
                BookingError::InvalidTransition { .. } => {
                    BookingError::SettlementConflict(reservation_id)
                }
                other => other,
            }
        })?;

        if let Some(payment) = state.payments.get_mut(&reservation_id) {
            payment.status = PaymentStatus::Completed;
            payment.method = event.method.clone();
            payment.updated_at = now;
        }
        state.beds.insert(bed.id, bed);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn record_payment_failure(
        &self,
        reservation_id: Uuid,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&reservation_id)
            .ok_or(BookingError::NotFound(reservation_id))?;
        payment.status = PaymentStatus::Failed;
        payment.method = event.method.clone();
        payment.updated_at = now;
        Ok(())
    }

    async fn expire_hold(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.write().await;

        let reservation = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))?;
        let bed = bed_for(&state, &reservation)?;

        let (reservation, bed) = lifecycle::expire(&reservation, bed, now)?;

        if let Some(payment) = state.payments.get_mut(&reservation_id) {
            if payment.status == PaymentStatus::Pending {
                payment.status = PaymentStatus::Cancelled;
                payment.updated_at = now;
            }
        }
        state.beds.insert(bed.id, bed);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn due_expiries(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, BookingError> {
        let state = self.state.read().await;
        let mut due: Vec<&Reservation> = state
            .reservations
            .values()
            .filter(|r| {
                r.status == albergue_booking::models::ReservationStatus::Reserved
                    && r.hold_deadline < now
                    && !r.cleanup_processed
            })
            .collect();
        due.sort_by_key(|r| r.hold_deadline);
        Ok(due.into_iter().map(|r| r.id).collect())
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.write().await;

        let reservation = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))?;
        let bed = bed_for(&state, &reservation)?;

        let (reservation, bed) = lifecycle::cancel(&reservation, bed, now)?;

        if let Some(payment) = state.payments.get_mut(&reservation_id) {
            if payment.status == PaymentStatus::Pending {
                payment.status = PaymentStatus::Cancelled;
                payment.updated_at = now;
            }
        }
        state.beds.insert(bed.id, bed);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn check_in(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.write().await;

        let reservation = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))?;
        let bed = bed_for(&state, &reservation)?;

        let (reservation, bed) = lifecycle::check_in(&reservation, bed, now)?;

        state.beds.insert(bed.id, bed);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn check_out(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.write().await;

        let reservation = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(BookingError::NotFound(reservation_id))?;
        let bed = bed_for(&state, &reservation)?;

        let (reservation, bed) = lifecycle::check_out(&reservation, bed, now)?;

        state.beds.insert(bed.id, bed);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn occupancy_stats(&self) -> Result<OccupancyStats, BookingError> {
        let state = self.state.read().await;
        let beds: Vec<Bed> = state.beds.values().cloned().collect();
        Ok(OccupancyStats::from_beds(&beds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use albergue_booking::models::ReservationStatus;
    use albergue_catalog::{BedStatus, RoomType};
    use chrono::{Duration, NaiveDate};
    use std::sync::Arc;

    fn stay(check_in: &str, check_out: &str) -> StayRange {
        StayRange::new(
            check_in.parse::<NaiveDate>().unwrap(),
            check_out.parse::<NaiveDate>().unwrap(),
        )
        .unwrap()
    }

    async fn seeded_store(beds: Vec<Bed>) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_beds(beds).await.unwrap();
        store
    }

    fn one_bed() -> Vec<Bed> {
        vec![Bed::new(1, 1, "Dormitorio A", RoomType::Dormitory, 1200)]
    }

    #[tokio::test]
    async fn seeding_twice_changes_nothing() {
        let store = MemoryStore::new();
        let inserted = store.seed_beds(one_bed()).await.unwrap();
        assert_eq!(inserted, 1);

        let before = store.list_beds().await.unwrap();

        // Second seed with a different price for the same position
        let again = vec![Bed::new(1, 1, "Dormitorio A", RoomType::Dormitory, 9900)];
        let inserted = store.seed_beds(again).await.unwrap();
        assert_eq!(inserted, 0);

        let after = store.list_beds().await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].price_cents, 1200);
    }

    #[tokio::test]
    async fn hold_creates_reservation_bed_flag_and_pending_payment() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();

        let reservation = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-03"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();

        assert_eq!(reservation.status, ReservationStatus::Reserved);
        let bed = store.get_bed(bed.id).await.unwrap();
        assert_eq!(bed.status, BedStatus::Reserved);
        assert_eq!(bed.held_until, Some(reservation.hold_deadline));

        let payment = store.get_payment(reservation.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        // two nights at 12 EUR
        assert_eq!(payment.amount_cents, 2400);
    }

    #[tokio::test]
    async fn overlapping_hold_on_same_bed_is_rejected() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();
        let deadline = now + Duration::hours(2);

        store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                deadline,
                now,
            )
            .await
            .unwrap();

        let second = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-2"),
                stay("2025-08-01", "2025-08-02"),
                deadline,
                now,
            )
            .await;
        assert!(matches!(second, Err(BookingError::BedUnavailable)));
    }

    #[tokio::test]
    async fn concurrent_holds_allocate_the_bed_exactly_once() {
        let store = Arc::new(seeded_store(one_bed()).await);
        let bed_id = store.list_beds().await.unwrap()[0].id;
        let now = Utc::now();
        let deadline = now + Duration::hours(2);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_hold(
                        bed_id,
                        GuestRef::from(format!("guest-{i}").as_str()),
                        stay("2025-08-01", "2025-08-02"),
                        deadline,
                        now,
                    )
                    .await
            }));
        }

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(BookingError::BedUnavailable) => lost += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(lost, 7);
    }

    #[tokio::test]
    async fn settlement_confirms_occupies_and_completes_payment() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();

        let reservation = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();

        let event = PaymentEvent::success(reservation.id, 1200);
        let confirmed = store
            .confirm_and_occupy(reservation.id, &event, now)
            .await
            .unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);

        let bed = store.get_bed(bed.id).await.unwrap();
        assert_eq!(bed.status, BedStatus::Occupied);
        assert!(bed.held_until.is_none());

        let payment = store.get_payment(reservation.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);

        // A second settlement of the same reservation conflicts
        let again = store.confirm_and_occupy(reservation.id, &event, now).await;
        assert!(matches!(again, Err(BookingError::SettlementConflict(_))));
    }

    #[tokio::test]
    async fn expiry_frees_bed_and_cancels_pending_payment() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();

        let reservation = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();

        let later = now + Duration::hours(3);
        assert_eq!(store.due_expiries(later).await.unwrap(), vec![reservation.id]);

        let expired = store.expire_hold(reservation.id, later).await.unwrap();
        assert_eq!(expired.status, ReservationStatus::Expired);
        assert!(expired.cleanup_processed);

        let bed = store.get_bed(bed.id).await.unwrap();
        assert_eq!(bed.status, BedStatus::Available);
        assert!(bed.held_until.is_none());

        let payment = store.get_payment(reservation.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);

        // Idempotent: nothing left to expire, second attempt is a no-op race
        assert!(store.due_expiries(later).await.unwrap().is_empty());
        assert!(matches!(
            store.expire_hold(reservation.id, later).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn settlement_after_expiry_conflicts_and_leaves_bed_free() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();

        let reservation = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();

        let later = now + Duration::hours(3);
        store.expire_hold(reservation.id, later).await.unwrap();

        let event = PaymentEvent::success(reservation.id, 1200);
        let result = store.confirm_and_occupy(reservation.id, &event, later).await;
        assert!(matches!(result, Err(BookingError::SettlementConflict(_))));

        let bed = store.get_bed(bed.id).await.unwrap();
        assert_eq!(bed.status, BedStatus::Available);
    }

    #[tokio::test]
    async fn cancellation_frees_bed_and_cancels_payment() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();

        let reservation = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();

        let cancelled = store.cancel_reservation(reservation.id, now).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let bed = store.get_bed(bed.id).await.unwrap();
        assert_eq!(bed.status, BedStatus::Available);

        let payment = store.get_payment(reservation.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn declined_payment_keeps_hold_but_fails_payment_record() {
        let store = seeded_store(one_bed()).await;
        let bed = store.list_beds().await.unwrap().remove(0);
        let now = Utc::now();

        let reservation = store
            .create_hold(
                bed.id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();

        let event = PaymentEvent::failure(reservation.id, 1200);
        store
            .record_payment_failure(reservation.id, &event, now)
            .await
            .unwrap();

        let payment = store.get_payment(reservation.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);

        let reservation = store.get_reservation(reservation.id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Reserved);
        let bed = store.get_bed(bed.id).await.unwrap();
        assert_eq!(bed.status, BedStatus::Reserved);
    }

    #[tokio::test]
    async fn occupancy_stats_reflect_bed_statuses() {
        let beds = vec![
            Bed::new(1, 1, "Dormitorio A", RoomType::Dormitory, 1200),
            Bed::new(1, 2, "Dormitorio A", RoomType::Dormitory, 1200),
        ];
        let store = seeded_store(beds).await;
        let listed = store.list_beds().await.unwrap();
        let now = Utc::now();

        let reservation = store
            .create_hold(
                listed[0].id,
                GuestRef::from("guest-1"),
                stay("2025-08-01", "2025-08-02"),
                now + Duration::hours(2),
                now,
            )
            .await
            .unwrap();
        let event = PaymentEvent::success(reservation.id, 1200);
        store
            .confirm_and_occupy(reservation.id, &event, now)
            .await
            .unwrap();

        let stats = store.occupancy_stats().await.unwrap();
        assert_eq!(stats.available, 1);
        assert_eq!(stats.occupied, 1);
        assert_eq!(stats.reserved, 0);
        assert!((stats.occupancy_rate - 0.5).abs() < f64::EPSILON);
    }
}
