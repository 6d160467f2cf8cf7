pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use albergue_booking::availability;
use albergue_booking::error::BookingError;
use albergue_booking::models::{
    AvailabilitySummary, BookingRequest, HoldConfirmation, Reservation, StayRange,
};
use albergue_booking::payment::{PaymentEvent, PaymentRecord};
use albergue_booking::settlement::SettlementCoordinator;
use albergue_booking::store::BookingStore;
use albergue_catalog::{seed_catalog, OccupancyStats};
use albergue_shared::events::{
    BookingEvent, GuestCheckedInEvent, GuestCheckedOutEvent, HoldCreatedEvent,
    ReservationCancelledEvent, ReservationConfirmedEvent,
};
use albergue_store::EngineRules;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

pub use scheduler::SchedulerHandle;

/// The reservation engine: one store handle, the hostel's business rules,
/// and a broadcast channel for downstream consumers. Request handlers talk
/// to this facade; no caller touches bed status directly.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    rules: EngineRules,
    settlement: SettlementCoordinator,
    events: broadcast::Sender<BookingEvent>,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn BookingStore>, rules: EngineRules) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            settlement: SettlementCoordinator::new(store.clone()),
            store,
            rules,
            events,
        }
    }

    /// Seed the fixed bed catalog. Safe to run at every startup.
    pub async fn seed(&self) -> Result<usize, BookingError> {
        let inserted = self.store.seed_beds(seed_catalog()).await?;
        if inserted > 0 {
            info!(inserted, "seeded bed catalog");
        }
        Ok(inserted)
    }

    /// Place a hold for a guest's stay.
    ///
    /// The availability read is advisory; the store re-checks the chosen bed
    /// inside the hold-creation unit. Losing that race is expected under
    /// contention, so the next candidate is tried before giving up with
    /// `BedUnavailable`.
    pub async fn request_booking(
        &self,
        request: BookingRequest,
    ) -> Result<HoldConfirmation, BookingError> {
        let now = Utc::now();
        let hold_deadline = now + chrono::Duration::minutes(self.rules.hold_duration_minutes);

        let beds = self.store.list_beds().await?;
        let active = self.store.active_reservations(&request.stay).await?;
        let candidates: Vec<Uuid> = availability::find_available(
            &beds,
            &active,
            &request.stay,
            request.room_type_preference,
        )
        .iter()
        .map(|bed| bed.id)
        .collect();

        for bed_id in candidates {
            match self
                .store
                .create_hold(
                    bed_id,
                    request.guest_ref.clone(),
                    request.stay,
                    hold_deadline,
                    now,
                )
                .await
            {
                Ok(reservation) => {
                    info!(
                        reservation_id = %reservation.id,
                        %bed_id,
                        %hold_deadline,
                        "bed held for guest"
                    );
                    let _ = self.events.send(BookingEvent::HoldCreated(HoldCreatedEvent {
                        reservation_id: reservation.id,
                        bed_id,
                        hold_deadline,
                        created_at: now,
                    }));
                    return Ok(HoldConfirmation {
                        reservation_id: reservation.id,
                        bed_id,
                        hold_deadline,
                    });
                }
                Err(BookingError::BedUnavailable) => {
                    debug!(%bed_id, "bed claimed by a concurrent request, trying next candidate");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(BookingError::BedUnavailable)
    }

    /// Apply a payment event from the payment collaborator.
    pub async fn settle(&self, event: &PaymentEvent) -> Result<Reservation, BookingError> {
        let reservation = self.settlement.settle(event, Utc::now()).await?;
        if let Some(bed_id) = reservation.bed_id {
            let _ = self
                .events
                .send(BookingEvent::ReservationConfirmed(ReservationConfirmedEvent {
                    reservation_id: reservation.id,
                    bed_id,
                    amount_cents: event.amount_cents,
                    confirmed_at: reservation.updated_at,
                }));
        }
        Ok(reservation)
    }

    pub async fn cancel(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        let reservation = self
            .store
            .cancel_reservation(reservation_id, Utc::now())
            .await?;
        info!(%reservation_id, "reservation cancelled, bed released");
        let _ = self
            .events
            .send(BookingEvent::ReservationCancelled(ReservationCancelledEvent {
                reservation_id,
                bed_id: reservation.bed_id,
                cancelled_at: reservation.updated_at,
            }));
        Ok(reservation)
    }

    pub async fn check_in(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        let reservation = self.store.check_in(reservation_id, Utc::now()).await?;
        info!(%reservation_id, "guest checked in");
        if let Some(bed_id) = reservation.bed_id {
            let _ = self
                .events
                .send(BookingEvent::GuestCheckedIn(GuestCheckedInEvent {
                    reservation_id,
                    bed_id,
                    checked_in_at: reservation.updated_at,
                }));
        }
        Ok(reservation)
    }

    pub async fn check_out(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        let reservation = self.store.check_out(reservation_id, Utc::now()).await?;
        info!(%reservation_id, "guest checked out, bed released");
        if let Some(bed_id) = reservation.bed_id {
            let _ = self
                .events
                .send(BookingEvent::GuestCheckedOut(GuestCheckedOutEvent {
                    reservation_id,
                    bed_id,
                    checked_out_at: reservation.updated_at,
                }));
        }
        Ok(reservation)
    }

    /// Best-effort availability counts for a date range.
    pub async fn availability(
        &self,
        stay: &StayRange,
    ) -> Result<AvailabilitySummary, BookingError> {
        let beds = self.store.list_beds().await?;
        let active = self.store.active_reservations(stay).await?;
        Ok(availability::availability_summary(&beds, &active, stay))
    }

    pub async fn occupancy(&self) -> Result<OccupancyStats, BookingError> {
        self.store.occupancy_stats().await
    }

    pub async fn reservation(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        self.store.get_reservation(reservation_id).await
    }

    pub async fn payment(&self, reservation_id: Uuid) -> Result<PaymentRecord, BookingError> {
        self.store.get_payment(reservation_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    /// Start the recurring expiry sweep. The caller owns the handle and is
    /// responsible for stopping it on shutdown.
    pub fn start_expiry_sweep(&self) -> SchedulerHandle {
        scheduler::spawn(
            self.store.clone(),
            Duration::from_secs(self.rules.sweep_interval_seconds),
            self.events.clone(),
        )
    }
}
