use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::BookingError;
use crate::models::Reservation;
use crate::payment::{PaymentEvent, PaymentOutcome};
use crate::store::BookingStore;

/// Converts a successful payment into a confirmed, bed-occupying booking —
/// the only path that moves a bed to OCCUPIED.
pub struct SettlementCoordinator {
    store: Arc<dyn BookingStore>,
}

impl SettlementCoordinator {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Apply one payment event.
    ///
    /// Success: the store's `confirm_and_occupy` unit either lands the whole
    /// settlement or nothing; a reservation that already expired (a legitimate
    /// race with the sweep) surfaces as `SettlementConflict` and must reach
    /// the caller — money has moved and the refund flow runs upstream.
    ///
    /// Failure: the payment record is marked FAILED and the hold is left to
    /// run out; reported as `PaymentDeclined`, which is deliberately not the
    /// same error as a settlement conflict.
    pub async fn settle(
        &self,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        match event.outcome {
            PaymentOutcome::Success => {
                let reservation = self
                    .store
                    .confirm_and_occupy(event.reservation_id, event, now)
                    .await
                    .map_err(|e| {
                        if matches!(e, BookingError::SettlementConflict(_)) {
                            warn!(
                                reservation_id = %event.reservation_id,
                                "payment arrived for a hold that is gone, refund required"
                            );
                        }
                        e
                    })?;
                info!(
                    reservation_id = %reservation.id,
                    amount_cents = event.amount_cents,
                    "reservation confirmed, bed occupied"
                );
                Ok(reservation)
            }
            PaymentOutcome::Failure => {
                self.store
                    .record_payment_failure(event.reservation_id, event, now)
                    .await?;
                info!(
                    reservation_id = %event.reservation_id,
                    "payment declined, hold left to expire"
                );
                Err(BookingError::PaymentDeclined(event.reservation_id))
            }
        }
    }
}
