use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::BookingError;
use crate::models::Reservation;
use crate::store::BookingStore;

/// Outcome of one sweep pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: Vec<Reservation>,
    pub failed: usize,
}

impl SweepReport {
    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }
}

/// One scan-and-expire pass over lapsed holds.
///
/// Best effort, not a precise per-reservation timer: staleness is bounded by
/// the sweep interval. Each hold is expired through its own atomic unit, so a
/// failure on one reservation never aborts the rest — it stays RESERVED and is
/// retried on the next sweep. A hold that raced away from RESERVED in the
/// meantime (settled, cancelled, or taken by a concurrent sweep) is skipped as
/// a benign race.
pub async fn sweep(store: &dyn BookingStore, now: DateTime<Utc>) -> SweepReport {
    let due = match store.due_expiries(now).await {
        Ok(due) => due,
        Err(e) => {
            warn!("expiry sweep could not list due holds: {e}");
            return SweepReport::default();
        }
    };

    let mut report = SweepReport {
        scanned: due.len(),
        ..SweepReport::default()
    };

    for reservation_id in due {
        match store.expire_hold(reservation_id, now).await {
            Ok(reservation) => {
                info!(%reservation_id, "expired lapsed hold, bed released");
                report.expired.push(reservation);
            }
            Err(BookingError::InvalidTransition { .. }) | Err(BookingError::NotFound(_)) => {
                // Already settled, cancelled, or swept concurrently.
                debug!(%reservation_id, "hold already left RESERVED, skipping");
            }
            Err(e) => {
                warn!(%reservation_id, "failed to expire hold, will retry next sweep: {e}");
                report.failed += 1;
            }
        }
    }

    if report.scanned > 0 {
        info!(
            scanned = report.scanned,
            expired = report.expired_count(),
            failed = report.failed,
            "expiry sweep finished"
        );
    }

    report
}
