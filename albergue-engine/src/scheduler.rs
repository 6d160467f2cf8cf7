use std::sync::Arc;
use std::time::Duration;

use albergue_booking::expiry;
use albergue_booking::store::BookingStore;
use albergue_shared::events::{BookingEvent, HoldExpiredEvent};
use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a running expiry scheduler. Stopping is explicit: signal the
/// task and wait for it to finish its current pass.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the recurring expiry sweep. The first tick fires immediately, so
/// holds that lapsed while the process was down are released at startup;
/// after that the sweep runs every `every`. Missed ticks are delayed, not
/// bursted.
pub fn spawn(
    store: Arc<dyn BookingStore>,
    every: Duration,
    events: broadcast::Sender<BookingEvent>,
) -> SchedulerHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "expiry scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let report = expiry::sweep(store.as_ref(), now).await;
                    for reservation in &report.expired {
                        if let Some(bed_id) = reservation.bed_id {
                            let _ = events.send(BookingEvent::HoldExpired(HoldExpiredEvent {
                                reservation_id: reservation.id,
                                bed_id,
                                expired_at: now,
                            }));
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("expiry scheduler stopping");
                    break;
                }
            }
        }
    });

    SchedulerHandle { shutdown, task }
}
