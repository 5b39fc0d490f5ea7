//! Time-driven reconciliation: booking expiry and stale-payment expiry.
//!
//! [`ExpirySweeper`] holds the two sweeps as plain synchronous calls so tests can drive
//! them with a manual clock. [`ExpiryScheduler`] owns the periodic tasks that run them,
//! with an explicit `start`/`stop` lifecycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::allocator::release_in;
use crate::core::error::ParkingError;
use crate::core::model::{BookingStatus, Payment, PaymentStatus};
use crate::core::store::ResourceStore;
use crate::util::clock::Clock;

const LIVE_BOOKING: &[BookingStatus] = &[BookingStatus::Confirmed, BookingStatus::Active];

/// Runs the booking-expiry and stale-payment sweeps against the store.
pub struct ExpirySweeper<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    pending_ttl: chrono::Duration,
}

impl<S: ResourceStore> ExpirySweeper<S> {
    /// Create a sweeper; payments pending longer than `pending_ttl` are failed.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, pending_ttl: chrono::Duration) -> Self {
        Self {
            store,
            clock,
            pending_ttl,
        }
    }

    /// Complete every confirmed or active booking whose end time has passed and release
    /// its spot, as one all-or-nothing batch. Returns the number completed.
    ///
    /// A store failure is retried once.
    ///
    /// # Errors
    ///
    /// `Store` when both attempts fail; nothing is applied in that case.
    pub fn sweep_expired_bookings(&self) -> Result<usize, ParkingError> {
        let completed = with_retry("booking_expiry", || self.expire_bookings_once())?;
        if completed > 0 {
            tracing::info!(count = completed, "expired bookings completed");
        } else {
            tracing::debug!("no expired bookings");
        }
        Ok(completed)
    }

    /// Fail every pending payment created more than the staleness threshold ago.
    /// Owning bookings are not touched. Returns the number failed.
    ///
    /// A store failure is retried once.
    ///
    /// # Errors
    ///
    /// `Store` when both attempts fail.
    pub fn sweep_stale_payments(&self) -> Result<usize, ParkingError> {
        let failed = with_retry("stale_payments", || self.fail_stale_payments_once())?;
        if failed > 0 {
            tracing::info!(count = failed, "stale pending payments failed");
        } else {
            tracing::debug!("no stale pending payments");
        }
        Ok(failed)
    }

    fn expire_bookings_once(&self) -> Result<usize, ParkingError> {
        let now = self.clock.now();
        self.store.transaction(|tx| -> Result<usize, ParkingError> {
            let expired: Vec<_> = tx
                .bookings_where(|b| LIVE_BOOKING.contains(&b.status()) && b.end_time() < now)
                .into_iter()
                .map(|b| (b.id(), b.spot_id()))
                .collect();

            let mut completed = 0;
            for (id, spot) in expired {
                // Status is re-checked at write time; a concurrent transition wins.
                if tx.update_booking_if(id, LIVE_BOOKING, |b| b.complete(now))?.is_none() {
                    continue;
                }
                if let Some(spot) = spot {
                    release_in(tx, spot)?;
                }
                tracing::debug!(booking_id = %id, "booking expired");
                completed += 1;
            }
            Ok(completed)
        })
    }

    fn fail_stale_payments_once(&self) -> Result<usize, ParkingError> {
        let Some(cutoff) = self.clock.now().checked_sub_signed(self.pending_ttl) else {
            return Ok(0);
        };
        self.store.transaction(|tx| -> Result<usize, ParkingError> {
            let stale: Vec<_> = tx
                .payments_where(|p| p.status() == PaymentStatus::Pending && p.created_at() < cutoff)
                .into_iter()
                .map(Payment::id)
                .collect();

            let mut failed = 0;
            for id in stale {
                if tx
                    .update_payment_if(id, &[PaymentStatus::Pending], Payment::fail)?
                    .is_some()
                {
                    tracing::debug!(payment_id = %id, "pending payment went stale");
                    failed += 1;
                }
            }
            Ok(failed)
        })
    }
}

fn with_retry<F>(sweep: &'static str, mut run: F) -> Result<usize, ParkingError>
where
    F: FnMut() -> Result<usize, ParkingError>,
{
    match run() {
        Err(ParkingError::Store(e)) => {
            tracing::warn!(sweep, error = %e, "sweep failed, retrying once");
            run()
        }
        other => other,
    }
}

// ============================================================================
// Scheduler
// ============================================================================

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Owns the two periodic sweep tasks.
///
/// Each sweep runs once immediately on `start`, then on its own fixed interval. Ticks
/// missed while a sweep is running are skipped.
pub struct ExpiryScheduler<S> {
    sweeper: Arc<ExpirySweeper<S>>,
    booking_interval: Duration,
    payment_interval: Duration,
    running: Mutex<Option<Running>>,
}

impl<S: ResourceStore> ExpiryScheduler<S> {
    /// Create a stopped scheduler.
    pub fn new(
        sweeper: Arc<ExpirySweeper<S>>,
        booking_interval: Duration,
        payment_interval: Duration,
    ) -> Self {
        Self {
            sweeper,
            booking_interval,
            payment_interval,
            running: Mutex::new(None),
        }
    }

    /// The sweeper driven by this scheduler.
    pub const fn sweeper(&self) -> &Arc<ExpirySweeper<S>> {
        &self.sweeper
    }

    /// Whether the sweep tasks are running.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Spawn both sweep tasks. Calling `start` on a running scheduler does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::warn!("expiry scheduler already running");
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let bookings = Arc::clone(&self.sweeper);
        let payments = Arc::clone(&self.sweeper);
        let handles = vec![
            tokio::spawn(sweep_loop(
                "booking_expiry",
                self.booking_interval,
                rx.clone(),
                move || bookings.sweep_expired_bookings(),
            )),
            tokio::spawn(sweep_loop(
                "stale_payments",
                self.payment_interval,
                rx,
                move || payments.sweep_stale_payments(),
            )),
        ];
        *running = Some(Running { shutdown, handles });
        tracing::info!(
            booking_interval_secs = self.booking_interval.as_secs(),
            payment_interval_secs = self.payment_interval.as_secs(),
            "expiry scheduler started"
        );
    }

    /// Signal both tasks and wait for them to finish. Stopping a stopped scheduler does
    /// nothing.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };
        let _ = running.shutdown.send(true);
        for handle in running.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "sweep task ended abnormally");
            }
        }
        tracing::info!("expiry scheduler stopped");
    }
}

async fn sweep_loop<F>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    sweep: F,
) where
    F: Fn() -> Result<usize, ParkingError> + Send + Sync + 'static,
{
    let sweep = Arc::new(sweep);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Sweeps hold the store lock and may fsync a snapshot.
                let run = Arc::clone(&sweep);
                match tokio::task::spawn_blocking(move || run()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        tracing::error!(sweep = name, error = %e, "sweep failed after retry");
                    }
                    Err(e) => {
                        tracing::error!(sweep = name, error = %e, "sweep task panicked");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(sweep = name, "sweep loop exited");
}
