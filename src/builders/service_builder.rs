//! Builds a ready service and its expiry scheduler from configuration.

use std::sync::Arc;

use crate::config::ParkingConfig;
use crate::core::{
    ExpiryScheduler, ExpirySweeper, ParkingError, PaymentGateway, PaymentGatewayAdapter,
    ResourceStore,
};
use crate::runtime::ParkingService;
use crate::util::clock::Clock;

/// A wired service plus the scheduler that sweeps its store. The scheduler is returned
/// stopped; the caller owns its lifecycle.
pub struct ServiceParts<S, G> {
    /// Request-facing facade.
    pub service: ParkingService<S, G>,
    /// Expiry sweeps over the same store and clock.
    pub scheduler: ExpiryScheduler<S>,
}

/// Wire every component over one store, gateway and clock.
///
/// # Errors
///
/// `Validation` when the configuration is invalid.
pub fn build_service<S, G>(
    cfg: &ParkingConfig,
    store: Arc<S>,
    gateway: G,
    clock: Arc<dyn Clock>,
) -> Result<ServiceParts<S, G>, ParkingError>
where
    S: ResourceStore,
    G: PaymentGateway,
{
    cfg.validate()
        .map_err(|e| ParkingError::Validation(format!("config invalid: {e}")))?;

    let adapter = PaymentGatewayAdapter::new(
        gateway,
        cfg.gateway.callback_url(),
        cfg.gateway.account_prefix.clone(),
        cfg.gateway.timeout(),
    );
    let sweeper = Arc::new(ExpirySweeper::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        cfg.sweeps.pending_payment_ttl(),
    ));
    let scheduler = ExpiryScheduler::new(
        sweeper,
        cfg.sweeps.booking_interval(),
        cfg.sweeps.payment_interval(),
    );
    let service = ParkingService::new(store, adapter, clock);

    tracing::debug!(
        callback_url = %cfg.gateway.callback_url(),
        booking_sweep_secs = cfg.sweeps.booking_sweep_interval_secs,
        payment_sweep_secs = cfg.sweeps.payment_sweep_interval_secs,
        "service wired"
    );
    Ok(ServiceParts { service, scheduler })
}
