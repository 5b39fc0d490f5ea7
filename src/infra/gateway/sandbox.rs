//! In-process payment gateway for development and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::gateway::{
    CallbackEnvelope, GatewayError, PaymentGateway, PushAccepted, PushRequest,
};

/// How the sandbox answers push requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxMode {
    /// Accept every push and issue a correlation id.
    #[default]
    Accept,
    /// Reject every push.
    Reject,
    /// Never answer, so the caller's timeout fires.
    Hang,
}

/// Accepted push kept for inspection and callback construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
    /// Correlation id issued for the push.
    pub correlation_id: String,
    /// The request as received.
    pub request: PushRequest,
}

/// Gateway double that records pushes and builds matching callbacks.
#[derive(Debug, Default)]
pub struct SandboxGateway {
    mode: Mutex<SandboxMode>,
    pushes: Mutex<Vec<RecordedPush>>,
}

impl SandboxGateway {
    /// Create a sandbox that accepts pushes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sandbox in the given mode.
    #[must_use]
    pub fn with_mode(mode: SandboxMode) -> Self {
        let gateway = Self::new();
        gateway.set_mode(mode);
        gateway
    }

    /// Switch mode.
    pub fn set_mode(&self, mode: SandboxMode) {
        *self.mode.lock() = mode;
    }

    /// Current mode.
    pub fn mode(&self) -> SandboxMode {
        *self.mode.lock()
    }

    /// Accepted pushes in arrival order.
    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.pushes.lock().clone()
    }

    /// Most recent accepted push.
    pub fn last_push(&self) -> Option<RecordedPush> {
        self.pushes.lock().last().cloned()
    }

    /// Success callback for an accepted push, reporting the pushed amount.
    pub fn success_callback(&self, correlation_id: &str, receipt: &str) -> Option<CallbackEnvelope> {
        self.pushes
            .lock()
            .iter()
            .find(|p| p.correlation_id == correlation_id)
            .map(|p| CallbackEnvelope::success(correlation_id, receipt, p.request.amount))
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn push_payment(&self, request: PushRequest) -> Result<PushAccepted, GatewayError> {
        let mode = self.mode();
        tracing::debug!(
            booking_id = %request.booking_id,
            account_reference = %request.account_reference,
            mode = ?mode,
            "sandbox push received"
        );
        match mode {
            SandboxMode::Accept => {
                let correlation_id = format!("ws_CO_{}", Uuid::new_v4().simple());
                let merchant_request_id = Uuid::new_v4().to_string();
                self.pushes.lock().push(RecordedPush {
                    correlation_id: correlation_id.clone(),
                    request,
                });
                Ok(PushAccepted {
                    correlation_id,
                    merchant_request_id,
                    customer_message: "Success. Request accepted for processing".into(),
                })
            }
            SandboxMode::Reject => Err(GatewayError::Rejected {
                code: "500.001.1001".into(),
                message: "Unable to lock subscriber, a transaction is already in process".into(),
            }),
            SandboxMode::Hang => std::future::pending().await,
        }
    }
}
