//! Payment gateway contract, initiation adapter and callback interpretation.
//!
//! The adapter owns nothing persistent. `initiate` talks to the gateway under a timeout;
//! `interpret_callback` turns the asynchronous STK notification into a
//! [`CallbackOutcome`] without looking at the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::error::ParkingError;
use crate::core::model::{BookingId, Money};

/// Description sent with every push request.
pub const PUSH_DESCRIPTION: &str = "Parking payment";

/// Result code the gateway uses for a successful payment.
pub const RESULT_CODE_SUCCESS: i64 = 0;

const RECEIPT_ITEM: &str = "MpesaReceiptNumber";
const AMOUNT_ITEM: &str = "Amount";

// ============================================================================
// Gateway contract
// ============================================================================

/// Push-payment request handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Booking being paid for.
    pub booking_id: BookingId,
    /// Amount to charge.
    pub amount: Money,
    /// Payer phone number.
    pub payer: String,
    /// Reference shown on the payer's statement.
    pub account_reference: String,
    /// Transaction description.
    pub description: String,
    /// Where the gateway posts the asynchronous result.
    pub callback_url: String,
}

/// Gateway acknowledgement that a push was accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAccepted {
    /// Checkout request id used to match the callback.
    pub correlation_id: String,
    /// Merchant-side request id.
    pub merchant_request_id: String,
    /// Message for the customer.
    pub customer_message: String,
}

/// Failures reported by a gateway implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network or protocol failure.
    #[error("gateway transport error: {0}")]
    Transport(String),
    /// The gateway refused the request.
    #[error("gateway rejected request ({code}): {message}")]
    Rejected {
        /// Gateway error code.
        code: String,
        /// Gateway error message.
        message: String,
    },
}

/// External mobile-money gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Ask the gateway to push a payment prompt to the payer.
    async fn push_payment(&self, request: PushRequest) -> Result<PushAccepted, GatewayError>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn push_payment(&self, request: PushRequest) -> Result<PushAccepted, GatewayError> {
        (**self).push_payment(request).await
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Accepted initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiation {
    /// Gateway correlation id for the new attempt.
    pub correlation_id: String,
}

/// Wraps a [`PaymentGateway`] with timeout handling and request shaping.
pub struct PaymentGatewayAdapter<G> {
    gateway: G,
    timeout: Duration,
    callback_url: String,
    account_prefix: String,
}

impl<G: PaymentGateway> PaymentGatewayAdapter<G> {
    /// Create an adapter.
    pub fn new(
        gateway: G,
        callback_url: impl Into<String>,
        account_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            timeout,
            callback_url: callback_url.into(),
            account_prefix: account_prefix.into(),
        }
    }

    /// Push a payment prompt for a booking.
    ///
    /// Nothing is persisted here; the caller records a pending payment only after this
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed payer. `GatewayUnavailable` for transport errors,
    /// rejections, a timeout, or an acceptance without a correlation id.
    pub async fn initiate(
        &self,
        booking_id: BookingId,
        amount: Money,
        payer: &str,
    ) -> Result<Initiation, ParkingError> {
        let payer = normalize_payer(payer)?;
        let request = PushRequest {
            booking_id,
            amount,
            payer,
            account_reference: format!("{}-{booking_id}", self.account_prefix),
            description: PUSH_DESCRIPTION.to_owned(),
            callback_url: self.callback_url.clone(),
        };

        let accepted = match tokio::time::timeout(self.timeout, self.gateway.push_payment(request)).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                tracing::warn!(booking_id = %booking_id, error = %e, "payment push failed");
                return Err(ParkingError::GatewayUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(booking_id = %booking_id, timeout_ms = self.timeout.as_millis(), "payment push timed out");
                return Err(ParkingError::GatewayUnavailable(format!(
                    "no response within {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        if accepted.correlation_id.trim().is_empty() {
            tracing::warn!(booking_id = %booking_id, "gateway accepted push without a correlation id");
            return Err(ParkingError::GatewayUnavailable(
                "gateway returned no checkout request id".into(),
            ));
        }

        tracing::info!(
            booking_id = %booking_id,
            correlation_id = %accepted.correlation_id,
            amount = %amount,
            "payment push accepted"
        );
        Ok(Initiation {
            correlation_id: accepted.correlation_id,
        })
    }
}

/// Validate a payer phone number: optional `+`, then 9 to 15 digits.
///
/// # Errors
///
/// `Validation` when the number does not match.
pub fn normalize_payer(payer: &str) -> Result<String, ParkingError> {
    let payer = payer.trim();
    let digits = payer.strip_prefix('+').unwrap_or(payer);
    if (9..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(digits.to_owned())
    } else {
        Err(ParkingError::Validation(format!(
            "payer must be 9 to 15 digits, got {payer:?}"
        )))
    }
}

// ============================================================================
// Callback wire shape
// ============================================================================

/// Top-level callback document: `{"Body": {"stkCallback": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    /// Body wrapper.
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

/// Body wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackBody {
    /// The STK result.
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// Result of one push request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StkCallback {
    /// Merchant-side request id.
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    /// Correlation id issued at initiation.
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// `0` on success.
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    /// Human-readable result.
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    /// Present on success.
    #[serde(
        rename = "CallbackMetadata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_metadata: Option<CallbackMetadata>,
}

/// Name/value list attached to successful callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackMetadata {
    /// Items such as `MpesaReceiptNumber`, `Amount`, `PhoneNumber`.
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

/// One metadata entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataItem {
    /// Item name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Item value; the gateway omits it for some items.
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl CallbackEnvelope {
    /// Successful callback carrying a receipt and amount.
    #[must_use]
    pub fn success(correlation_id: &str, receipt: &str, amount: Money) -> Self {
        let amount = if amount.minor() % 100 == 0 {
            Value::from(amount.major())
        } else {
            Value::String(amount.to_string())
        };
        Self::new(
            correlation_id,
            RESULT_CODE_SUCCESS,
            "The service request is processed successfully.",
            Some(CallbackMetadata {
                items: vec![
                    MetadataItem {
                        name: AMOUNT_ITEM.into(),
                        value: Some(amount),
                    },
                    MetadataItem {
                        name: RECEIPT_ITEM.into(),
                        value: Some(Value::String(receipt.to_owned())),
                    },
                ],
            }),
        )
    }

    /// Failed callback with a gateway result code.
    #[must_use]
    pub fn failure(correlation_id: &str, code: i64, description: &str) -> Self {
        Self::new(correlation_id, code, description, None)
    }

    fn new(
        correlation_id: &str,
        code: i64,
        description: &str,
        metadata: Option<CallbackMetadata>,
    ) -> Self {
        Self {
            body: CallbackBody {
                stk_callback: StkCallback {
                    merchant_request_id: String::new(),
                    checkout_request_id: correlation_id.to_owned(),
                    result_code: code,
                    result_desc: description.to_owned(),
                    callback_metadata: metadata,
                },
            },
        }
    }

    /// Serialize to the bytes the gateway would post.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ============================================================================
// Interpretation
// ============================================================================

/// Abstract callback result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Payment succeeded.
    Success {
        /// Gateway receipt.
        receipt: String,
        /// Amount reported by the gateway, if present and parseable.
        amount: Option<Money>,
    },
    /// Payment failed or was cancelled by the payer.
    Failure {
        /// Gateway result code.
        code: i64,
        /// Gateway description.
        reason: String,
    },
}

/// Interpreted callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    /// Correlation id of the attempt.
    pub correlation_id: String,
    /// What happened.
    pub outcome: Outcome,
}

/// Callback payload could not be interpreted.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Body is not a valid callback document.
    #[error("undecodable callback: {0}")]
    Decode(#[from] serde_json::Error),
    /// Correlation id is empty.
    #[error("callback has no checkout request id")]
    MissingCorrelation,
    /// Success reported without a receipt.
    #[error("successful callback for {correlation_id} has no receipt")]
    MissingReceipt {
        /// Correlation id of the attempt.
        correlation_id: String,
    },
}

/// Translate a raw callback body into an outcome. Pure; never touches the store.
///
/// # Errors
///
/// `CallbackError` for undecodable JSON, an empty correlation id, or a success without
/// a receipt.
pub fn interpret_callback(raw: &[u8]) -> Result<CallbackOutcome, CallbackError> {
    let envelope: CallbackEnvelope = serde_json::from_slice(raw)?;
    let callback = envelope.body.stk_callback;
    let correlation_id = callback.checkout_request_id.trim().to_owned();
    if correlation_id.is_empty() {
        return Err(CallbackError::MissingCorrelation);
    }

    if callback.result_code != RESULT_CODE_SUCCESS {
        return Ok(CallbackOutcome {
            correlation_id,
            outcome: Outcome::Failure {
                code: callback.result_code,
                reason: callback.result_desc,
            },
        });
    }

    let items = callback
        .callback_metadata
        .map(|m| m.items)
        .unwrap_or_default();
    let find = |name: &str| {
        items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    };

    let receipt = match find(RECEIPT_ITEM) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(CallbackError::MissingReceipt { correlation_id }),
    };
    let amount = find(AMOUNT_ITEM).and_then(parse_amount);

    Ok(CallbackOutcome {
        correlation_id,
        outcome: Outcome::Success { receipt, amount },
    })
}

fn parse_amount(value: &Value) -> Option<Money> {
    match value {
        Value::Number(n) => Money::parse_major(&n.to_string()),
        Value::String(s) => Money::parse_major(s),
        _ => None,
    }
}
