//! Service configuration: store backend, payment gateway and sweep timing.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest accepted staleness threshold for pending payments.
pub const MAX_PENDING_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// Volatile tables for development and tests.
    #[default]
    InMemory,
    /// JSON snapshot on local disk.
    File,
}

impl FromStr for StoreBackendConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_memory" | "memory" => Ok(Self::InMemory),
            "file" => Ok(Self::File),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackendConfig,
    /// Snapshot directory for the file backend.
    #[serde(default)]
    pub path: Option<String>,
}

impl StoreConfig {
    /// Validate backend settings.
    ///
    /// # Errors
    ///
    /// Returns a message when the file backend has no path.
    pub fn validate(&self) -> Result<(), String> {
        if self.backend == StoreBackendConfig::File
            && self.path.as_deref().is_none_or(|p| p.trim().is_empty())
        {
            return Err("file backend requires a path".into());
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "https://sandbox.safaricom.co.ke".into()
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_callback_path() -> String {
    "/api/payments/mpesa/callback".into()
}

fn default_account_prefix() -> String {
    "PARKBEST".into()
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Payment gateway configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Merchant short code.
    #[serde(default)]
    pub shortcode: String,
    /// API consumer key.
    #[serde(default)]
    pub consumer_key: String,
    /// API consumer secret.
    #[serde(default)]
    pub consumer_secret: String,
    /// Public base URL the gateway calls back to.
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    /// Callback route appended to the base URL.
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    /// Prefix of the account reference sent with each push.
    #[serde(default = "default_account_prefix")]
    pub account_prefix: String,
    /// Timeout for one push request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            shortcode: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            callback_base_url: default_callback_base_url(),
            callback_path: default_callback_path(),
            account_prefix: default_account_prefix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("shortcode", &self.shortcode)
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .field("callback_base_url", &self.callback_base_url)
            .field("callback_path", &self.callback_path)
            .field("account_prefix", &self.account_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GatewayConfig {
    /// Full callback URL: base URL joined with the callback path.
    #[must_use]
    pub fn callback_url(&self) -> String {
        let base = self.callback_base_url.trim_end_matches('/');
        let path = self.callback_path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Push timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate gateway settings.
    ///
    /// # Errors
    ///
    /// Returns a message for a zero timeout, a non-HTTP callback base URL or an empty
    /// account prefix.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".into());
        }
        let base = self.callback_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err("callback_base_url must be an http(s) URL".into());
        }
        if self.account_prefix.trim().is_empty() {
            return Err("account_prefix must not be empty".into());
        }
        Ok(())
    }
}

const fn default_booking_sweep_secs() -> u64 {
    300
}

const fn default_payment_sweep_secs() -> u64 {
    600
}

const fn default_pending_ttl_secs() -> u64 {
    600
}

/// Expiry sweep timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Interval of the booking-expiry sweep.
    #[serde(default = "default_booking_sweep_secs")]
    pub booking_sweep_interval_secs: u64,
    /// Interval of the stale-payment sweep.
    #[serde(default = "default_payment_sweep_secs")]
    pub payment_sweep_interval_secs: u64,
    /// Age after which a pending payment is failed.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_payment_ttl_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            booking_sweep_interval_secs: default_booking_sweep_secs(),
            payment_sweep_interval_secs: default_payment_sweep_secs(),
            pending_payment_ttl_secs: default_pending_ttl_secs(),
        }
    }
}

impl SweepConfig {
    /// Booking-expiry interval.
    #[must_use]
    pub const fn booking_interval(&self) -> Duration {
        Duration::from_secs(self.booking_sweep_interval_secs)
    }

    /// Stale-payment interval.
    #[must_use]
    pub const fn payment_interval(&self) -> Duration {
        Duration::from_secs(self.payment_sweep_interval_secs)
    }

    /// Pending-payment staleness threshold.
    #[must_use]
    pub fn pending_payment_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(Duration::from_secs(self.pending_payment_ttl_secs))
            .unwrap_or_else(|_| chrono::Duration::days(7))
    }

    /// Validate sweep timing.
    ///
    /// # Errors
    ///
    /// Returns a message for zero values or an oversized staleness threshold.
    pub fn validate(&self) -> Result<(), String> {
        if self.booking_sweep_interval_secs == 0 {
            return Err("booking_sweep_interval_secs must be greater than 0".into());
        }
        if self.payment_sweep_interval_secs == 0 {
            return Err("payment_sweep_interval_secs must be greater than 0".into());
        }
        if self.pending_payment_ttl_secs == 0 || self.pending_payment_ttl_secs > MAX_PENDING_TTL_SECS {
            return Err(format!(
                "pending_payment_ttl_secs must be between 1 and {MAX_PENDING_TTL_SECS}"
            ));
        }
        Ok(())
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingConfig {
    /// Store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Payment gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Sweep timing.
    #[serde(default)]
    pub sweeps: SweepConfig,
}

impl ParkingConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first failing section's message, prefixed with its name.
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate().map_err(|e| format!("store invalid: {e}"))?;
        self.gateway
            .validate()
            .map_err(|e| format!("gateway invalid: {e}"))?;
        self.sweeps
            .validate()
            .map_err(|e| format!("sweeps invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns a message for unparseable variables or invalid values.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns a message for unparseable variables or invalid values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(backend) = lookup("PARKBEST_STORE_BACKEND") {
            cfg.store.backend = backend.parse()?;
        }
        cfg.store.path = lookup("PARKBEST_STORE_PATH").or(cfg.store.path);

        let gateway = &mut cfg.gateway;
        let strings: [(&str, &mut String); 7] = [
            ("GATEWAY_ENDPOINT", &mut gateway.endpoint),
            ("GATEWAY_SHORTCODE", &mut gateway.shortcode),
            ("GATEWAY_CONSUMER_KEY", &mut gateway.consumer_key),
            ("GATEWAY_CONSUMER_SECRET", &mut gateway.consumer_secret),
            ("CALLBACK_BASE_URL", &mut gateway.callback_base_url),
            ("CALLBACK_PATH", &mut gateway.callback_path),
            ("GATEWAY_ACCOUNT_PREFIX", &mut gateway.account_prefix),
        ];
        for (key, slot) in strings {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }

        let numbers: [(&str, &mut u64); 4] = [
            ("GATEWAY_TIMEOUT_SECS", &mut cfg.gateway.timeout_secs),
            ("BOOKING_SWEEP_INTERVAL_SECS", &mut cfg.sweeps.booking_sweep_interval_secs),
            ("PAYMENT_SWEEP_INTERVAL_SECS", &mut cfg.sweeps.payment_sweep_interval_secs),
            ("PENDING_PAYMENT_TTL_SECS", &mut cfg.sweeps.pending_payment_ttl_secs),
        ];
        for (key, slot) in numbers {
            if let Some(value) = lookup(key) {
                *slot = value
                    .trim()
                    .parse()
                    .map_err(|e| format!("{key} must be a whole number of seconds: {e}"))?;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
