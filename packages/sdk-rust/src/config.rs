//! Process settings: endpoint, signing secrets and invoker tuning.
//!
//! Every required value is checked before anything touches the network. A
//! missing value is reported by its environment variable name.

use std::fmt;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::transports::http::reqwest::Url;

use crate::error::{Error, Result};

// ─── Environment variable names ───────────────────────────────────────────────

pub const RPC_URL_VAR:   &str = "ARBITRUM_SEPOLIA_RPC_URL";
pub const ADMIN_KEY_VAR: &str = "ADMIN_PRIVATE_KEY";
pub const USER_KEY_VAR:  &str = "USER_PRIVATE_KEY";
pub const CONTRACT_VAR:  &str = "POOL_MASTER_CONTRACT";

/// Receipt polling cadence when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ─── Settings ─────────────────────────────────────────────────────────────────

/// Validated settings. Secrets are redacted from `Debug` output.
#[derive(Clone)]
pub struct Settings {
    rpc_url:         Url,
    admin_key:       String,
    user_key:        String,
    contract:        Option<Address>,
    poll_interval:   Duration,
    receipt_timeout: Option<Duration>,
}

impl Settings {
    /// Build settings from the three required values. Blank values count as
    /// missing.
    pub fn new(
        rpc_url:   impl Into<String>,
        admin_key: impl Into<String>,
        user_key:  impl Into<String>,
    ) -> Result<Self> {
        Self::resolve(Some(rpc_url.into()), Some(admin_key.into()), Some(user_key.into()))
    }

    /// Build settings from optional values, failing on the first absent one
    /// in the order endpoint, admin key, user key.
    pub fn resolve(
        rpc_url:   Option<String>,
        admin_key: Option<String>,
        user_key:  Option<String>,
    ) -> Result<Self> {
        let rpc_url   = required(RPC_URL_VAR, rpc_url)?;
        let admin_key = required(ADMIN_KEY_VAR, admin_key)?;
        let user_key  = required(USER_KEY_VAR, user_key)?;

        let rpc_url = Url::parse(rpc_url.trim()).map_err(|e| Error::InvalidConfig {
            key:    RPC_URL_VAR,
            reason: e.to_string(),
        })?;

        Ok(Self {
            rpc_url,
            admin_key,
            user_key,
            contract:        None,
            poll_interval:   DEFAULT_POLL_INTERVAL,
            receipt_timeout: None,
        })
    }

    /// Read every setting through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self::resolve(
            lookup(RPC_URL_VAR),
            lookup(ADMIN_KEY_VAR),
            lookup(USER_KEY_VAR),
        )?;
        match lookup(CONTRACT_VAR).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Ok(settings.with_contract(parse_address(CONTRACT_VAR, &raw)?)),
            None      => Ok(settings),
        }
    }

    /// Read every setting from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Target a contract other than the default deployment.
    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up waiting for a receipt after `timeout`. Unbounded by default.
    pub fn with_receipt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    pub fn contract(&self) -> Option<Address> {
        self.contract
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn receipt_timeout(&self) -> Option<Duration> {
        self.receipt_timeout
    }

    pub(crate) fn admin_key(&self) -> &str {
        &self.admin_key
    }

    pub(crate) fn user_key(&self) -> &str {
        &self.user_key
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("admin_key", &"<redacted>")
            .field("user_key", &"<redacted>")
            .field("contract", &self.contract)
            .field("poll_interval", &self.poll_interval)
            .field("receipt_timeout", &self.receipt_timeout)
            .finish()
    }
}

/// Parse a hex address, attributing failures to `key`.
pub fn parse_address(key: &'static str, raw: &str) -> Result<Address> {
    raw.trim().parse::<Address>().map_err(|e| Error::InvalidConfig {
        key,
        reason: e.to_string(),
    })
}

fn required(key: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::MissingConfig { key }),
    }
}
