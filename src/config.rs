//! Constructor-time configuration. Validated once in `PutClient::connect`;
//! immutable for the handle's life.

use serde::Deserialize;

use crate::error::{ensure, Result};

pub const DEFAULT_CONTRACT: &str = "putinventory";
pub const DEFAULT_PERMISSION: &str = "active";

/// Configuration for one client handle.
///
/// At least one of `put_endpoint` (relay) and `chain_endpoint` must be set;
/// co-payment additionally requires the relay. Without a private key the
/// handle is read-only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub account: String,
    pub put_endpoint: Option<String>,
    pub chain_endpoint: Option<String>,
    pub contract: Option<String>,
    pub private_key: Option<String>,
    pub permission: Option<String>,
    #[serde(default)]
    pub copayment: bool,
}

impl Config {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ..Self::default()
        }
    }

    pub fn put_endpoint(mut self, url: impl Into<String>) -> Self {
        self.put_endpoint = Some(url.into());
        self
    }

    pub fn chain_endpoint(mut self, url: impl Into<String>) -> Self {
        self.chain_endpoint = Some(url.into());
        self
    }

    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    pub fn private_key(mut self, wif: impl Into<String>) -> Self {
        self.private_key = Some(wif.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn copayment(mut self, enabled: bool) -> Self {
        self.copayment = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure(!self.account.is_empty(), "account required.")?;
        ensure(
            self.put_endpoint.is_some() || self.chain_endpoint.is_some(),
            "at least put_endpoint or chain_endpoint is required.",
        )?;
        ensure(
            !self.copayment || self.put_endpoint.is_some(),
            "put_endpoint is required for copayment.",
        )?;
        Ok(())
    }
}
