//! Gateway configuration.
//!
//! Configuration is an explicit value handed to components at construction.
//! Nothing in this workspace reads the process environment; the host
//! application loads a [`GatewayConfig`] however it likes (file, env,
//! hardcoded) and wires components from it once at startup, starting with
//! [`GatewayConfig::issuer`].
//! Validation failures are fatal: a gateway must never issue payment
//! requirements it cannot settle against.

use serde::Deserialize;
use url::Url;

use crate::issuer::RequirementsIssuer;
use crate::network::Network;

/// Configuration for a payment gateway instance.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// The settlement network.
    pub network: Network,
    /// Asset (mint) address override. `None` selects the network's
    /// well-known USDC deployment.
    #[serde(default)]
    pub asset: Option<String>,
    /// The recipient address payments are made out to.
    pub pay_to: String,
    /// Ledger RPC endpoint.
    pub rpc_url: Url,
    /// Facilitator service base URL.
    pub facilitator_url: Url,
}

/// Fatal configuration errors, checked once at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The payment recipient address is empty or blank.
    #[error("payment recipient address is not configured")]
    MissingRecipient,
    /// The asset override is present but blank.
    #[error("asset address override is blank")]
    BlankAsset,
}

impl GatewayConfig {
    /// Runs the startup checks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the recipient is missing or the asset
    /// override is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pay_to.trim().is_empty() {
            return Err(ConfigError::MissingRecipient);
        }
        if let Some(asset) = &self.asset {
            if asset.trim().is_empty() {
                return Err(ConfigError::BlankAsset);
            }
        }
        Ok(())
    }

    /// Builds a [`RequirementsIssuer`] from this configuration and the
    /// resolved asset address.
    ///
    /// The asset is passed in resolved form because default-asset lookup is
    /// ledger-specific; companion crates resolve `asset` overrides against
    /// their well-known deployments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn issuer(&self, asset: impl Into<String>) -> Result<RequirementsIssuer, ConfigError> {
        self.validate()?;
        RequirementsIssuer::new(self.network, asset, self.pay_to.clone())
    }
}
