//! Payment requirement issuance.
//!
//! A [`RequirementsIssuer`] holds the validated, gateway-side payment terms
//! (network, asset, recipient) and stamps out [`PaymentRequirements`] for
//! 402 responses. Issuance is pure construction: no I/O, no clock, no
//! ledger access. Callers supply only the per-resource amount, description,
//! and resource URL; the recipient and network can never be influenced by
//! request data.

use crate::amount::TokenAmount;
use crate::config::ConfigError;
use crate::network::Network;
use crate::proto::{PaymentRequirements, Scheme};

/// Default payment validity window, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;

const DEFAULT_MIME_TYPE: &str = "application/json";

/// Issues payment requirements for protected resources.
#[derive(Debug, Clone)]
pub struct RequirementsIssuer {
    network: Network,
    asset: String,
    pay_to: String,
    max_timeout_seconds: u64,
}

impl RequirementsIssuer {
    /// Creates an issuer for the given network, asset, and recipient.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the recipient or asset address is blank.
    /// This is the startup-time fatal check: an issuer with a missing
    /// recipient must never come into existence.
    pub fn new(
        network: Network,
        asset: impl Into<String>,
        pay_to: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let asset = asset.into();
        let pay_to = pay_to.into();
        if pay_to.trim().is_empty() {
            return Err(ConfigError::MissingRecipient);
        }
        if asset.trim().is_empty() {
            return Err(ConfigError::BlankAsset);
        }
        Ok(Self {
            network,
            asset,
            pay_to,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
        })
    }

    /// Sets the payment validity window.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// The network this issuer settles on.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    /// Builds payment requirements for one resource.
    ///
    /// The amount is integer micro-units and serializes as a decimal string;
    /// network, asset, and recipient come from the validated issuer state.
    #[must_use]
    pub fn issue(
        &self,
        amount: TokenAmount,
        description: impl Into<String>,
        resource: impl Into<String>,
    ) -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: self.network,
            max_amount_required: amount,
            resource: resource.into(),
            description: description.into(),
            mime_type: DEFAULT_MIME_TYPE.to_owned(),
            output_schema: None,
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            extra: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAY_TO: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const USDC_DEVNET: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

    #[test]
    fn refuses_blank_recipient() {
        let err = RequirementsIssuer::new(Network::SolanaDevnet, USDC_DEVNET, "  ").unwrap_err();
        assert_eq!(err, ConfigError::MissingRecipient);
    }

    #[test]
    fn refuses_blank_asset() {
        let err = RequirementsIssuer::new(Network::SolanaDevnet, "", PAY_TO).unwrap_err();
        assert_eq!(err, ConfigError::BlankAsset);
    }

    #[test]
    fn issues_requirements_from_validated_state() {
        let issuer = RequirementsIssuer::new(Network::SolanaDevnet, USDC_DEVNET, PAY_TO).unwrap();
        let reqs = issuer.issue(
            TokenAmount::new(25_000),
            "Quarterly report",
            "https://api.example.com/reports/42",
        );
        assert_eq!(reqs.scheme, Scheme::Exact);
        assert_eq!(reqs.network, Network::SolanaDevnet);
        assert_eq!(reqs.max_amount_required, TokenAmount::new(25_000));
        assert_eq!(reqs.pay_to, PAY_TO);
        assert_eq!(reqs.asset, USDC_DEVNET);
        assert_eq!(reqs.max_timeout_seconds, DEFAULT_MAX_TIMEOUT_SECONDS);
    }

    #[test]
    fn timeout_is_adjustable() {
        let issuer = RequirementsIssuer::new(Network::Solana, USDC_DEVNET, PAY_TO)
            .unwrap()
            .with_timeout(300);
        let reqs = issuer.issue(TokenAmount::new(1), "a", "https://a.example");
        assert_eq!(reqs.max_timeout_seconds, 300);
    }

    #[test]
    fn amount_never_serializes_as_a_number() {
        let issuer = RequirementsIssuer::new(Network::Solana, USDC_DEVNET, PAY_TO).unwrap();
        let reqs = issuer.issue(
            TokenAmount::new(18_446_744_073_709_551_615),
            "max",
            "https://a.example",
        );
        let json = serde_json::to_value(&reqs).unwrap();
        assert!(json["maxAmountRequired"].is_string());
        assert_eq!(json["maxAmountRequired"], "18446744073709551615");
    }
}
