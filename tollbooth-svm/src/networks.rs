//! Well-known asset deployments.
//!
//! USDC is the default settlement asset. The mint addresses are fixed,
//! publicly documented deployments per network.

use solana_pubkey::{ParsePubkeyError, Pubkey, pubkey};
use tollbooth::config::GatewayConfig;
use tollbooth::network::Network;

/// USDC decimals on every supported network.
pub const USDC_DECIMALS: u8 = 6;

/// The USDC mint deployed on the given network.
#[must_use]
pub const fn usdc_mint(network: Network) -> Pubkey {
    match network {
        Network::Solana => pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        Network::SolanaDevnet => pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    }
}

/// Resolves the settlement asset: an explicit mint override, or the
/// network's USDC deployment when absent.
///
/// # Errors
///
/// Returns [`ParsePubkeyError`] if the override is not a valid address.
pub fn resolve_asset(
    network: Network,
    override_mint: Option<&str>,
) -> Result<Pubkey, ParsePubkeyError> {
    match override_mint {
        Some(mint) => mint.parse(),
        None => Ok(usdc_mint(network)),
    }
}

/// Resolves the settlement asset named by a gateway configuration: its
/// explicit override when present, the network's USDC deployment otherwise.
///
/// # Errors
///
/// Returns [`ParsePubkeyError`] if the configured override is not a valid
/// address.
pub fn configured_asset(config: &GatewayConfig) -> Result<Pubkey, ParsePubkeyError> {
    resolve_asset(config.network, config.asset.as_deref())
}
