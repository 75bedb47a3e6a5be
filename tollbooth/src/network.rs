//! Settlement networks.
//!
//! A single ledger family is supported, in a production variant and a
//! development variant. Network names on the wire follow the x402 convention
//! of lowercase hyphenated identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported settlement network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Solana mainnet-beta.
    #[serde(rename = "solana")]
    Solana,
    /// Solana devnet.
    #[serde(rename = "solana-devnet")]
    SolanaDevnet,
}

impl Network {
    /// All supported networks.
    pub const ALL: [Self; 2] = [Self::Solana, Self::SolanaDevnet];

    /// The wire name of this network.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Solana => "solana",
            Self::SolanaDevnet => "solana-devnet",
        }
    }

    /// The CAIP-2 chain reference (truncated genesis blockhash).
    #[must_use]
    pub const fn chain_reference(&self) -> &'static str {
        match self {
            Self::Solana => "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
            Self::SolanaDevnet => "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        }
    }

    /// Whether this is a development network.
    #[must_use]
    pub const fn is_devnet(&self) -> bool {
        matches!(self, Self::SolanaDevnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a network name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetworkError(pub String);

impl FromStr for Network {
    type Err = UnknownNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solana" => Ok(Self::Solana),
            "solana-devnet" => Ok(Self::SolanaDevnet),
            other => Err(UnknownNetworkError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for network in Network::ALL {
            let json = serde_json::to_string(&network).unwrap();
            assert_eq!(json, format!("\"{network}\""));
            let back: Network = serde_json::from_str(&json).unwrap();
            assert_eq!(back, network);
            assert_eq!(network.name().parse::<Network>().unwrap(), network);
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("base-sepolia".parse::<Network>().is_err());
        assert!(serde_json::from_str::<Network>("\"solana-testnet\"").is_err());
    }
}
