#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana settlement for the tollbooth payment stack.
//!
//! This crate turns the ledger-agnostic types of `tollbooth` into actual
//! SPL Token movements:
//!
//! - [`rpc`] - Narrow async abstraction over the Solana JSON-RPC surface,
//!   mockable in tests
//! - [`token`] - Associated token account derivation and cached mint
//!   program-variant detection (SPL Token vs Token-2022)
//! - [`codec`] - Building, signing, and base64 wire encoding of transfer
//!   transactions, plus the Solana payment header payload
//! - [`treasury`] - The refund pipeline: validate, resolve accounts, build,
//!   sign, broadcast, poll to confirmation
//! - [`networks`] - Well-known USDC deployments per network

pub mod codec;
pub mod networks;
pub mod rpc;
pub mod token;
pub mod treasury;

pub use rpc::{LedgerRpc, LedgerRpcError, SolanaRpcClient, TxStatus};
pub use token::{MintCache, MintInfo, TokenProgramVariant, derive_token_account};
pub use treasury::{ConfirmationState, RefundError, RefundOutcome, RefundRequest, TreasuryEngine};
