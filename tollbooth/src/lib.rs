#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for x402 payment settlement over HTTP 402.
//!
//! The x402 flow turns the HTTP 402 Payment Required status code into a
//! machine-readable paywall: a server answers an unpaid request with payment
//! requirements, the client retries with a signed payment attached in the
//! `X-PAYMENT` header, and a facilitator service verifies and settles the
//! payment on the client's behalf.
//!
//! This crate is ledger-agnostic. It carries the wire format and the seams:
//!
//! - [`proto`] - Wire format types: requirements, payment headers, responses
//! - [`amount`] - Integer micro-unit token amounts and USD conversion
//! - [`network`] - Supported settlement networks
//! - [`issuer`] - Construction of payment requirements for the 402 body
//! - [`facilitator`] - The verify/settle trait implemented by transports
//! - [`config`] - Gateway configuration with startup validation
//! - [`encoding`] - Base64 helpers for header transport
//!
//! Ledger-specific settlement (transaction building, signing, broadcast,
//! confirmation) lives in companion crates.

pub mod amount;
pub mod config;
pub mod encoding;
pub mod facilitator;
pub mod issuer;
pub mod network;
pub mod proto;

pub use amount::TokenAmount;
pub use config::{ConfigError, GatewayConfig};
pub use facilitator::Facilitator;
pub use issuer::RequirementsIssuer;
pub use network::Network;
pub use proto::{
    MalformedPaymentError, PaymentHeader, PaymentRequired, PaymentRequirements, Scheme,
    SettleOutcome, VerifyOutcome,
};
