#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the tollbooth facilitator seam.
//!
//! Provides [`FacilitatorClient`], a `reqwest`-based client for a remote
//! x402 facilitator's `/verify` and `/settle` endpoints, implementing the
//! [`tollbooth::Facilitator`] trait.

mod facilitator;

pub use facilitator::{FacilitatorClient, FacilitatorError};
