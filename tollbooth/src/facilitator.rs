//! The facilitator seam.
//!
//! A facilitator verifies that a submitted payment answers the issued
//! requirements and settles it on the ledger. Resource servers talk to a
//! facilitator through this trait; the HTTP transport lives in a companion
//! crate, and tests substitute in-process fakes.

use async_trait::async_trait;
use std::sync::Arc;

use crate::proto::{PaymentRequirements, SettleOutcome, VerifyOutcome};

/// Verifies and settles x402 payments.
///
/// `verify` is read-only and safe to repeat. `settle` moves money:
/// implementations must never retry it internally on an ambiguous outcome,
/// and callers must re-verify before attempting settlement again.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Transport- or implementation-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Checks whether the payment in `header_value` answers `requirements`.
    ///
    /// # Errors
    ///
    /// Returns an error only when no definitive answer was obtained; a
    /// payment judged invalid is an `Ok` outcome with `is_valid == false`.
    async fn verify(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, Self::Error>;

    /// Settles the payment in `header_value` against `requirements`.
    ///
    /// # Errors
    ///
    /// Returns an error when no definitive settlement answer was obtained.
    /// An ambiguous outcome (e.g. a transport timeout) may or may not have
    /// settled; the caller owns recovery.
    async fn settle(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, Self::Error>;
}

#[async_trait]
impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    async fn verify(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, Self::Error> {
        (**self).verify(header_value, requirements).await
    }

    async fn settle(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, Self::Error> {
        (**self).settle(header_value, requirements).await
    }
}
