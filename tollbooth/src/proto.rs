//! Wire format types for x402 payment messages.
//!
//! All types serialize to JSON with camelCase field names. The protocol
//! version travels as the `x402Version` field and is pinned at the type level
//! by [`Version`]. Payment headers are transported as base64(JSON) in the
//! [`PAYMENT_HEADER`] HTTP header.
//!
//! Amounts are [`TokenAmount`] values that serialize as decimal strings; no
//! floating-point representation ever enters a serialized payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::amount::TokenAmount;
use crate::encoding;
use crate::network::Network;

/// HTTP request header carrying the base64(JSON) payment payload.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// HTTP response header carrying the base64(JSON) settlement receipt.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// A protocol version marker parameterized by its numeric value.
///
/// Serializes as a bare integer and rejects any other value on
/// deserialization, so a mismatched `x402Version` fails at parse time.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version<const N: u8>;

impl<const N: u8> Version<N> {
    /// The numeric value of this protocol version.
    pub const VALUE: u8 = N;
}

impl<const N: u8> From<Version<N>> for u8 {
    fn from(_: Version<N>) -> Self {
        N
    }
}

impl<const N: u8> fmt::Display for Version<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{N}")
    }
}

impl<const N: u8> Serialize for Version<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(N)
    }
}

impl<'de, const N: u8> Deserialize<'de> for Version<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        if v == N {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {N}, got {v}"
            )))
        }
    }
}

/// Version marker for x402 protocol version 1.
pub type X402Version1 = Version<1>;

/// Convenience constant for constructing V1 protocol messages.
pub const V1: X402Version1 = Version;

/// A payment scheme identifier.
///
/// Only the `exact` scheme (a fixed amount settled in full) is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Exact-amount payment.
    Exact,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
        }
    }
}

/// Error parsing a scheme identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment scheme: {0}")]
pub struct UnknownSchemeError(pub String);

impl FromStr for Scheme {
    type Err = UnknownSchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            other => Err(UnknownSchemeError(other.to_owned())),
        }
    }
}

/// Payment terms set by the resource server.
///
/// Issued in the 402 response body and echoed back to the facilitator on
/// verify and settle. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme.
    pub scheme: Scheme,
    /// The settlement network.
    pub network: Network,
    /// The amount required, in the asset's smallest unit.
    pub max_amount_required: TokenAmount,
    /// The resource URL being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// Optional JSON schema for the resource output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset (mint) address.
    pub asset: String,
    /// Scheme-specific extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// HTTP 402 Payment Required response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// List of acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Optional error message if the prior request was malformed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Builds a 402 body accepting a single payment method.
    #[must_use]
    pub fn single(requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: V1,
            accepts: vec![requirements],
            error: None,
        }
    }
}

/// Errors decoding or validating a payment header.
///
/// Mismatch variants are protocol violations distinct from parse failures:
/// the header decoded cleanly but answers different payment terms.
#[derive(Debug, thiserror::Error)]
pub enum MalformedPaymentError {
    /// The header value is not valid base64.
    #[error("payment header is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded header is not the expected JSON shape.
    #[error("payment header is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The inner transaction bytes do not decode.
    #[error("payment transaction bytes do not decode: {0}")]
    Transaction(String),
    /// The header answers requirements on a different network.
    #[error("payment network {got} does not match required network {expected}")]
    NetworkMismatch {
        /// Network named by the requirements.
        expected: Network,
        /// Network named by the payment header.
        got: Network,
    },
    /// The header answers requirements under a different scheme.
    #[error("payment scheme {got} does not match required scheme {expected}")]
    SchemeMismatch {
        /// Scheme named by the requirements.
        expected: Scheme,
        /// Scheme named by the payment header.
        got: Scheme,
    },
}

/// A payment submitted by the buyer, as carried in the `X-PAYMENT` header.
///
/// `TPayload` is the scheme- and ledger-specific inner payload; for Solana it
/// wraps base64-encoded transaction bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHeader<TPayload> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme.
    pub scheme: Scheme,
    /// The settlement network.
    pub network: Network,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

impl<TPayload: Serialize> PaymentHeader<TPayload> {
    /// Encodes this header as base64(JSON) for HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize.
    pub fn to_header_value(&self) -> Result<String, MalformedPaymentError> {
        let json = serde_json::to_vec(self)?;
        Ok(encoding::encode(json))
    }
}

impl<TPayload: DeserializeOwned> PaymentHeader<TPayload> {
    /// Decodes a base64(JSON) header value.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPaymentError`] if the value is not valid base64,
    /// not valid JSON, or carries a different `x402Version`.
    pub fn from_header_value(value: &str) -> Result<Self, MalformedPaymentError> {
        let json = encoding::decode(value)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl<TPayload> PaymentHeader<TPayload> {
    /// Checks that this payment answers the given requirements.
    ///
    /// # Errors
    ///
    /// Returns a mismatch error if the network or scheme differ.
    pub fn expect_answers(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<(), MalformedPaymentError> {
        if self.network != requirements.network {
            return Err(MalformedPaymentError::NetworkMismatch {
                expected: requirements.network,
                got: self.network,
            });
        }
        if self.scheme != requirements.scheme {
            return Err(MalformedPaymentError::SchemeMismatch {
                expected: requirements.scheme,
                got: self.scheme,
            });
        }
        Ok(())
    }
}

/// Facilitator response to a verification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    /// Whether the payment is valid and settleable.
    pub is_valid: bool,
    /// Reason the payment was rejected, when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// The paying address, when recoverable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Facilitator response to a settlement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    /// Whether the payment settled on the ledger.
    pub success: bool,
    /// Reason settlement failed, when unsuccessful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// The paying address, when recoverable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// The ledger transaction identifier, when broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// The network the payment settled on.
    pub network: Network,
}
