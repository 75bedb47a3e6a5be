//! A [`tollbooth::Facilitator`] implementation over HTTP.
//!
//! The client posts JSON to a remote facilitator's `./verify` and `./settle`
//! endpoints. The two calls carry the same wire shape but very different
//! retry semantics:
//!
//! - `verify` is read-only, so transport failures are retried with
//!   exponential backoff up to a bounded attempt count.
//! - `settle` moves money and is sent exactly once. An ambiguous outcome
//!   (timeout, connection reset) surfaces as [`FacilitatorError::Unreachable`]
//!   and the caller must re-verify the payment before trying again.
//!
//! A definitive non-2xx answer is [`FacilitatorError::Rejected`] and is never
//! retried.

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use tollbooth::facilitator::Facilitator;
use tollbooth::proto::{PaymentRequirements, SettleOutcome, VerifyOutcome, Version};

/// Errors interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    /// URL construction failed.
    #[error("url parse: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// No definitive answer was obtained from the facilitator; retryable
    /// for `verify`, caller-owned recovery for `settle`.
    #[error("facilitator unreachable: {context}: {source}")]
    Unreachable {
        /// Human-readable context.
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator answered definitively with a non-2xx status; not
    /// retryable.
    #[error("facilitator rejected request ({status}): {context}: {body}")]
    Rejected {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// The response body did not decode as the expected JSON shape.
    #[error("facilitator response decode: {context}: {source}")]
    Decode {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

/// Request body for both `/verify` and `/settle`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequest<'a> {
    x402_version: Version<1>,
    payment_header: &'a str,
    payment_requirements: &'a PaymentRequirements,
}

/// A client for a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    client: Client,
    headers: HeaderMap,
    timeout: Duration,
    verify_attempts: u32,
    retry_backoff: Duration,
}

impl FacilitatorClient {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default number of verify attempts (first try included).
    pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;

    /// Default initial backoff between verify retries; doubles per attempt.
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

    /// Constructs a client from a base URL, deriving the `./verify` and
    /// `./settle` endpoint URLs relative to it.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError::UrlParse`] if endpoint construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorError> {
        let verify_url = base_url
            .join("./verify")
            .map_err(|e| FacilitatorError::UrlParse {
                context: "constructing ./verify URL",
                source: e,
            })?;
        let settle_url = base_url
            .join("./settle")
            .map_err(|e| FacilitatorError::UrlParse {
                context: "constructing ./settle URL",
                source: e,
            })?;
        Ok(Self {
            base_url,
            verify_url,
            settle_url,
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            verify_attempts: Self::DEFAULT_VERIFY_ATTEMPTS,
            retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
        })
    }

    /// The base URL of the facilitator.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The computed `./verify` URL.
    #[must_use]
    pub const fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// The computed `./settle` URL.
    #[must_use]
    pub const fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Attaches custom headers to all future requests.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the verify retry policy. Settlement is never retried.
    #[must_use]
    pub const fn with_verify_retries(mut self, attempts: u32, initial_backoff: Duration) -> Self {
        self.verify_attempts = if attempts == 0 { 1 } else { attempts };
        self.retry_backoff = initial_backoff;
        self
    }

    /// Sends a `POST ./verify` request, retrying transport failures.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError::Unreachable`] once the attempt budget is
    /// exhausted, or [`FacilitatorError::Rejected`] on a definitive non-2xx.
    pub async fn verify(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, FacilitatorError> {
        let request = FacilitatorRequest {
            x402_version: Version,
            payment_header: header_value,
            payment_requirements: requirements,
        };
        let mut attempt = 1;
        loop {
            match self
                .post_json::<_, VerifyOutcome>(&self.verify_url, "POST /verify", &request)
                .await
            {
                Err(FacilitatorError::Unreachable { context, source })
                    if attempt < self.verify_attempts =>
                {
                    let backoff = self.retry_backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::debug!(
                        %source,
                        context,
                        attempt,
                        ?backoff,
                        "verify transport failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Sends a `POST ./settle` request, exactly once.
    ///
    /// Settlement moves money: no retry happens here under any failure. On
    /// [`FacilitatorError::Unreachable`] the settlement may or may not have
    /// executed; re-verify the payment before attempting it again.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError`] if the request fails, is rejected, or
    /// does not decode.
    pub async fn settle(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, FacilitatorError> {
        let request = FacilitatorRequest {
            x402_version: Version,
            payment_header: header_value,
            payment_requirements: requirements,
        };
        self.post_json(&self.settle_url, "POST /settle", &request)
            .await
    }

    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorError>
    where
        T: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self
            .client
            .post(url.clone())
            .json(payload)
            .timeout(self.timeout);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        let response = req
            .send()
            .await
            .map_err(|e| FacilitatorError::Unreachable { context, source: e })?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorError::Decode { context, source: e })
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(context, %status, "facilitator rejected request");
            Err(FacilitatorError::Rejected {
                context,
                status,
                body,
            })
        }
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize to a single trailing slash so relative joins keep the
        // full base path.
        let mut normalized = value.trim_end_matches('/').to_owned();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorError::UrlParse {
            context: "parsing base URL",
            source: e,
        })?;
        Self::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    type Error = FacilitatorError;

    async fn verify(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, FacilitatorError> {
        Self::verify(self, header_value, requirements).await
    }

    async fn settle(
        &self,
        header_value: &str,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, FacilitatorError> {
        Self::settle(self, header_value, requirements).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tollbooth::amount::TokenAmount;
    use tollbooth::network::Network;
    use tollbooth::proto::Scheme;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: Network::SolanaDevnet,
            max_amount_required: TokenAmount::new(25_000),
            resource: "https://api.example.com/reports/42".to_owned(),
            description: "Quarterly report".to_owned(),
            mime_type: "application/json".to_owned(),
            output_schema: None,
            pay_to: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".to_owned(),
            max_timeout_seconds: 60,
            asset: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_owned(),
            extra: None,
        }
    }

    fn fast_client(server: &MockServer) -> FacilitatorClient {
        FacilitatorClient::try_from(server.uri().as_str())
            .unwrap()
            .with_timeout(Duration::from_millis(100))
            .with_verify_retries(3, Duration::from_millis(1))
    }

    #[test]
    fn derives_endpoint_urls_from_base() {
        let client = FacilitatorClient::try_from("https://facilitator.example.com/x402").unwrap();
        assert_eq!(
            client.verify_url().as_str(),
            "https://facilitator.example.com/x402/verify"
        );
        assert_eq!(
            client.settle_url().as_str(),
            "https://facilitator.example.com/x402/settle"
        );
    }

    #[test]
    fn normalizes_trailing_slashes() {
        let client = FacilitatorClient::try_from("https://facilitator.example.com///").unwrap();
        assert_eq!(
            client.verify_url().as_str(),
            "https://facilitator.example.com/verify"
        );
    }

    #[tokio::test]
    async fn verify_posts_wire_shape_and_decodes_valid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({
                "x402Version": 1,
                "paymentHeader": "payment-header-b64",
                "paymentRequirements": {
                    "scheme": "exact",
                    "network": "solana-devnet",
                    "maxAmountRequired": "25000"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": true,
                "payer": "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let outcome = client
            .verify("payment-header-b64", &requirements())
            .await
            .unwrap();
        assert!(outcome.is_valid);
        assert_eq!(
            outcome.payer.as_deref(),
            Some("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM")
        );
    }

    #[tokio::test]
    async fn invalid_payment_is_a_definitive_answer_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": false,
                "invalidReason": "insufficient_funds"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let outcome = client.verify("header", &requirements()).await.unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(outcome.invalid_reason.as_deref(), Some("insufficient_funds"));
    }

    #[tokio::test]
    async fn non_2xx_is_rejected_and_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.verify("header", &requirements()).await.unwrap_err();
        match err {
            FacilitatorError::Rejected { status, body, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_retries_transport_failures_up_to_the_attempt_budget() {
        let server = MockServer::start().await;
        // Delay past the client timeout so every attempt fails in transport.
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.verify("header", &requirements()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn settle_is_attempted_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "success": true,
                        "network": "solana-devnet"
                    }))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.settle("header", &requirements()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn settle_decodes_a_successful_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "transaction": "5VERYrealSignature",
                "network": "solana-devnet",
                "payer": "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let outcome = client.settle("header", &requirements()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.transaction.as_deref(), Some("5VERYrealSignature"));
        assert_eq!(outcome.network, Network::SolanaDevnet);
    }

    #[tokio::test]
    async fn malformed_response_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.settle("header", &requirements()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Decode { .. }));
    }
}
