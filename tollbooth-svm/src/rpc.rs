//! Ledger RPC abstraction.
//!
//! The settlement engine talks to the ledger through [`LedgerRpc`], a narrow
//! async trait covering the four calls the refund pipeline needs. Production
//! code uses [`SolanaRpcClient`] over the nonblocking JSON-RPC client; tests
//! substitute in-process fakes that count calls and script statuses.

use async_trait::async_trait;
use solana_account::Account;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A transient or permanent ledger transport failure.
///
/// The underlying client error is stringified at the boundary; callers treat
/// every `LedgerRpcError` as retryable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("ledger rpc: {0}")]
pub struct LedgerRpcError(pub String);

/// Observed status of a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet visible at the confirmed commitment level.
    Pending,
    /// Executed successfully and confirmed by a supermajority.
    Confirmed,
    /// Executed successfully and rooted; cannot be rolled back.
    Finalized,
    /// Executed and failed; carries the ledger error payload.
    Failed(String),
}

/// The ledger calls required by the settlement pipeline.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetches an account at confirmed commitment. `None` means the account
    /// does not exist on the ledger.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerRpcError>;

    /// Fetches a recent blockhash for transaction construction.
    async fn latest_blockhash(&self) -> Result<Hash, LedgerRpcError>;

    /// Broadcasts a signed transaction, returning its signature.
    ///
    /// Preflight simulation is skipped so execution failures surface through
    /// [`LedgerRpc::signature_status`] rather than at submission.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, LedgerRpcError>;

    /// Reports the current status of a broadcast transaction.
    async fn signature_status(&self, signature: &Signature) -> Result<TxStatus, LedgerRpcError>;
}

/// [`LedgerRpc`] over the Solana nonblocking JSON-RPC client.
#[derive(Clone)]
pub struct SolanaRpcClient {
    inner: Arc<RpcClient>,
}

impl fmt::Debug for SolanaRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaRpcClient")
            .field("url", &self.inner.url())
            .finish()
    }
}

impl SolanaRpcClient {
    /// Default per-request timeout, distinct from any confirmation budget
    /// the caller polls under.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a client against the given RPC endpoint with the default
    /// per-request timeout.
    #[must_use]
    pub fn new(url: impl ToString) -> Self {
        Self::new_with_timeout(url, Self::DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with an explicit per-request timeout. Each of the
    /// four RPC calls is bounded by it individually.
    #[must_use]
    pub fn new_with_timeout(url: impl ToString, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RpcClient::new_with_timeout(url.to_string(), timeout)),
        }
    }

    /// The RPC endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.url()
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpcClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerRpcError> {
        let response = self
            .inner
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(|e| LedgerRpcError(format!("{e}")))?;
        Ok(response.value)
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerRpcError> {
        self.inner
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerRpcError(format!("{e}")))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, LedgerRpcError> {
        self.inner
            .send_transaction_with_config(
                transaction,
                RpcSendTransactionConfig {
                    skip_preflight: true,
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await
            .map_err(|e| LedgerRpcError(format!("{e}")))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<TxStatus, LedgerRpcError> {
        let confirmed = self
            .inner
            .get_signature_status_with_commitment(signature, CommitmentConfig::confirmed())
            .await
            .map_err(|e| LedgerRpcError(format!("{e}")))?;
        match confirmed {
            None => Ok(TxStatus::Pending),
            Some(Err(err)) => Ok(TxStatus::Failed(err.to_string())),
            Some(Ok(())) => {
                let finalized = self
                    .inner
                    .get_signature_status_with_commitment(signature, CommitmentConfig::finalized())
                    .await
                    .map_err(|e| LedgerRpcError(format!("{e}")))?;
                match finalized {
                    Some(Ok(())) => Ok(TxStatus::Finalized),
                    _ => Ok(TxStatus::Confirmed),
                }
            }
        }
    }
}
