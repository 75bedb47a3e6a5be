//! Treasury settlement engine.
//!
//! Refunds move stablecoins out of a treasury account the service itself
//! controls. The pipeline is strictly ordered: validate the request, resolve
//! token accounts, check the destination exists, build and sign the transfer,
//! broadcast, then poll the ledger until the transaction reaches a terminal
//! confirmation state or the poll budget runs out.
//!
//! Time is injected through [`Clock`] so the poll loop is testable without
//! real delays. The treasury keypair is held behind an `Arc` and never
//! serialized or logged; `Debug` output carries the public key only.

use async_trait::async_trait;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tollbooth::network::Network;

use crate::codec::{self, TransferParams};
use crate::rpc::{LedgerRpc, LedgerRpcError, TxStatus};
use crate::token::{MintCache, TokenResolveError, derive_token_account};

/// Default interval between confirmation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default total confirmation wait before giving up.
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(90);

/// Default compute unit limit for a refund transfer.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 50_000;

/// Default compute unit price in micro-lamports.
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 10_000;

/// A time source for the confirmation poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;

    /// Suspends for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Lifecycle of a broadcast refund transaction.
///
/// `Submitted → Pending → {Confirmed, Finalized, Failed, TimedOut}`; the four
/// right-hand states are terminal and nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    /// Broadcast accepted by the RPC node.
    Submitted,
    /// Visible but not yet confirmed.
    Pending,
    /// Executed successfully and confirmed by a supermajority.
    Confirmed,
    /// Executed successfully and rooted.
    Finalized,
    /// Executed and failed on the ledger.
    Failed,
    /// Poll budget exhausted without a terminal ledger answer. The
    /// transaction may still land; it is not known to have failed.
    TimedOut,
}

impl ConfirmationState {
    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Finalized | Self::Failed | Self::TimedOut
        )
    }

    /// Whether the transaction is known to have executed successfully.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Finalized)
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
        };
        f.write_str(s)
    }
}

/// A refund to execute from the treasury.
///
/// The amount is integer micro-units; negative amounts are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    /// Recipient wallet address (base58).
    pub destination: String,
    /// Refund amount in the asset's smallest unit. Must be positive.
    pub amount_micro_units: u64,
}

/// The result of a refund that was broadcast.
///
/// A `TimedOut` state here is not a failure: the transfer was signed and
/// broadcast, and the signature lets an operator check its fate later. No
/// automatic resubmission happens in any case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundOutcome {
    /// The ledger transaction signature.
    pub signature: Signature,
    /// Terminal confirmation state: `Confirmed`, `Finalized`, or `TimedOut`.
    pub state: ConfirmationState,
}

impl RefundOutcome {
    /// Whether the refund is known to have executed successfully.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.state.is_confirmed()
    }
}

/// Errors executing a refund.
#[derive(Debug, thiserror::Error)]
pub enum RefundError {
    /// The request failed validation; nothing touched the network.
    #[error("invalid refund request: {0}")]
    InvalidRequest(String),
    /// The configured asset mint could not be resolved.
    #[error("could not resolve asset mint: {0}")]
    Asset(String),
    /// The destination's token account does not exist. The treasury never
    /// creates accounts on behalf of recipients.
    #[error("destination token account {0} does not exist on the ledger")]
    DestinationAccountMissing(Pubkey),
    /// The ledger could not be reached; retryable.
    #[error("ledger unavailable: {0}")]
    Network(String),
    /// The refund transaction could not be built or signed.
    #[error("could not build refund transaction: {0}")]
    Build(String),
    /// The transaction executed on the ledger and failed.
    #[error("refund transaction {signature} failed on the ledger: {reason}")]
    ExecutionFailed {
        /// The broadcast transaction signature.
        signature: Signature,
        /// The ledger's error payload.
        reason: String,
    },
}

impl From<LedgerRpcError> for RefundError {
    fn from(e: LedgerRpcError) -> Self {
        Self::Network(e.0)
    }
}

impl From<TokenResolveError> for RefundError {
    fn from(e: TokenResolveError) -> Self {
        match e {
            TokenResolveError::Network(inner) => Self::Network(inner.0),
            other => Self::Asset(other.to_string()),
        }
    }
}

/// Executes refunds from a treasury-controlled token account.
pub struct TreasuryEngine<R, C = TokioClock> {
    signer: Arc<Keypair>,
    rpc: R,
    mints: MintCache,
    mint: Pubkey,
    network: Network,
    compute_unit_limit: u32,
    compute_unit_price: u64,
    poll_interval: Duration,
    poll_budget: Duration,
    clock: C,
}

impl<R, C> fmt::Debug for TreasuryEngine<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreasuryEngine")
            .field("treasury", &self.signer.pubkey())
            .field("mint", &self.mint)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl<R: LedgerRpc> TreasuryEngine<R, TokioClock> {
    /// Creates an engine with default poll and compute budget settings.
    pub fn new(signer: Keypair, rpc: R, mint: Pubkey, network: Network) -> Self {
        tracing::info!(
            treasury = %signer.pubkey(),
            %mint,
            %network,
            "treasury engine initialized"
        );
        Self {
            signer: Arc::new(signer),
            rpc,
            mints: MintCache::new(),
            mint,
            network,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            compute_unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_budget: DEFAULT_POLL_BUDGET,
            clock: TokioClock,
        }
    }
}

impl<R: LedgerRpc, C: Clock> TreasuryEngine<R, C> {
    /// Substitutes the time source.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> TreasuryEngine<R, C2> {
        TreasuryEngine {
            signer: self.signer,
            rpc: self.rpc,
            mints: self.mints,
            mint: self.mint,
            network: self.network,
            compute_unit_limit: self.compute_unit_limit,
            compute_unit_price: self.compute_unit_price,
            poll_interval: self.poll_interval,
            poll_budget: self.poll_budget,
            clock,
        }
    }

    /// Sets the interval between confirmation polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the total confirmation wait budget.
    #[must_use]
    pub const fn with_poll_budget(mut self, budget: Duration) -> Self {
        self.poll_budget = budget;
        self
    }

    /// Sets the compute budget attached to refund transfers.
    #[must_use]
    pub const fn with_compute_budget(mut self, unit_limit: u32, unit_price: u64) -> Self {
        self.compute_unit_limit = unit_limit;
        self.compute_unit_price = unit_price;
        self
    }

    /// The treasury's wallet address.
    #[must_use]
    pub fn treasury_address(&self) -> Pubkey {
        self.signer.pubkey()
    }

    /// The network this engine settles on.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    /// Executes a refund end to end: validate, resolve accounts, build,
    /// sign, broadcast, poll to a terminal state.
    ///
    /// The engine performs no deduplication; the caller owns at-most-once
    /// semantics across retries. Dropping the returned future after broadcast
    /// abandons polling only, never the transaction itself.
    ///
    /// # Errors
    ///
    /// - [`RefundError::InvalidRequest`] before any network call for a zero
    ///   amount or unparseable destination
    /// - [`RefundError::DestinationAccountMissing`] if the recipient has no
    ///   token account for the asset
    /// - [`RefundError::ExecutionFailed`] if the transaction executed and
    ///   failed on the ledger
    /// - [`RefundError::Network`] for transport failures outside the poll
    ///   loop
    ///
    /// A poll budget exhausted without a ledger answer is `Ok` with
    /// [`ConfirmationState::TimedOut`], not an error.
    pub async fn execute_refund(
        &self,
        request: &RefundRequest,
    ) -> Result<RefundOutcome, RefundError> {
        if request.amount_micro_units == 0 {
            return Err(RefundError::InvalidRequest(
                "amount must be positive".to_owned(),
            ));
        }
        let destination: Pubkey = request
            .destination
            .parse()
            .map_err(|e| RefundError::InvalidRequest(format!("destination address: {e}")))?;

        let mint_info = self.mints.mint_info(&self.rpc, &self.mint).await?;
        let treasury = self.signer.pubkey();
        let source_ata = derive_token_account(&treasury, &self.mint, mint_info.variant);
        let destination_ata = derive_token_account(&destination, &self.mint, mint_info.variant);

        let destination_account = self.rpc.get_account(&destination_ata).await?;
        if destination_account.is_none() {
            tracing::warn!(
                destination = %destination,
                token_account = %destination_ata,
                "refund refused: destination token account does not exist"
            );
            return Err(RefundError::DestinationAccountMissing(destination_ata));
        }

        let recent_blockhash = self.rpc.latest_blockhash().await?;
        let transaction = codec::build_transfer(&TransferParams {
            fee_payer: &treasury,
            authority: &treasury,
            source: &source_ata,
            destination: &destination_ata,
            mint: &self.mint,
            amount: request.amount_micro_units,
            decimals: mint_info.decimals,
            variant: mint_info.variant,
            compute_unit_limit: self.compute_unit_limit,
            compute_unit_price: self.compute_unit_price,
            recent_blockhash,
        })
        .map_err(|e| RefundError::Build(e.to_string()))?;
        let transaction = codec::sign_transaction(transaction, self.signer.as_ref())
            .map_err(|e| RefundError::Build(e.to_string()))?;

        let signature = self.rpc.send_transaction(&transaction).await?;
        tracing::info!(
            %signature,
            destination = %destination,
            amount = request.amount_micro_units,
            "refund broadcast"
        );

        self.poll_confirmation(signature).await
    }

    async fn poll_confirmation(
        &self,
        signature: Signature,
    ) -> Result<RefundOutcome, RefundError> {
        let deadline = self.clock.now() + self.poll_budget;
        loop {
            match self.rpc.signature_status(&signature).await {
                Ok(TxStatus::Confirmed) => {
                    tracing::info!(%signature, state = %ConfirmationState::Confirmed, "refund confirmed");
                    return Ok(RefundOutcome {
                        signature,
                        state: ConfirmationState::Confirmed,
                    });
                }
                Ok(TxStatus::Finalized) => {
                    tracing::info!(%signature, state = %ConfirmationState::Finalized, "refund finalized");
                    return Ok(RefundOutcome {
                        signature,
                        state: ConfirmationState::Finalized,
                    });
                }
                Ok(TxStatus::Failed(reason)) => {
                    tracing::warn!(%signature, %reason, "refund failed on the ledger");
                    return Err(RefundError::ExecutionFailed { signature, reason });
                }
                Ok(TxStatus::Pending) => {
                    tracing::debug!(%signature, "refund pending");
                }
                // Transient poll failure; the budget bounds the retries.
                Err(e) => {
                    tracing::debug!(%signature, error = %e, "status poll failed, retrying");
                }
            }
            if self.clock.now() >= deadline {
                tracing::warn!(
                    %signature,
                    budget_secs = self.poll_budget.as_secs(),
                    "confirmation budget exhausted; transaction may still land"
                );
                return Ok(RefundOutcome {
                    signature,
                    state: ConfirmationState::TimedOut,
                });
            }
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
