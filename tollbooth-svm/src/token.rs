//! Token account resolution.
//!
//! SPL tokens live in associated token accounts (ATAs) derived from the
//! owner, the mint, and the owning token program. Which token program owns a
//! mint (classic SPL Token vs Token-2022) is a ledger fact; [`MintCache`]
//! reads it once per mint per process, together with the mint's decimals.

use dashmap::DashMap;
use solana_pubkey::{Pubkey, pubkey};
use spl_token::solana_program::program_pack::Pack;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::rpc::{LedgerRpc, LedgerRpcError};

/// Associated Token Account program public key.
pub const ATA_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// The token program owning a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenProgramVariant {
    /// Classic SPL Token.
    Token,
    /// SPL Token-2022.
    Token2022,
}

impl TokenProgramVariant {
    /// The program id of this variant.
    #[must_use]
    pub fn program_id(&self) -> Pubkey {
        match self {
            Self::Token => spl_token::id(),
            Self::Token2022 => spl_token_2022::id(),
        }
    }
}

/// Ledger facts about a mint needed to build transfers against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintInfo {
    /// The owning token program.
    pub variant: TokenProgramVariant,
    /// Fractional digits carried by the mint.
    pub decimals: u8,
}

/// Derives the associated token account for `owner` holding `mint`.
///
/// Pure computation; two calls with the same inputs always agree, so token
/// accounts are resolved without any ledger round trip.
#[must_use]
pub fn derive_token_account(
    owner: &Pubkey,
    mint: &Pubkey,
    variant: TokenProgramVariant,
) -> Pubkey {
    let token_program = variant.program_id();
    let (address, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    );
    address
}

/// Errors resolving a mint's program variant and decimals.
#[derive(Debug, thiserror::Error)]
pub enum TokenResolveError {
    /// The mint account does not exist on the ledger.
    #[error("mint account {0} does not exist on the ledger")]
    MintMissing(Pubkey),
    /// The mint is owned by a program this crate does not support.
    #[error("mint {mint} is owned by unsupported program {owner}")]
    UnsupportedProgram {
        /// The mint address.
        mint: Pubkey,
        /// The owning program.
        owner: Pubkey,
    },
    /// The mint account data did not unpack as a mint.
    #[error("mint {mint} data did not unpack: {reason}")]
    MintUnpack {
        /// The mint address.
        mint: Pubkey,
        /// Unpack failure detail.
        reason: String,
    },
    /// The ledger could not be reached; retryable.
    #[error(transparent)]
    Network(#[from] LedgerRpcError),
}

/// Read-through cache of [`MintInfo`] keyed by mint address.
///
/// A mint's owning program and decimals never change, so each mint is read
/// from the ledger at most once for the lifetime of the process. Concurrent
/// first lookups of the same mint share a single fetch; a failed fetch leaves
/// the slot empty so the next lookup retries.
#[derive(Debug, Default)]
pub struct MintCache {
    cells: DashMap<Pubkey, Arc<OnceCell<MintInfo>>>,
}

impl MintCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mint's program variant and decimals, fetching from the
    /// ledger on first access.
    ///
    /// # Errors
    ///
    /// Returns [`TokenResolveError`] if the mint is missing, owned by an
    /// unsupported program, malformed, or the ledger is unreachable.
    pub async fn mint_info<R: LedgerRpc>(
        &self,
        rpc: &R,
        mint: &Pubkey,
    ) -> Result<MintInfo, TokenResolveError> {
        let cell = Arc::clone(&self.cells.entry(*mint).or_default());
        cell.get_or_try_init(|| fetch_mint_info(rpc, mint))
            .await
            .copied()
    }

    /// Returns the cached entry without touching the ledger.
    #[must_use]
    pub fn cached(&self, mint: &Pubkey) -> Option<MintInfo> {
        self.cells
            .get(mint)
            .and_then(|cell| cell.get().copied())
    }
}

async fn fetch_mint_info<R: LedgerRpc>(
    rpc: &R,
    mint: &Pubkey,
) -> Result<MintInfo, TokenResolveError> {
    let account = rpc
        .get_account(mint)
        .await?
        .ok_or(TokenResolveError::MintMissing(*mint))?;
    if account.owner == spl_token::id() {
        let state =
            spl_token::state::Mint::unpack(&account.data).map_err(|e| {
                TokenResolveError::MintUnpack {
                    mint: *mint,
                    reason: format!("{e}"),
                }
            })?;
        Ok(MintInfo {
            variant: TokenProgramVariant::Token,
            decimals: state.decimals,
        })
    } else if account.owner == spl_token_2022::id() {
        let state =
            spl_token_2022::state::Mint::unpack(&account.data).map_err(|e| {
                TokenResolveError::MintUnpack {
                    mint: *mint,
                    reason: format!("{e}"),
                }
            })?;
        Ok(MintInfo {
            variant: TokenProgramVariant::Token2022,
            decimals: state.decimals,
        })
    } else {
        Err(TokenResolveError::UnsupportedProgram {
            mint: *mint,
            owner: account.owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solana_account::Account;
    use solana_message::Hash;
    use solana_signature::Signature;
    use solana_transaction::versioned::VersionedTransaction;
    use spl_token::solana_program::program_option::COption;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::rpc::TxStatus;

    struct CountingLedger {
        accounts: HashMap<Pubkey, Account>,
        account_calls: AtomicUsize,
    }

    impl CountingLedger {
        fn new(accounts: HashMap<Pubkey, Account>) -> Self {
            Self {
                accounts,
                account_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LedgerRpc for CountingLedger {
        async fn get_account(
            &self,
            address: &Pubkey,
        ) -> Result<Option<Account>, LedgerRpcError> {
            self.account_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accounts.get(address).cloned())
        }

        async fn latest_blockhash(&self) -> Result<Hash, LedgerRpcError> {
            Ok(Hash::default())
        }

        async fn send_transaction(
            &self,
            _transaction: &VersionedTransaction,
        ) -> Result<Signature, LedgerRpcError> {
            Err(LedgerRpcError("not under test".to_owned()))
        }

        async fn signature_status(
            &self,
            _signature: &Signature,
        ) -> Result<TxStatus, LedgerRpcError> {
            Err(LedgerRpcError("not under test".to_owned()))
        }
    }

    fn mint_account(owner: Pubkey, decimals: u8) -> Account {
        let state = spl_token::state::Mint {
            mint_authority: COption::None,
            supply: 1_000_000_000,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        let mut data = vec![0u8; spl_token::state::Mint::LEN];
        spl_token::state::Mint::pack(state, &mut data).unwrap();
        Account {
            lamports: 1_461_600,
            data,
            owner,
            executable: false,
            rent_epoch: 0,
        }
    }

    #[test]
    fn derivation_is_deterministic_and_input_sensitive() {
        let owner = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ata = derive_token_account(&owner, &mint, TokenProgramVariant::Token);
        assert_eq!(
            ata,
            derive_token_account(&owner, &mint, TokenProgramVariant::Token)
        );
        assert_ne!(
            ata,
            derive_token_account(&other, &mint, TokenProgramVariant::Token)
        );
        assert_ne!(
            ata,
            derive_token_account(&owner, &mint, TokenProgramVariant::Token2022)
        );
    }

    #[tokio::test]
    async fn caches_mint_lookup_per_process() {
        let mint = Pubkey::new_unique();
        let ledger = CountingLedger::new(HashMap::from([(
            mint,
            mint_account(spl_token::id(), 6),
        )]));
        let cache = MintCache::new();

        let first = cache.mint_info(&ledger, &mint).await.unwrap();
        let second = cache.mint_info(&ledger, &mint).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.variant, TokenProgramVariant::Token);
        assert_eq!(first.decimals, 6);
        assert_eq!(ledger.account_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached(&mint), Some(first));
    }

    #[tokio::test]
    async fn detects_token_2022_mints() {
        let mint = Pubkey::new_unique();
        let ledger = CountingLedger::new(HashMap::from([(
            mint,
            mint_account(spl_token_2022::id(), 9),
        )]));
        let cache = MintCache::new();

        let info = cache.mint_info(&ledger, &mint).await.unwrap();
        assert_eq!(info.variant, TokenProgramVariant::Token2022);
        assert_eq!(info.decimals, 9);
    }

    #[tokio::test]
    async fn missing_mint_is_an_error_and_not_cached() {
        let mint = Pubkey::new_unique();
        let ledger = CountingLedger::new(HashMap::new());
        let cache = MintCache::new();

        let err = cache.mint_info(&ledger, &mint).await.unwrap_err();
        assert!(matches!(err, TokenResolveError::MintMissing(m) if m == mint));
        assert!(cache.cached(&mint).is_none());

        // Failed fetch does not poison the slot; the next call retries.
        let err = cache.mint_info(&ledger, &mint).await.unwrap_err();
        assert!(matches!(err, TokenResolveError::MintMissing(_)));
        assert_eq!(ledger.account_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_owner_program_is_rejected() {
        let mint = Pubkey::new_unique();
        let bogus_program = Pubkey::new_unique();
        let ledger = CountingLedger::new(HashMap::from([(
            mint,
            mint_account(bogus_program, 6),
        )]));
        let cache = MintCache::new();

        let err = cache.mint_info(&ledger, &mint).await.unwrap_err();
        assert!(matches!(
            err,
            TokenResolveError::UnsupportedProgram { owner, .. } if owner == bogus_program
        ));
    }
}
