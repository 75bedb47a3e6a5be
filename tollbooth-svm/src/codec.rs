//! Transaction codec.
//!
//! Payments and refunds travel as two nested encodings: the inner layer is
//! the canonical bincode serialization of a versioned Solana transaction,
//! base64-encoded; the outer layer is the base64(JSON) payment header carrying
//! that string in its payload. Both directions are exact: serializing and
//! deserializing a transaction yields byte-identical results.

use serde::{Deserialize, Serialize};
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::v0::Message as MessageV0;
use solana_message::{Hash, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::Instruction;
use solana_transaction::versioned::VersionedTransaction;

use tollbooth::encoding;
use tollbooth::proto::{MalformedPaymentError, PaymentHeader, PaymentRequirements, V1};

use crate::token::TokenProgramVariant;

/// Solana payment header payload: a serialized transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaPayload {
    /// Base64-encoded bincode bytes of a versioned transaction.
    pub transaction: String,
}

/// Errors building, signing, or serializing a transaction.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A transfer instruction could not be constructed.
    #[error("transfer instruction: {0}")]
    Instruction(String),
    /// The message failed to compile.
    #[error("message compile: {0}")]
    Compile(String),
    /// The signer is not one of the transaction's required signers.
    #[error("signer is not a required signer of this transaction")]
    SignerNotRequired,
    /// The signer failed to produce a signature.
    #[error("signing: {0}")]
    Signing(String),
    /// The transaction failed to serialize.
    #[error("transaction serialization: {0}")]
    Serialize(String),
    /// The outer payment header failed to encode.
    #[error(transparent)]
    Header(#[from] MalformedPaymentError),
}

/// Inputs for building an SPL token transfer transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransferParams<'a> {
    /// Fee payer and first required signer.
    pub fee_payer: &'a Pubkey,
    /// Owner of the source token account.
    pub authority: &'a Pubkey,
    /// Source token account.
    pub source: &'a Pubkey,
    /// Destination token account.
    pub destination: &'a Pubkey,
    /// The token mint.
    pub mint: &'a Pubkey,
    /// Transfer amount in the mint's smallest unit.
    pub amount: u64,
    /// The mint's decimals, checked on-chain by `transfer_checked`.
    pub decimals: u8,
    /// The token program owning the mint.
    pub variant: TokenProgramVariant,
    /// Compute unit limit for the transaction.
    pub compute_unit_limit: u32,
    /// Compute unit price in micro-lamports.
    pub compute_unit_price: u64,
    /// Recent blockhash, fetched immediately before signing.
    pub recent_blockhash: Hash,
}

/// Builds an unsigned `transfer_checked` transaction with compute budget
/// instructions.
///
/// Instruction order is compute unit limit, compute unit price, transfer.
///
/// # Errors
///
/// Returns [`CodecError`] if the transfer instruction or message cannot be
/// constructed.
pub fn build_transfer(params: &TransferParams<'_>) -> Result<VersionedTransaction, CodecError> {
    let transfer = match params.variant {
        TokenProgramVariant::Token => spl_token::instruction::transfer_checked(
            &spl_token::id(),
            params.source,
            params.mint,
            params.destination,
            params.authority,
            &[],
            params.amount,
            params.decimals,
        )
        .map_err(|e| CodecError::Instruction(format!("{e}")))?,
        TokenProgramVariant::Token2022 => spl_token_2022::instruction::transfer_checked(
            &spl_token_2022::id(),
            params.source,
            params.mint,
            params.destination,
            params.authority,
            &[],
            params.amount,
            params.decimals,
        )
        .map_err(|e| CodecError::Instruction(format!("{e}")))?,
    };

    let instructions: Vec<Instruction> = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(params.compute_unit_limit),
        ComputeBudgetInstruction::set_compute_unit_price(params.compute_unit_price),
        transfer,
    ];

    let message =
        MessageV0::try_compile(params.fee_payer, &instructions, &[], params.recent_blockhash)
            .map_err(|e| CodecError::Compile(format!("{e:?}")))?;

    Ok(VersionedTransaction {
        signatures: vec![],
        message: VersionedMessage::V0(message),
    })
}

/// Signs a transaction, placing the signature at the signer's required
/// position.
///
/// # Errors
///
/// Returns [`CodecError::SignerNotRequired`] if the signer's key is not among
/// the message's required signers.
pub fn sign_transaction<S: Signer>(
    mut transaction: VersionedTransaction,
    signer: &S,
) -> Result<VersionedTransaction, CodecError> {
    let message_bytes = transaction.message.serialize();
    let signature = signer
        .try_sign_message(&message_bytes)
        .map_err(|e| CodecError::Signing(format!("{e}")))?;

    let num_required = transaction.message.header().num_required_signatures as usize;
    let static_keys = transaction.message.static_account_keys();
    let position = static_keys[..num_required]
        .iter()
        .position(|key| *key == signer.pubkey())
        .ok_or(CodecError::SignerNotRequired)?;

    if transaction.signatures.len() < num_required {
        transaction
            .signatures
            .resize(num_required, Signature::default());
    }
    transaction.signatures[position] = signature;
    Ok(transaction)
}

/// Whether every required signature slot holds a real signature.
#[must_use]
pub fn is_fully_signed(transaction: &VersionedTransaction) -> bool {
    let num_required = transaction.message.header().num_required_signatures as usize;
    if transaction.signatures.len() < num_required {
        return false;
    }
    let default = Signature::default();
    transaction
        .signatures
        .iter()
        .all(|signature| *signature != default)
}

/// Serializes a transaction to its base64 wire form.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if bincode serialization fails.
pub fn serialize_base64(transaction: &VersionedTransaction) -> Result<String, CodecError> {
    let bytes =
        bincode::serialize(transaction).map_err(|e| CodecError::Serialize(format!("{e}")))?;
    Ok(encoding::encode(bytes))
}

/// Deserializes a transaction from its base64 wire form.
///
/// # Errors
///
/// Returns [`MalformedPaymentError`] if the input is not valid base64 or the
/// bytes do not decode as a versioned transaction.
pub fn deserialize_base64(value: &str) -> Result<VersionedTransaction, MalformedPaymentError> {
    let bytes = encoding::decode(value)?;
    bincode::deserialize(&bytes).map_err(|e| MalformedPaymentError::Transaction(format!("{e}")))
}

/// Encodes a signed transaction as an `X-PAYMENT` header value answering the
/// given requirements.
///
/// # Errors
///
/// Returns [`CodecError`] if serialization fails.
pub fn encode_payment_header(
    transaction: &VersionedTransaction,
    requirements: &PaymentRequirements,
) -> Result<String, CodecError> {
    let header = PaymentHeader {
        x402_version: V1,
        scheme: requirements.scheme,
        network: requirements.network,
        payload: SolanaPayload {
            transaction: serialize_base64(transaction)?,
        },
    };
    Ok(header.to_header_value()?)
}

/// Decodes an `X-PAYMENT` header value into its header and the inner
/// transaction.
///
/// # Errors
///
/// Returns [`MalformedPaymentError`] if either encoding layer is invalid.
pub fn decode_payment_header(
    value: &str,
) -> Result<(PaymentHeader<SolanaPayload>, VersionedTransaction), MalformedPaymentError> {
    let header: PaymentHeader<SolanaPayload> = PaymentHeader::from_header_value(value)?;
    let transaction = deserialize_base64(&header.payload.transaction)?;
    Ok((header, transaction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_keypair::Keypair;
    use tollbooth::amount::TokenAmount;
    use tollbooth::network::Network;
    use tollbooth::proto::Scheme;

    use crate::token::derive_token_account;

    fn params<'a>(
        fee_payer: &'a Pubkey,
        source: &'a Pubkey,
        destination: &'a Pubkey,
        mint: &'a Pubkey,
    ) -> TransferParams<'a> {
        TransferParams {
            fee_payer,
            authority: fee_payer,
            source,
            destination,
            mint,
            amount: 25_000,
            decimals: 6,
            variant: TokenProgramVariant::Token,
            compute_unit_limit: 50_000,
            compute_unit_price: 10_000,
            recent_blockhash: Hash::default(),
        }
    }

    fn build_signed() -> (Keypair, VersionedTransaction) {
        let keypair = Keypair::new();
        let authority = keypair.pubkey();
        let mint = Pubkey::new_unique();
        let destination_owner = Pubkey::new_unique();
        let source = derive_token_account(&authority, &mint, TokenProgramVariant::Token);
        let destination =
            derive_token_account(&destination_owner, &mint, TokenProgramVariant::Token);
        let tx = build_transfer(&params(&authority, &source, &destination, &mint)).unwrap();
        let tx = sign_transaction(tx, &keypair).unwrap();
        (keypair, tx)
    }

    #[test]
    fn builds_compute_budget_then_transfer() {
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let tx = build_transfer(&params(&authority, &source, &destination, &mint)).unwrap();

        let instructions = tx.message.instructions();
        assert_eq!(instructions.len(), 3);
        // Compute budget discriminators: 2 = unit limit, 3 = unit price.
        assert_eq!(instructions[0].data.first(), Some(&2));
        assert_eq!(
            instructions[0].data[1..5],
            50_000u32.to_le_bytes()
        );
        assert_eq!(instructions[1].data.first(), Some(&3));
        assert_eq!(
            instructions[1].data[1..9],
            10_000u64.to_le_bytes()
        );
        assert!(tx.signatures.is_empty());
    }

    #[test]
    fn signing_fills_the_required_slot() {
        let (_, tx) = build_signed();
        assert!(is_fully_signed(&tx));
        assert_eq!(tx.signatures.len(), 1);
        assert_ne!(tx.signatures[0], Signature::default());
    }

    #[test]
    fn unsigned_transaction_is_not_fully_signed() {
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let tx = build_transfer(&params(&authority, &source, &destination, &mint)).unwrap();
        assert!(!is_fully_signed(&tx));
    }

    #[test]
    fn foreign_signer_is_rejected() {
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let tx = build_transfer(&params(&authority, &source, &destination, &mint)).unwrap();

        let stranger = Keypair::new();
        let err = sign_transaction(tx, &stranger).unwrap_err();
        assert!(matches!(err, CodecError::SignerNotRequired));
    }

    #[test]
    fn transaction_round_trips_byte_identically() {
        let (_, tx) = build_signed();
        let encoded = serialize_base64(&tx).unwrap();
        let decoded = deserialize_base64(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(serialize_base64(&decoded).unwrap(), encoded);
    }

    #[test]
    fn rejects_garbage_transaction_bytes() {
        let err = deserialize_base64("!!!").unwrap_err();
        assert!(matches!(err, MalformedPaymentError::Base64(_)));

        let valid_base64_garbage = encoding::encode(b"definitely not a transaction");
        let err = deserialize_base64(&valid_base64_garbage).unwrap_err();
        assert!(matches!(err, MalformedPaymentError::Transaction(_)));
    }

    #[test]
    fn payment_header_round_trips() {
        let (_, tx) = build_signed();
        let requirements = PaymentRequirements {
            scheme: Scheme::Exact,
            network: Network::SolanaDevnet,
            max_amount_required: TokenAmount::new(25_000),
            resource: "https://api.example.com/r".to_owned(),
            description: "r".to_owned(),
            mime_type: "application/json".to_owned(),
            output_schema: None,
            pay_to: Pubkey::new_unique().to_string(),
            max_timeout_seconds: 60,
            asset: Pubkey::new_unique().to_string(),
            extra: None,
        };

        let header_value = encode_payment_header(&tx, &requirements).unwrap();
        let (header, decoded) = decode_payment_header(&header_value).unwrap();
        assert_eq!(header.network, Network::SolanaDevnet);
        assert_eq!(header.scheme, Scheme::Exact);
        assert!(header.expect_answers(&requirements).is_ok());
        assert_eq!(decoded, tx);
    }
}
