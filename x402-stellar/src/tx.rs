//! Transaction envelope helpers shared by the Stellar mechanisms.

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    DecoratedSignature, InvokeHostFunctionOp, Limits, Memo, MuxedAccount, Operation,
    OperationBody, Preconditions, ReadXdr, SequenceNumber, Signature, SignatureHint, TimeBounds,
    TimePoint, Transaction, TransactionEnvelope, TransactionExt, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, TransactionV1Envelope, Uint256, WriteXdr,
};

use crate::signer::StellarKeypair;

/// Errors assembling or encoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// XDR encoding/decoding failed.
    #[error("xdr error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),
    /// The envelope is not a V1 transaction envelope.
    #[error("unsupported envelope type")]
    UnsupportedEnvelope,
}

/// Decodes a base64 XDR envelope into its transaction and signatures.
///
/// Only V1 (`ENVELOPE_TYPE_TX`) envelopes are accepted; legacy V0 and
/// fee-bump envelopes never occur in this protocol.
///
/// # Errors
///
/// Returns [`TxError`] for malformed XDR or other envelope kinds.
pub fn decode_envelope(b64: &str) -> Result<(Transaction, Vec<DecoratedSignature>), TxError> {
    match TransactionEnvelope::from_xdr_base64(b64, Limits::none())? {
        TransactionEnvelope::Tx(TransactionV1Envelope { tx, signatures }) => {
            Ok((tx, signatures.into()))
        }
        _ => Err(TxError::UnsupportedEnvelope),
    }
}

/// Encodes a transaction and its signatures as a base64 XDR envelope.
///
/// # Errors
///
/// Returns [`TxError`] if encoding fails (e.g. too many signatures).
pub fn encode_envelope(
    tx: Transaction,
    signatures: Vec<DecoratedSignature>,
) -> Result<String, TxError> {
    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: signatures.try_into()?,
    });
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

/// Renders a transaction or operation source as its `G…` address.
///
/// Muxed (`M…`) sources resolve to the underlying ed25519 account, which
/// is what the facilitator-safety comparison cares about.
#[must_use]
pub fn muxed_account_address(account: &MuxedAccount) -> Option<String> {
    let ed25519 = match account {
        MuxedAccount::Ed25519(Uint256(bytes)) => *bytes,
        MuxedAccount::MuxedEd25519(inner) => inner.ed25519.0,
    };
    Some(stellar_strkey::ed25519::PublicKey(ed25519).to_string())
}

/// Builds a single-operation Soroban invocation transaction.
#[must_use]
pub fn build_invoke_transaction(
    source: [u8; 32],
    sequence: i64,
    fee: u32,
    max_time: u64,
    invocation: InvokeHostFunctionOp,
) -> Transaction {
    let operation = Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(invocation),
    };
    Transaction {
        source_account: MuxedAccount::Ed25519(Uint256(source)),
        fee,
        seq_num: SequenceNumber(sequence),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(max_time),
        }),
        memo: Memo::None,
        operations: vec![operation]
            .try_into()
            .unwrap_or_default(),
        ext: TransactionExt::V0,
    }
}

/// Signs the transaction's signature base with the keypair.
///
/// # Errors
///
/// Returns [`TxError`] if encoding the signature payload fails.
pub fn sign_transaction(
    tx: &Transaction,
    keypair: &StellarKeypair,
    network_id: [u8; 32],
) -> Result<DecoratedSignature, TxError> {
    let payload = TransactionSignaturePayload {
        network_id: stellar_xdr::curr::Hash(network_id),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    let bytes = payload.to_xdr(Limits::none())?;
    let digest: [u8; 32] = Sha256::digest(&bytes).into();
    let signature = keypair.sign(&digest);
    Ok(DecoratedSignature {
        hint: SignatureHint(keypair.hint()),
        signature: Signature(signature.to_vec().try_into()?),
    })
}

/// Returns the single `InvokeHostFunction` operation of a transaction,
/// or `None` when the shape is anything else.
#[must_use]
pub fn single_invocation(tx: &Transaction) -> Option<(&Operation, &InvokeHostFunctionOp)> {
    if tx.operations.len() != 1 {
        return None;
    }
    let operation = tx.operations.first()?;
    match &operation.body {
        OperationBody::InvokeHostFunction(invocation) => Some((operation, invocation)),
        _ => None,
    }
}
