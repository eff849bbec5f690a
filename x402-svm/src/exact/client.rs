//! Client half of the Solana schemes.
//!
//! Builds a single `TransferChecked` from the payer's ATA to the
//! recipient's, binds the latest blockhash, signs, and serializes the
//! versioned transaction as base64. When the requirements advertise a
//! facilitator fee payer (`extra.feePayer`), the message is built with
//! that account as the fee-paying first signer and only the client's
//! slot is signed; the facilitator co-signs its own slot at settlement.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_hash::Hash;
use solana_keypair::Keypair;
use solana_message::{Message, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

use x402::proto::v2::{PaymentPayload, PaymentRequirements, V2};
use x402::scheme::{ClientError, EXACT_SCHEME, SPLIT_SCHEME, SchemeClient};

use crate::chain::{DEFAULT_DECIMALS, SolanaChainReference, derive_ata};
use crate::exact::types::{SolanaPayload, SolanaPayloadExtra};

/// Reads the token decimals a requirement declares, defaulting to
/// [`DEFAULT_DECIMALS`].
#[must_use]
pub fn requirement_decimals(requirements: &PaymentRequirements) -> u8 {
    requirements
        .extra
        .as_ref()
        .and_then(|extra| extra.get("decimals"))
        .and_then(serde_json::Value::as_u64)
        .and_then(|decimals| u8::try_from(decimals).ok())
        .unwrap_or(DEFAULT_DECIMALS)
}

/// Reads the facilitator fee payer a requirement advertises under
/// `extra.feePayer`, as published through `GET /supported`.
#[must_use]
pub fn requirement_fee_payer(requirements: &PaymentRequirements) -> Option<Pubkey> {
    requirements
        .extra
        .as_ref()
        .and_then(|extra| extra.get("feePayer"))
        .and_then(serde_json::Value::as_str)
        .and_then(|fee_payer| fee_payer.parse().ok())
}

/// Builds and signs the transfer transaction. Pure given a blockhash.
///
/// With `fee_payer: None` (or the client itself) the transaction is
/// fully signed. With a foreign fee payer, the message carries two
/// required signers and only the client's slot is filled; the fee
/// payer's slot stays empty for settlement-time co-signing.
///
/// # Errors
///
/// Returns [`ClientError`] when instruction construction or signing
/// fails.
pub fn build_transfer_transaction(
    keypair: &Keypair,
    mint: &Pubkey,
    pay_to: &Pubkey,
    amount: u64,
    decimals: u8,
    fee_payer: Option<Pubkey>,
    blockhash: Hash,
) -> Result<(VersionedTransaction, SolanaPayloadExtra), ClientError> {
    let payer = keypair.pubkey();
    let fee_payer = fee_payer.unwrap_or(payer);
    let source_ata = derive_ata(&payer, mint, &spl_token::ID);
    let destination_ata = derive_ata(pay_to, mint, &spl_token::ID);

    let instruction = spl_token::instruction::transfer_checked(
        &spl_token::ID,
        &source_ata,
        mint,
        &destination_ata,
        &payer,
        &[],
        amount,
        decimals,
    )
    .map_err(|e| ClientError::Signing(e.to_string()))?;

    let message = Message::new_with_blockhash(&[instruction], Some(&fee_payer), &blockhash);
    let tx = if fee_payer == payer {
        VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[keypair])
            .map_err(|e| ClientError::Signing(e.to_string()))?
    } else {
        partially_sign(VersionedMessage::Legacy(message), keypair)
    };

    let extra = SolanaPayloadExtra {
        payer: payer.to_string(),
        amount: amount.to_string(),
        mint: mint.to_string(),
        source_ata: source_ata.to_string(),
        destination_ata: destination_ata.to_string(),
    };
    Ok((tx, extra))
}

/// Signs only the keypair's own slot of a multi-signer message, leaving
/// every other slot as the default (empty) signature.
fn partially_sign(message: VersionedMessage, keypair: &Keypair) -> VersionedTransaction {
    let required = usize::from(message.header().num_required_signatures);
    let message_bytes = message.serialize();
    let mut signatures = vec![Signature::default(); required];
    for (index, key) in message
        .static_account_keys()
        .iter()
        .take(required)
        .enumerate()
    {
        if *key == keypair.pubkey() {
            signatures[index] = keypair.sign_message(&message_bytes);
        }
    }
    VersionedTransaction {
        signatures,
        message,
    }
}

/// Client half of the Solana `exact` and `split` schemes.
pub struct SvmClient {
    keypair: Arc<Keypair>,
    rpc: Arc<RpcClient>,
    chain: SolanaChainReference,
    scheme: &'static str,
}

impl std::fmt::Debug for SvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvmClient")
            .field("chain", &self.chain)
            .field("pubkey", &self.keypair.pubkey())
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl SvmClient {
    /// Creates the `exact` client half.
    #[must_use]
    pub fn exact(keypair: Keypair, rpc_url: String, chain: SolanaChainReference) -> Self {
        Self {
            keypair: Arc::new(keypair),
            rpc: Arc::new(RpcClient::new(rpc_url)),
            chain,
            scheme: EXACT_SCHEME,
        }
    }

    /// Creates the `split` client half.
    #[must_use]
    pub fn split(keypair: Keypair, rpc_url: String, chain: SolanaChainReference) -> Self {
        Self {
            keypair: Arc::new(keypair),
            rpc: Arc::new(RpcClient::new(rpc_url)),
            chain,
            scheme: SPLIT_SCHEME,
        }
    }
}

#[async_trait]
impl SchemeClient for SvmClient {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn namespace(&self) -> &'static str {
        "solana"
    }

    async fn build_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, ClientError> {
        let chain = SolanaChainReference::try_from(&requirements.network)
            .map_err(|e| ClientError::InvalidRequirements(e.to_string()))?;
        if chain != self.chain {
            return Err(ClientError::InvalidRequirements(format!(
                "requirements are for {}, client is on {}",
                requirements.network,
                self.chain.as_chain_id(),
            )));
        }

        let mint: Pubkey = requirements
            .asset
            .parse()
            .map_err(|_| ClientError::InvalidRequirements("invalid SPL token mint".into()))?;
        let pay_to: Pubkey = requirements
            .pay_to
            .parse()
            .map_err(|_| ClientError::InvalidRequirements("invalid recipient address".into()))?;
        let amount: u64 = requirements
            .amount
            .parse()
            .map_err(|_| ClientError::InvalidRequirements("unparseable amount".into()))?;
        let decimals = requirement_decimals(requirements);
        let fee_payer = requirement_fee_payer(requirements);

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;

        let (tx, extra) = build_transfer_transaction(
            &self.keypair,
            &mint,
            &pay_to,
            amount,
            decimals,
            fee_payer,
            blockhash,
        )?;

        let bytes =
            bincode::serialize(&tx).map_err(|e| ClientError::Signing(e.to_string()))?;
        let payload = SolanaPayload {
            transaction: b64.encode(bytes),
            extra: Some(extra),
        };

        Ok(PaymentPayload {
            x402_version: V2,
            scheme: self.scheme.to_owned(),
            network: requirements.network.clone(),
            payload: serde_json::to_value(&payload)?,
        })
    }
}
