//! Facilitator half of the Solana schemes.
//!
//! Verification is fully offline: the transaction is decoded and its
//! single `TransferChecked` instruction checked against the
//! requirements. Settlement binds a fresh recent blockhash, co-signs the
//! facilitator's fee-payer slot, and submits with a bounded confirmation
//! wait.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

use x402::facilitator::FacilitatorError;
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, VerifyResponse};
use x402::scheme::{EXACT_SCHEME, SPLIT_SCHEME, SchemeFacilitator};
use x402::split::SplitConfig;

use crate::chain::{CONFIRM_TIMEOUT_SECONDS, SolanaChainReference, SolanaProvider, derive_ata};
use crate::exact::types::SolanaPayload;

/// How the transferred amount must relate to the required amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRule {
    /// `amount == required`.
    Exact,
    /// `amount >= required`; the escrow keeps any excess.
    AtLeast,
}

/// A verification failure with the payer when already identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Machine-readable reason string.
    pub reason: String,
    /// The payer, if identified.
    pub payer: Option<String>,
}

impl VerifyFailure {
    fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_owned(),
            payer: None,
        }
    }

    fn with_payer(reason: &str, payer: Pubkey) -> Self {
        Self {
            reason: reason.to_owned(),
            payer: Some(payer.to_string()),
        }
    }
}

/// The fields of a decoded `TransferChecked` instruction, plus the
/// transaction's fee payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCheckedInfo {
    /// Transfer amount in token atomic units.
    pub amount: u64,
    /// Token decimals as asserted by the instruction.
    pub decimals: u8,
    /// Source token account.
    pub source: Pubkey,
    /// Token mint.
    pub mint: Pubkey,
    /// Destination token account.
    pub destination: Pubkey,
    /// Transfer authority: the payer.
    pub authority: Pubkey,
    /// The token program (Token or Token-2022).
    pub token_program: Pubkey,
    /// The transaction fee payer (first required signer).
    pub fee_payer: Pubkey,
}

/// Decodes the base64 bincode transaction of a payload.
///
/// # Errors
///
/// Returns `invalid_svm_payload_malformed` on any decoding failure.
pub fn decode_transaction(transaction_b64: &str) -> Result<VersionedTransaction, VerifyFailure> {
    let bytes = b64
        .decode(transaction_b64)
        .map_err(|_| VerifyFailure::new("invalid_svm_payload_malformed"))?;
    bincode::deserialize(&bytes).map_err(|_| VerifyFailure::new("invalid_svm_payload_malformed"))
}

/// Finds the single `TransferChecked` instruction of a transaction.
///
/// # Errors
///
/// `no_transfer_instruction_found` when there is none,
/// `multiple_transfer_instructions` when there are several, and
/// `invalid_token_instruction` when account indices are out of range.
pub fn extract_transfer(tx: &VersionedTransaction) -> Result<TransferCheckedInfo, VerifyFailure> {
    let account_keys = tx.message.static_account_keys();
    let fee_payer = *account_keys
        .first()
        .ok_or_else(|| VerifyFailure::new("invalid_svm_payload_malformed"))?;

    let mut found: Option<TransferCheckedInfo> = None;
    for instruction in tx.message.instructions() {
        let program_id = *instruction.program_id(account_keys);
        let is_token_program = program_id == spl_token::ID || program_id == spl_token_2022::ID;
        if !is_token_program {
            continue;
        }

        let (amount, decimals) = if program_id == spl_token::ID {
            match spl_token::instruction::TokenInstruction::unpack(&instruction.data) {
                Ok(spl_token::instruction::TokenInstruction::TransferChecked {
                    amount,
                    decimals,
                }) => (amount, decimals),
                _ => continue,
            }
        } else {
            match spl_token_2022::instruction::TokenInstruction::unpack(&instruction.data) {
                Ok(spl_token_2022::instruction::TokenInstruction::TransferChecked {
                    amount,
                    decimals,
                }) => (amount, decimals),
                _ => continue,
            }
        };

        let account = |position: usize| -> Result<Pubkey, VerifyFailure> {
            let index = *instruction
                .accounts
                .get(position)
                .ok_or_else(|| VerifyFailure::new("invalid_token_instruction"))?;
            account_keys
                .get(usize::from(index))
                .copied()
                .ok_or_else(|| VerifyFailure::new("invalid_token_instruction"))
        };

        let info = TransferCheckedInfo {
            amount,
            decimals,
            source: account(0)?,
            mint: account(1)?,
            destination: account(2)?,
            authority: account(3)?,
            token_program: program_id,
            fee_payer,
        };
        if found.is_some() {
            return Err(VerifyFailure::new("multiple_transfer_instructions"));
        }
        found = Some(info);
    }

    found.ok_or_else(|| VerifyFailure::new("no_transfer_instruction_found"))
}

/// Runs every check of the Solana mechanisms. Entirely offline.
///
/// # Errors
///
/// Returns the first failing check's [`VerifyFailure`].
pub fn check_payment(
    scheme: &str,
    chain: &SolanaChainReference,
    amount_rule: AmountRule,
    facilitator: &Pubkey,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> Result<(VersionedTransaction, TransferCheckedInfo), VerifyFailure> {
    if payload.scheme != scheme || requirements.scheme != scheme {
        return Err(VerifyFailure::new("unsupported_scheme"));
    }
    if payload.network != requirements.network || payload.network != chain.as_chain_id() {
        return Err(VerifyFailure::new("invalid_network"));
    }

    if scheme == SPLIT_SCHEME {
        let config = SplitConfig::from_extra(requirements.extra.as_ref())
            .ok_or_else(|| VerifyFailure::new("invalid_split_config"))?;
        if config.validate().is_err() {
            return Err(VerifyFailure::new("invalid_split_config"));
        }
        for recipient in &config.recipients {
            if recipient.address.parse::<Pubkey>().is_err() {
                return Err(VerifyFailure::new("invalid_recipient_address"));
            }
        }
    }

    let solana_payload: SolanaPayload = payload
        .decode_payload()
        .map_err(|_| VerifyFailure::new("invalid_svm_payload_malformed"))?;
    let tx = decode_transaction(&solana_payload.transaction)?;
    let info = extract_transfer(&tx)?;

    let expected_mint: Pubkey = requirements
        .asset
        .parse()
        .map_err(|_| VerifyFailure::new("invalid_svm_requirements"))?;
    let pay_to: Pubkey = requirements
        .pay_to
        .parse()
        .map_err(|_| VerifyFailure::new("invalid_svm_requirements"))?;
    let required: u64 = requirements
        .amount
        .parse()
        .map_err(|_| VerifyFailure::new("invalid_svm_requirements"))?;

    if info.mint != expected_mint {
        return Err(VerifyFailure::with_payer("mint_mismatch", info.authority));
    }

    let expected_destination = derive_ata(&pay_to, &expected_mint, &info.token_program);
    if info.destination != expected_destination {
        return Err(VerifyFailure::with_payer(
            "recipient_mismatch",
            info.authority,
        ));
    }

    let amount_ok = match amount_rule {
        AmountRule::Exact => info.amount == required,
        AmountRule::AtLeast => info.amount >= required,
    };
    if !amount_ok {
        let reason = if info.amount < required {
            "amount_insufficient"
        } else {
            "amount_mismatch"
        };
        return Err(VerifyFailure::with_payer(reason, info.authority));
    }

    if info.authority == *facilitator {
        return Err(VerifyFailure::with_payer(
            "facilitator_is_payer",
            info.authority,
        ));
    }
    // The facilitator may appear as fee payer (it co-signs that slot at
    // settlement) but must never hold an account slot of the transfer
    // instruction itself, i.e. it only pays fees and never moves funds.
    let instruction_accounts = [info.source, info.mint, info.destination, info.authority];
    if instruction_accounts.contains(facilitator) {
        return Err(VerifyFailure::with_payer(
            "facilitator_in_transfer_accounts",
            info.authority,
        ));
    }

    Ok((tx, info))
}

/// A settlement failure with the transaction signature when known.
#[derive(Debug)]
pub struct SettleFailure {
    /// Machine-readable reason string.
    pub reason: String,
    /// The transaction signature, if submission was attempted.
    pub transaction: Option<String>,
}

/// Binds a fresh recent blockhash, fills the provider's signature
/// slots, submits, and waits for confirmation within the budget.
///
/// # Errors
///
/// Returns [`SettleFailure`]; once submission was attempted the failure
/// carries the transaction signature for reconciliation.
pub async fn settle_transaction(
    provider: &SolanaProvider,
    mut tx: VersionedTransaction,
) -> Result<String, SettleFailure> {
    let our_key = provider.pubkey();
    let required = usize::from(tx.message.header().num_required_signatures);
    let signer_keys: Vec<Pubkey> = tx
        .message
        .static_account_keys()
        .iter()
        .take(required)
        .copied()
        .collect();

    // Co-signing happens against a fresh blockhash so the payment's
    // lifetime is bounded by settlement time, not build time.
    if signer_keys.contains(&our_key) {
        let blockhash = provider.rpc().get_latest_blockhash().await.map_err(|e| {
            SettleFailure {
                reason: format!("blockhash_fetch_failed: {e}"),
                transaction: None,
            }
        })?;
        tx.message.set_recent_blockhash(blockhash);
    }

    let message_bytes = tx.message.serialize();
    for (index, key) in signer_keys.iter().enumerate() {
        if *key == our_key && tx.signatures[index] == Signature::default() {
            tx.signatures[index] = provider.keypair().sign_message(&message_bytes);
        }
    }

    if tx.signatures.iter().any(|s| *s == Signature::default()) {
        return Err(SettleFailure {
            reason: "undersigned_transaction".into(),
            transaction: None,
        });
    }

    let signature = tx.signatures[0].to_string();
    let submission = tokio::time::timeout(
        Duration::from_secs(CONFIRM_TIMEOUT_SECONDS),
        provider.rpc().send_and_confirm_transaction(&tx),
    )
    .await;

    match submission {
        Ok(Ok(confirmed)) => {
            tracing::info!(tx = %confirmed, "solana settlement confirmed");
            Ok(confirmed.to_string())
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, tx = %signature, "solana submission failed");
            Err(SettleFailure {
                reason: format!("submission_failed: {e}"),
                transaction: Some(signature),
            })
        }
        Err(_) => Err(SettleFailure {
            reason: "confirmation_timeout".into(),
            transaction: Some(signature),
        }),
    }
}

/// Facilitator for the Solana `exact` scheme.
#[derive(Debug)]
pub struct SvmExactFacilitator {
    provider: SolanaProvider,
}

impl SvmExactFacilitator {
    /// Creates the facilitator over a provider.
    #[must_use]
    pub const fn new(provider: SolanaProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SchemeFacilitator for SvmExactFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        match check_payment(
            EXACT_SCHEME,
            self.provider.chain(),
            AmountRule::Exact,
            &self.provider.pubkey(),
            payload,
            requirements,
        ) {
            Ok((_, info)) => Ok(VerifyResponse::valid(info.authority.to_string())),
            Err(failure) => Ok(VerifyResponse::invalid(failure.reason, failure.payer)),
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let network = requirements.network.to_string();
        let (tx, info) = match check_payment(
            EXACT_SCHEME,
            self.provider.chain(),
            AmountRule::Exact,
            &self.provider.pubkey(),
            payload,
            requirements,
        ) {
            Ok(checked) => checked,
            Err(failure) => {
                return Ok(SettleResponse::failed(
                    "",
                    network,
                    failure.payer.unwrap_or_default(),
                    failure.reason,
                ));
            }
        };
        let payer = info.authority.to_string();
        match settle_transaction(&self.provider, tx).await {
            Ok(signature) => Ok(SettleResponse::settled(signature, network, payer)),
            Err(failure) => Ok(SettleResponse::failed(
                failure.transaction.unwrap_or_default(),
                network,
                payer,
                failure.reason,
            )),
        }
    }

    fn signers(&self) -> Vec<String> {
        vec![self.provider.pubkey().to_string()]
    }

    fn extra(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "feePayer": self.provider.pubkey().to_string(),
        }))
    }
}
