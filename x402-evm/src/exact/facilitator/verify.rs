//! Verification for EVM payments.
//!
//! Verification is deterministic and side-effect-free for EOA
//! signatures: every check runs locally against the payload and
//! requirements. Contract-wallet signatures (EIP-1271 and EIP-6492) are
//! the one exception, validated read-only through the universal
//! validator contract so that even a not-yet-deployed wallet can pass.

use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use x402::proto::UnixTimestamp;
use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::split::SplitConfig;

use super::contract::{VALIDATOR_ADDRESS, Validator6492};
use super::signature::StructuredSignature;
use crate::chain::Eip155ChainReference;
use crate::exact::types::{self, Eip3009Payload, TransferWithAuthorization};

/// Grace period applied to both ends of the validity window to tolerate
/// clock drift between signer, facilitator, and chain.
pub const CLOCK_SKEW_SECONDS: u64 = 15;

/// How the authorized value must relate to the required amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRule {
    /// `value == amount`; over- and underpayment both rejected.
    Exact,
    /// `value >= amount`; the escrow receives the entire value.
    AtLeast,
}

/// A verification failure: machine-readable reason plus the payer when it
/// was identified before the failing check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Machine-readable reason string.
    pub reason: String,
    /// The payer, if identified.
    pub payer: Option<String>,
}

impl VerifyFailure {
    pub(crate) fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_owned(),
            payer: None,
        }
    }

    pub(crate) fn with_payer(reason: &str, payer: Address) -> Self {
        Self {
            reason: reason.to_owned(),
            payer: Some(payer.to_string()),
        }
    }
}

/// A payload that passed every offline check; the signature still awaits
/// (possibly on-chain) validation.
#[derive(Debug)]
pub struct CheckedPayment {
    /// The decoded EIP-3009 payload.
    pub payload: Eip3009Payload,
    /// The EIP-712 domain the authorization binds to.
    pub domain: Eip712Domain,
    /// The EIP-712 signing hash of the authorization.
    pub hash: alloy_primitives::B256,
    /// The classified signature.
    pub signature: StructuredSignature,
    /// The narrowed requirements.
    pub requirements: types::v2::PaymentRequirements,
}

/// Runs every offline check of the EVM mechanisms.
///
/// Order: scheme, network, payload decode, requirements narrowing,
/// amount rule, recipient, validity window, split recipients (for the
/// `split` scheme), signature classification. The amount check precedes
/// the recipient check, so a payload failing both reports the amount
/// reason.
///
/// # Errors
///
/// Returns the first [`VerifyFailure`] encountered.
pub fn check_payment(
    scheme: &str,
    chain: Eip155ChainReference,
    amount_rule: AmountRule,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> Result<CheckedPayment, VerifyFailure> {
    if payload.scheme != scheme || requirements.scheme != scheme {
        return Err(VerifyFailure::new("unsupported_scheme"));
    }
    if payload.network != requirements.network || payload.network != chain.as_chain_id() {
        return Err(VerifyFailure::new("invalid_network"));
    }

    let eip3009: Eip3009Payload = payload
        .decode_payload()
        .map_err(|_| VerifyFailure::new("invalid_evm_payload_malformed"))?;
    let payer = eip3009.authorization.from;

    let concrete: types::v2::PaymentRequirements = requirements
        .as_concrete()
        .ok_or_else(|| VerifyFailure::with_payer("invalid_evm_requirements", payer))?;

    let value: U256 = eip3009.authorization.value.into();
    let required: U256 = concrete.amount.into();
    let amount_ok = match amount_rule {
        AmountRule::Exact => value == required,
        AmountRule::AtLeast => value >= required,
    };
    if !amount_ok {
        let reason = if value < required {
            "invalid_evm_payload_amount_insufficient"
        } else {
            "invalid_evm_payload_amount_mismatch"
        };
        return Err(VerifyFailure::with_payer(reason, payer));
    }

    if eip3009.authorization.to != concrete.pay_to {
        return Err(VerifyFailure::with_payer(
            "invalid_evm_payload_recipient_mismatch",
            payer,
        ));
    }

    let now = UnixTimestamp::now();
    if eip3009.authorization.valid_before < now + CLOCK_SKEW_SECONDS {
        return Err(VerifyFailure::with_payer("invalid_evm_payload_expired", payer));
    }
    if eip3009.authorization.valid_after > now + CLOCK_SKEW_SECONDS {
        return Err(VerifyFailure::with_payer("invalid_evm_payload_early", payer));
    }

    if scheme == x402::scheme::SPLIT_SCHEME {
        let config = SplitConfig::from_extra(requirements.extra.as_ref())
            .ok_or_else(|| VerifyFailure::with_payer("invalid_split_config", payer))?;
        if config.validate().is_err() {
            return Err(VerifyFailure::with_payer("invalid_split_config", payer));
        }
    }

    let (name, version) = concrete.extra.as_ref().map_or_else(
        || (String::new(), String::new()),
        |extra| (extra.name.clone(), extra.version.clone()),
    );
    let domain = eip712_domain! {
        name: name,
        version: version,
        chain_id: chain.inner(),
        verifying_contract: concrete.asset,
    };

    let message = TransferWithAuthorization {
        from: eip3009.authorization.from,
        to: eip3009.authorization.to,
        value,
        validAfter: U256::from(eip3009.authorization.valid_after.as_secs()),
        validBefore: U256::from(eip3009.authorization.valid_before.as_secs()),
        nonce: eip3009.authorization.nonce,
    };
    let hash = message.eip712_signing_hash(&domain);

    let signature = StructuredSignature::classify(eip3009.signature.clone(), payer, &hash)
        .map_err(|_| VerifyFailure::with_payer("invalid_evm_signature", payer))?;

    Ok(CheckedPayment {
        payload: eip3009,
        domain,
        hash,
        signature,
        requirements: concrete,
    })
}

/// Completes signature verification for a [`CheckedPayment`].
///
/// EOA signatures were already recovered during classification. Contract
/// signatures go to the universal validator via `eth_call`, covering both
/// deployed EIP-1271 wallets and EIP-6492 counterfactual wallets.
///
/// # Errors
///
/// Returns a [`VerifyFailure`] when the chain reports the signature
/// invalid or the validator call cannot be made.
pub async fn verify_signature<P: Provider>(
    provider: &P,
    checked: &CheckedPayment,
) -> Result<Address, VerifyFailure> {
    let payer = checked.payload.authorization.from;
    let bytes = match &checked.signature {
        StructuredSignature::Eoa(_) => return Ok(payer),
        StructuredSignature::Eip6492 { original, .. } => original.clone(),
        StructuredSignature::Eip1271(bytes) => bytes.clone(),
    };

    let validator = Validator6492::new(VALIDATOR_ADDRESS, provider);
    let is_valid = validator
        .isValidSig(payer, checked.hash, bytes)
        .call()
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "universal validator call failed");
            VerifyFailure::with_payer("invalid_evm_signature", payer)
        })?;

    if is_valid {
        Ok(payer)
    } else {
        Err(VerifyFailure::with_payer("invalid_evm_signature", payer))
    }
}
