//! Facilitator half of the Stellar schemes.
//!
//! Verification runs the checks in a fixed order and rejects with the
//! first failing check's reason. The structural pass
//! ([`StellarCore::check_structure`]) is pure; simulation, fee, and
//! ledger-expiration checks then go to the RPC. Settlement rebuilds the
//! transaction with the facilitator as the fee-paying source, copies the
//! invocation and its auth entries verbatim, re-simulates, signs,
//! submits, and polls for confirmation.

use std::time::Duration;

use stellar_xdr::curr::{HostFunction, InvokeHostFunctionOp, SorobanCredentials, Transaction};

use x402::proto::v2::{PaymentPayload, PaymentRequirements};
use x402::proto::{SettleResponse, VerifyResponse};

use crate::address::{sc_address_to_string, sc_val_to_address, sc_val_to_i128};
use crate::auth::auth_signature_status;
use crate::chain::{
    DEFAULT_ESTIMATED_LEDGER_SECONDS, DEFAULT_MAX_FEE_STROOPS, DEFAULT_TIMEOUT_SECONDS,
    POLL_INTERVAL_SECONDS, StellarNetwork, max_ledger_for_timeout,
};
use crate::exact::types::ExactStellarPayload;
use crate::rpc::{RpcError, SorobanRpc, TransactionStatus};
use crate::signer::StellarKeypair;
use crate::tx;

/// A verification failure with the payer when already identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Machine-readable reason string.
    pub reason: String,
    /// The payer, if identified before the failing check.
    pub payer: Option<String>,
}

impl VerifyFailure {
    fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_owned(),
            payer: None,
        }
    }

    fn with_payer(reason: &str, payer: &str) -> Self {
        Self {
            reason: reason.to_owned(),
            payer: Some(payer.to_owned()),
        }
    }
}

impl From<VerifyFailure> for VerifyResponse {
    fn from(failure: VerifyFailure) -> Self {
        Self::invalid(failure.reason, failure.payer)
    }
}

/// A payload that passed the structural checks.
#[derive(Debug)]
pub struct StructuredTransfer {
    /// The decoded transaction.
    pub tx: Transaction,
    /// The single invocation operation.
    pub invocation: InvokeHostFunctionOp,
    /// The payer (`transfer`'s `from` argument).
    pub payer: String,
    /// The base64 XDR the client sent, as received.
    pub envelope_xdr: String,
    /// The classic fee the client put on its envelope.
    pub client_fee: u32,
}

/// Shared verify/settle machinery for the Stellar `exact` and `split`
/// schemes.
#[derive(Debug, Clone)]
pub struct StellarCore {
    pub(crate) keypair: StellarKeypair,
    pub(crate) network: StellarNetwork,
    pub(crate) rpc: SorobanRpc,
    pub(crate) max_fee_stroops: u32,
    pub(crate) are_fees_sponsored: bool,
}

impl StellarCore {
    /// Creates the core over a keypair, network, and RPC endpoint.
    #[must_use]
    pub const fn new(keypair: StellarKeypair, network: StellarNetwork, rpc: SorobanRpc) -> Self {
        Self {
            keypair,
            network,
            rpc,
            max_fee_stroops: DEFAULT_MAX_FEE_STROOPS,
            are_fees_sponsored: true,
        }
    }

    /// Overrides the sponsored-fee ceiling.
    #[must_use]
    pub const fn with_max_fee_stroops(mut self, max_fee_stroops: u32) -> Self {
        self.max_fee_stroops = max_fee_stroops;
        self
    }

    /// The facilitator's `G…` address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.keypair.public_key()
    }

    /// Runs the offline structural checks, in protocol order.
    ///
    /// # Errors
    ///
    /// Returns the first failing check's [`VerifyFailure`].
    pub fn check_structure(
        &self,
        scheme: &str,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<StructuredTransfer, VerifyFailure> {
        if payload.scheme != scheme || requirements.scheme != scheme {
            return Err(VerifyFailure::new("unsupported_scheme"));
        }
        if payload.network != requirements.network {
            return Err(VerifyFailure::new("invalid_network"));
        }
        let network = StellarNetwork::try_from(&payload.network)
            .map_err(|_| VerifyFailure::new("invalid_network"))?;
        if network != self.network {
            return Err(VerifyFailure::new("invalid_network"));
        }

        let stellar_payload = ExactStellarPayload::from_value(&payload.payload)
            .ok_or_else(|| VerifyFailure::new("invalid_stellar_payload_malformed"))?;
        let (transaction, _signatures) = tx::decode_envelope(&stellar_payload.transaction)
            .map_err(|_| VerifyFailure::new("invalid_stellar_payload_malformed"))?;

        let Some((operation, invocation)) = tx::single_invocation(&transaction) else {
            return Err(VerifyFailure::new("invalid_stellar_payload_wrong_operation"));
        };

        let facilitator = self.keypair.public_key();
        if tx::muxed_account_address(&transaction.source_account).as_deref() == Some(facilitator) {
            return Err(VerifyFailure::new("invalid_stellar_payload_unsafe_tx_source"));
        }
        if let Some(source) = &operation.source_account
            && tx::muxed_account_address(source).as_deref() == Some(facilitator)
        {
            return Err(VerifyFailure::new("invalid_stellar_payload_unsafe_op_source"));
        }

        let HostFunction::InvokeContract(invoke_args) = &invocation.host_function else {
            return Err(VerifyFailure::new("invalid_stellar_payload_wrong_operation"));
        };

        let contract_address = sc_address_to_string(&invoke_args.contract_address)
            .map_err(|_| VerifyFailure::new("invalid_stellar_payload_wrong_asset"))?;
        if contract_address != requirements.asset {
            return Err(VerifyFailure::new("invalid_stellar_payload_wrong_asset"));
        }

        let function_name = invoke_args.function_name.to_utf8_string_lossy();
        if function_name != "transfer" || invoke_args.args.len() != 3 {
            return Err(VerifyFailure::new("invalid_stellar_payload_wrong_function"));
        }

        let from = sc_val_to_address(&invoke_args.args[0]);
        let to = sc_val_to_address(&invoke_args.args[1]);
        let amount = sc_val_to_i128(&invoke_args.args[2]);
        let (Some(from), Some(to), Some(amount)) = (from, to, amount) else {
            return Err(VerifyFailure::new("invalid_stellar_payload_bad_args"));
        };

        if from == facilitator {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_facilitator_is_payer",
                &from,
            ));
        }
        if to != requirements.pay_to {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_wrong_recipient",
                &from,
            ));
        }

        let expected: i128 = requirements
            .amount
            .parse()
            .map_err(|_| VerifyFailure::with_payer("invalid_stellar_requirements", &from))?;
        if amount != expected {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_wrong_amount",
                &from,
            ));
        }

        Ok(StructuredTransfer {
            client_fee: transaction.fee,
            invocation: invocation.clone(),
            payer: from,
            envelope_xdr: stellar_payload.transaction,
            tx: transaction,
        })
    }

    /// Full verification: structure, re-simulation, fee bounds, auth
    /// entries, and signature expiration.
    ///
    /// # Errors
    ///
    /// Returns the first failing check's [`VerifyFailure`]; RPC faults
    /// surface as `simulation_failed` / `rpc_unavailable` failures
    /// rather than panics.
    pub async fn verify_payment(
        &self,
        scheme: &str,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<StructuredTransfer, VerifyFailure> {
        let structured = self.check_structure(scheme, payload, requirements)?;
        let payer = structured.payer.clone();

        let simulation = self
            .rpc
            .simulate_transaction(&structured.envelope_xdr)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "simulation rpc failed");
                VerifyFailure::with_payer("invalid_stellar_payload_simulation_failed", &payer)
            })?;
        if simulation.error.is_some() {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_simulation_failed",
                &payer,
            ));
        }

        let min_resource_fee = simulation.min_resource_fee_stroops();
        if structured.client_fee < min_resource_fee {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_fee_below_minimum",
                &payer,
            ));
        }
        if structured.client_fee > self.max_fee_stroops {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_fee_exceeds_maximum",
                &payer,
            ));
        }

        check_auth_entries(&structured.invocation, self.keypair.public_key(), &payer)?;

        let timeout = effective_timeout(requirements.max_timeout_seconds);
        let latest = self.rpc.get_latest_ledger().await.map_err(|e| {
            tracing::warn!(error = %e, "getLatestLedger failed");
            VerifyFailure::with_payer("rpc_unavailable", &payer)
        })?;
        let max_ledger =
            max_ledger_for_timeout(latest.sequence, timeout, DEFAULT_ESTIMATED_LEDGER_SECONDS);
        check_auth_expiration(&structured.invocation, max_ledger, &payer)?;

        Ok(structured)
    }

    /// Rebuilds, signs, submits, and confirms a verified payment.
    ///
    /// The returned response always carries the transaction hash once
    /// `sendTransaction` was issued, so abandoned polls can be
    /// reconciled later.
    pub async fn settle_payment(
        &self,
        structured: &StructuredTransfer,
        requirements: &PaymentRequirements,
    ) -> SettleResponse {
        let network = requirements.network.to_string();
        let payer = structured.payer.clone();

        let failed = |hash: &str, reason: String| {
            SettleResponse::failed(hash, network.clone(), payer.clone(), reason)
        };

        let sequence = match self
            .rpc
            .load_account_sequence(self.keypair.public_key())
            .await
        {
            Ok(sequence) => sequence,
            Err(e) => return failed("", format!("facilitator_account_unavailable: {e}")),
        };

        let fee = structured.client_fee.min(self.max_fee_stroops);
        let timeout = effective_timeout(requirements.max_timeout_seconds);
        let now = x402::proto::UnixTimestamp::now().as_secs();
        let mut rebuilt = tx::build_invoke_transaction(
            self.keypair.raw_public_key(),
            sequence + 1,
            fee,
            now + timeout,
            structured.invocation.clone(),
        );

        let unsigned_xdr = match tx::encode_envelope(rebuilt.clone(), Vec::new()) {
            Ok(xdr) => xdr,
            Err(e) => return failed("", format!("encode_failed: {e}")),
        };
        let simulation = match self.rpc.simulate_transaction(&unsigned_xdr).await {
            Ok(simulation) => simulation,
            Err(e) => return failed("", format!("simulation_failed: {e}")),
        };
        if let Some(error) = simulation.error {
            return failed("", format!("simulation_failed: {error}"));
        }

        if let Err(e) = prepare_transaction(&mut rebuilt, &simulation) {
            return failed("", format!("prepare_failed: {e}"));
        }

        let signature = match tx::sign_transaction(&rebuilt, &self.keypair, self.network.network_id())
        {
            Ok(signature) => signature,
            Err(e) => return failed("", format!("signing_failed: {e}")),
        };
        let signed_xdr = match tx::encode_envelope(rebuilt, vec![signature]) {
            Ok(xdr) => xdr,
            Err(e) => return failed("", format!("encode_failed: {e}")),
        };

        let submission = match self.rpc.send_transaction(&signed_xdr).await {
            Ok(submission) => submission,
            Err(e) => return failed("", format!("submission_failed: {e}")),
        };
        if submission.status != "PENDING" {
            return failed("", format!("submission_failed: {}", submission.status));
        }
        let hash = submission.hash;
        tracing::info!(tx = %hash, "stellar settlement submitted");

        // Once sendTransaction is out, the transaction is in flight:
        // every path below reports the hash.
        let max_polls = timeout / POLL_INTERVAL_SECONDS;
        for _ in 0..max_polls {
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECONDS)).await;
            match self.rpc.get_transaction(&hash).await {
                Ok(result) => match result.status {
                    TransactionStatus::Success => {
                        tracing::info!(tx = %hash, "stellar settlement confirmed");
                        return SettleResponse::settled(hash, network.clone(), payer.clone());
                    }
                    TransactionStatus::Failed => {
                        return failed(&hash, "transaction_failed_onchain".into());
                    }
                    TransactionStatus::NotFound => {}
                },
                Err(RpcError::Node { .. }) | Err(RpcError::UnexpectedResponse(_)) => {}
                Err(e) => {
                    tracing::warn!(error = %e, tx = %hash, "confirmation poll failed");
                }
            }
        }
        failed(&hash, "transaction_timed_out".into())
    }
}

/// Checks the auth-entry signer sets of an invocation.
///
/// Every address credential with a non-void signature is
/// *already signed*; a void signature is *pending*. The payer must be in
/// the signed set, the facilitator in neither, and nothing may still be
/// pending.
///
/// # Errors
///
/// Returns the matching `invalid_stellar_payload_*` [`VerifyFailure`].
pub fn check_auth_entries(
    invocation: &InvokeHostFunctionOp,
    facilitator: &str,
    payer: &str,
) -> Result<(), VerifyFailure> {
    let status = auth_signature_status(invocation);
    if status.contains(facilitator) {
        return Err(VerifyFailure::with_payer(
            "invalid_stellar_payload_facilitator_in_auth",
            payer,
        ));
    }
    if !status.already_signed.iter().any(|a| a == payer) {
        return Err(VerifyFailure::with_payer(
            "invalid_stellar_payload_missing_signature",
            payer,
        ));
    }
    if !status.pending_signature.is_empty() {
        return Err(VerifyFailure::with_payer(
            "invalid_stellar_payload_missing_signatures",
            payer,
        ));
    }
    Ok(())
}

/// Checks that no address credential expires beyond `max_ledger`.
///
/// # Errors
///
/// Returns `invalid_stellar_payload_auth_expired` on violation.
pub fn check_auth_expiration(
    invocation: &InvokeHostFunctionOp,
    max_ledger: u32,
    payer: &str,
) -> Result<(), VerifyFailure> {
    for entry in invocation.auth.iter() {
        if let SorobanCredentials::Address(credentials) = &entry.credentials
            && credentials.signature_expiration_ledger > max_ledger
        {
            return Err(VerifyFailure::with_payer(
                "invalid_stellar_payload_auth_expired",
                payer,
            ));
        }
    }
    Ok(())
}

/// Applies simulation results to a transaction before submission: the
/// Soroban resource footprint and the resource fee on top of the classic
/// fee. Auth entries are NOT replaced; the client's signed entries ride
/// along verbatim.
fn prepare_transaction(
    tx: &mut Transaction,
    simulation: &crate::rpc::SimulateTransactionResponse,
) -> Result<(), stellar_xdr::curr::Error> {
    use stellar_xdr::curr::{Limits, ReadXdr, SorobanTransactionData, TransactionExt};

    if let Some(data_b64) = &simulation.transaction_data {
        let data = SorobanTransactionData::from_xdr_base64(data_b64, Limits::none())?;
        tx.ext = TransactionExt::V1(data);
    }
    tx.fee = tx.fee.saturating_add(simulation.min_resource_fee_stroops());
    Ok(())
}

fn effective_timeout(max_timeout_seconds: u64) -> u64 {
    if max_timeout_seconds == 0 {
        DEFAULT_TIMEOUT_SECONDS
    } else {
        max_timeout_seconds
    }
}

/// Facilitator for the Stellar `exact` scheme.
#[derive(Debug)]
pub struct StellarExactFacilitator {
    core: StellarCore,
}

impl StellarExactFacilitator {
    /// Creates the facilitator over a [`StellarCore`].
    #[must_use]
    pub const fn new(core: StellarCore) -> Self {
        Self { core }
    }

    /// The shared core (used by the split facilitator too).
    #[must_use]
    pub const fn core(&self) -> &StellarCore {
        &self.core
    }
}

#[async_trait::async_trait]
impl x402::scheme::SchemeFacilitator for StellarExactFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, x402::facilitator::FacilitatorError> {
        match self
            .core
            .verify_payment(x402::scheme::EXACT_SCHEME, payload, requirements)
            .await
        {
            Ok(structured) => Ok(VerifyResponse::valid(structured.payer)),
            Err(failure) => Ok(failure.into()),
        }
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, x402::facilitator::FacilitatorError> {
        match self
            .core
            .verify_payment(x402::scheme::EXACT_SCHEME, payload, requirements)
            .await
        {
            Ok(structured) => Ok(self.core.settle_payment(&structured, requirements).await),
            Err(failure) => Ok(SettleResponse::failed(
                "",
                requirements.network.to_string(),
                failure.payer.unwrap_or_default(),
                failure.reason,
            )),
        }
    }

    fn signers(&self) -> Vec<String> {
        vec![self.core.keypair.public_key().to_owned()]
    }

    fn extra(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "areFeesSponsored": self.core.are_fees_sponsored,
        }))
    }
}
