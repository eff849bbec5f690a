//! Client half of the Stellar schemes.
//!
//! Builds a `transfer(from, to, amount)` invocation on the asset
//! contract, simulates it to obtain auth entries and the resource
//! footprint, signs the client's auth entry and the envelope, and emits
//! the base64 XDR payload.

use async_trait::async_trait;
use stellar_xdr::curr::{
    HostFunction, InvokeContractArgs, InvokeHostFunctionOp, Limits, ReadXdr, ScSymbol, ScVal,
    SorobanAuthorizationEntry, SorobanCredentials,
};

use x402::proto::UnixTimestamp;
use x402::proto::v2::{PaymentPayload, PaymentRequirements, V2};
use x402::scheme::{ClientError, EXACT_SCHEME, SPLIT_SCHEME, SchemeClient};

use crate::address::{i128_to_sc_val, sc_address_from_string, sc_address_to_string};
use crate::auth::sign_auth_entry;
use crate::chain::{
    DEFAULT_BASE_FEE_STROOPS, DEFAULT_TIMEOUT_SECONDS, LEDGER_SAMPLE_SIZE, StellarNetwork,
    is_valid_asset_address, is_valid_destination_address, max_ledger_for_timeout,
};
use crate::exact::types::ExactStellarPayload;
use crate::rpc::SorobanRpc;
use crate::signer::StellarKeypair;
use crate::tx;

/// Client half of the Stellar `exact` and `split` schemes.
///
/// A split payment is built identically to an exact one: the whole
/// amount goes to the escrow address, and distribution is the
/// facilitator's business.
#[derive(Debug)]
pub struct StellarClient {
    keypair: StellarKeypair,
    network: StellarNetwork,
    rpc: SorobanRpc,
    scheme: &'static str,
}

impl StellarClient {
    /// Creates the `exact` client half.
    #[must_use]
    pub const fn exact(keypair: StellarKeypair, network: StellarNetwork, rpc: SorobanRpc) -> Self {
        Self {
            keypair,
            network,
            rpc,
            scheme: EXACT_SCHEME,
        }
    }

    /// Creates the `split` client half.
    #[must_use]
    pub const fn split(keypair: StellarKeypair, network: StellarNetwork, rpc: SorobanRpc) -> Self {
        Self {
            keypair,
            network,
            rpc,
            scheme: SPLIT_SCHEME,
        }
    }

    /// The client's `G…` address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.keypair.public_key()
    }
}

#[async_trait]
impl SchemeClient for StellarClient {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn namespace(&self) -> &'static str {
        "stellar"
    }

    async fn build_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, ClientError> {
        let network = StellarNetwork::try_from(&requirements.network)
            .map_err(|e| ClientError::InvalidRequirements(e.to_string()))?;
        if network != self.network {
            return Err(ClientError::InvalidRequirements(format!(
                "requirements are for {}, client is on {}",
                requirements.network,
                self.network.as_chain_id(),
            )));
        }
        if !is_valid_asset_address(&requirements.asset) {
            return Err(ClientError::InvalidRequirements(format!(
                "invalid stellar asset address: {}",
                requirements.asset
            )));
        }
        if !is_valid_destination_address(&requirements.pay_to) {
            return Err(ClientError::InvalidRequirements(format!(
                "invalid stellar destination: {}",
                requirements.pay_to
            )));
        }
        let sponsored = requirements
            .extra
            .as_ref()
            .and_then(|extra| extra.get("areFeesSponsored"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !sponsored {
            return Err(ClientError::InvalidRequirements(
                "stellar schemes require extra.areFeesSponsored".into(),
            ));
        }
        let amount: i128 = requirements
            .amount
            .parse()
            .map_err(|_| ClientError::InvalidRequirements("unparseable amount".into()))?;

        let timeout = if requirements.max_timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            requirements.max_timeout_seconds
        };

        let latest = self
            .rpc
            .get_latest_ledger()
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;
        let ledger_seconds = self.rpc.estimated_ledger_seconds(LEDGER_SAMPLE_SIZE).await;
        let expiration_ledger = max_ledger_for_timeout(latest.sequence, timeout, ledger_seconds);

        let sequence = self
            .rpc
            .load_account_sequence(self.keypair.public_key())
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;

        let invocation = InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(InvokeContractArgs {
                contract_address: sc_address_from_string(&requirements.asset)
                    .map_err(|e| ClientError::InvalidRequirements(e.to_string()))?,
                function_name: ScSymbol(
                    "transfer"
                        .as_bytes()
                        .to_vec()
                        .try_into()
                        .map_err(|_| ClientError::Signing("symbol overflow".into()))?,
                ),
                args: vec![
                    ScVal::Address(
                        sc_address_from_string(self.keypair.public_key())
                            .map_err(|e| ClientError::Signing(e.to_string()))?,
                    ),
                    ScVal::Address(
                        sc_address_from_string(&requirements.pay_to)
                            .map_err(|e| ClientError::InvalidRequirements(e.to_string()))?,
                    ),
                    i128_to_sc_val(amount),
                ]
                .try_into()
                .map_err(|_| ClientError::Signing("argument vector overflow".into()))?,
            }),
            auth: stellar_xdr::curr::VecM::default(),
        };

        let now = UnixTimestamp::now().as_secs();
        let mut transaction = tx::build_invoke_transaction(
            self.keypair.raw_public_key(),
            sequence + 1,
            DEFAULT_BASE_FEE_STROOPS,
            now + timeout,
            invocation,
        );

        let unsigned_xdr = tx::encode_envelope(transaction.clone(), Vec::new())
            .map_err(|e| ClientError::Signing(e.to_string()))?;
        let simulation = self
            .rpc
            .simulate_transaction(&unsigned_xdr)
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;
        if let Some(error) = simulation.error {
            return Err(ClientError::Rpc(format!("simulation failed: {error}")));
        }

        // Prepare: apply the resource footprint and fee, then install the
        // simulated auth entries on the invocation.
        if let Some(data_b64) = &simulation.transaction_data {
            let data = stellar_xdr::curr::SorobanTransactionData::from_xdr_base64(
                data_b64,
                Limits::none(),
            )
            .map_err(|e| ClientError::Rpc(e.to_string()))?;
            transaction.ext = stellar_xdr::curr::TransactionExt::V1(data);
        }
        transaction.fee = transaction
            .fee
            .saturating_add(simulation.min_resource_fee_stroops());

        let mut entries: Vec<SorobanAuthorizationEntry> = Vec::new();
        for entry_b64 in simulation.results.first().map(|r| &r.auth).into_iter().flatten() {
            let entry = SorobanAuthorizationEntry::from_xdr_base64(entry_b64, Limits::none())
                .map_err(|e| ClientError::Rpc(e.to_string()))?;
            entries.push(entry);
        }

        // Sign every auth entry credentialed to this keypair.
        let network_id = self.network.network_id();
        for entry in &mut entries {
            let ours = match &entry.credentials {
                SorobanCredentials::Address(credentials) => {
                    sc_address_to_string(&credentials.address)
                        .is_ok_and(|address| address == self.keypair.public_key())
                }
                SorobanCredentials::SourceAccount => false,
            };
            if ours {
                sign_auth_entry(entry, &self.keypair, network_id, expiration_ledger)
                    .map_err(|e| ClientError::Signing(e.to_string()))?;
            }
        }

        if let Some(operation) = transaction.operations.first().cloned() {
            let mut operation = operation;
            if let stellar_xdr::curr::OperationBody::InvokeHostFunction(invocation) =
                &mut operation.body
            {
                invocation.auth = entries
                    .try_into()
                    .map_err(|_| ClientError::Signing("auth vector overflow".into()))?;
            }
            transaction.operations = vec![operation]
                .try_into()
                .map_err(|_| ClientError::Signing("operation vector overflow".into()))?;
        }

        let envelope_signature = tx::sign_transaction(&transaction, &self.keypair, network_id)
            .map_err(|e| ClientError::Signing(e.to_string()))?;
        let xdr = tx::encode_envelope(transaction, vec![envelope_signature])
            .map_err(|e| ClientError::Signing(e.to_string()))?;

        let payload = ExactStellarPayload { transaction: xdr };
        Ok(PaymentPayload {
            x402_version: V2,
            scheme: self.scheme.to_owned(),
            network: requirements.network.clone(),
            payload: serde_json::to_value(&payload)?,
        })
    }
}
