//! Minimal Soroban JSON-RPC client.
//!
//! Covers the methods the mechanisms use: `getHealth`,
//! `getLatestLedger`, `getLedgers`, `getLedgerEntries`,
//! `simulateTransaction`, `sendTransaction`, `getTransaction`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stellar_xdr::curr::{
    AccountEntry, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, ReadXdr, WriteXdr,
};
use url::Url;

use crate::address::account_id_from_string;
use crate::chain::DEFAULT_ESTIMATED_LEDGER_SECONDS;

/// Default per-call timeout.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the Soroban RPC client.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The HTTP transport failed.
    #[error("soroban rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The node answered with a JSON-RPC error object.
    #[error("soroban rpc error {code}: {message}")]
    Node {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// The response was valid JSON-RPC but not the expected shape.
    #[error("unexpected soroban rpc response: {0}")]
    UnexpectedResponse(String),
    /// XDR in the response failed to decode.
    #[error("xdr decoding failed: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),
    /// The requested ledger entry does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(String),
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<P>,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Response of `getHealth`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// `"healthy"` when the node is serving.
    pub status: String,
}

/// Response of `getLatestLedger`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedgerResponse {
    /// Sequence number of the latest closed ledger.
    pub sequence: u32,
}

/// One ledger of a `getLedgers` page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    /// Ledger sequence number.
    pub sequence: u32,
    /// Close time as unix seconds (stringified).
    pub ledger_close_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgersResponse {
    #[serde(default)]
    ledgers: Vec<LedgerInfo>,
}

/// One simulation result entry (auth + return value XDR).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Base64 XDR `SorobanAuthorizationEntry` list required by the
    /// invocation.
    #[serde(default)]
    pub auth: Vec<String>,
    /// Base64 XDR of the return value.
    #[serde(default)]
    pub xdr: Option<String>,
}

/// Response of `simulateTransaction`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    /// Set when simulation failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Minimum resource fee in stroops (stringified i64).
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    /// Base64 XDR `SorobanTransactionData` to apply before submission.
    #[serde(default)]
    pub transaction_data: Option<String>,
    /// Per-invocation results (one for a single `InvokeHostFunction`).
    #[serde(default)]
    pub results: Vec<SimulationResult>,
    /// Ledger the simulation ran against.
    #[serde(default)]
    pub latest_ledger: u32,
}

impl SimulateTransactionResponse {
    /// The minimum resource fee, or zero when absent.
    #[must_use]
    pub fn min_resource_fee_stroops(&self) -> u32 {
        self.min_resource_fee
            .as_deref()
            .and_then(|fee| fee.parse::<u32>().ok())
            .unwrap_or(0)
    }
}

/// Response of `sendTransaction`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    /// `PENDING` on acceptance; anything else is a submission failure.
    pub status: String,
    /// The transaction hash.
    pub hash: String,
    /// Base64 XDR of the rejection result, when present.
    #[serde(default)]
    pub error_result_xdr: Option<String>,
}

/// Status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TransactionStatus {
    /// The transaction applied successfully.
    #[serde(rename = "SUCCESS")]
    Success,
    /// The transaction was included and failed.
    #[serde(rename = "FAILED")]
    Failed,
    /// The node has not seen the transaction (yet).
    #[serde(rename = "NOT_FOUND")]
    NotFound,
}

/// Response of `getTransaction`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    /// Current status of the transaction.
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntriesResponse {
    #[serde(default)]
    entries: Vec<LedgerEntryResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntryResult {
    xdr: String,
}

/// A Soroban JSON-RPC client bound to one endpoint.
///
/// Cheap to clone; the underlying `reqwest` client is shared. Safe for
/// concurrent use.
#[derive(Debug, Clone)]
pub struct SorobanRpc {
    http: reqwest::Client,
    url: Url,
}

impl SorobanRpc {
    /// Creates a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new(url: Url) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self { http, url })
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<R, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: JsonRpcResponse<R> = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| RpcError::UnexpectedResponse(format!("{method}: empty result")))
    }

    /// `getHealth`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on transport or node failure.
    pub async fn get_health(&self) -> Result<HealthResponse, RpcError> {
        self.call::<(), _>("getHealth", None).await
    }

    /// `getLatestLedger`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on transport or node failure.
    pub async fn get_latest_ledger(&self) -> Result<LatestLedgerResponse, RpcError> {
        self.call::<(), _>("getLatestLedger", None).await
    }

    /// Estimates the average ledger close time from recent ledgers.
    ///
    /// Falls back to [`DEFAULT_ESTIMATED_LEDGER_SECONDS`] when the node
    /// cannot provide a usable sample.
    pub async fn estimated_ledger_seconds(&self, sample_size: u32) -> u64 {
        let result: Result<u64, RpcError> = async {
            let latest = self.get_latest_ledger().await?;
            let start = latest.sequence.saturating_sub(sample_size).max(1);
            let response: LedgersResponse = self
                .call(
                    "getLedgers",
                    Some(serde_json::json!({
                        "startLedger": start,
                        "pagination": { "limit": sample_size },
                    })),
                )
                .await?;
            let close_times: Vec<u64> = response
                .ledgers
                .iter()
                .filter_map(|l| l.ledger_close_time.parse().ok())
                .collect();
            if close_times.len() < 2 {
                return Ok(DEFAULT_ESTIMATED_LEDGER_SECONDS);
            }
            let span = close_times[close_times.len() - 1].saturating_sub(close_times[0]);
            let intervals = close_times.len() as u64 - 1;
            let avg = span / intervals;
            Ok(if avg == 0 {
                DEFAULT_ESTIMATED_LEDGER_SECONDS
            } else {
                avg
            })
        }
        .await;
        result.unwrap_or(DEFAULT_ESTIMATED_LEDGER_SECONDS)
    }

    /// Loads an account's current sequence number via `getLedgerEntries`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::AccountNotFound`] when the account does not
    /// exist on-ledger.
    pub async fn load_account_sequence(&self, account: &str) -> Result<i64, RpcError> {
        let account_id = account_id_from_string(account)
            .map_err(|e| RpcError::UnexpectedResponse(e.to_string()))?;
        let key = LedgerKey::Account(LedgerKeyAccount { account_id });
        let key_b64 = key.to_xdr_base64(Limits::none())?;
        let response: LedgerEntriesResponse = self
            .call(
                "getLedgerEntries",
                Some(serde_json::json!({ "keys": [key_b64] })),
            )
            .await?;
        let entry = response
            .entries
            .first()
            .ok_or_else(|| RpcError::AccountNotFound(account.to_owned()))?;
        let data = LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())?;
        match data {
            LedgerEntryData::Account(AccountEntry { seq_num, .. }) => Ok(seq_num.0),
            _ => Err(RpcError::UnexpectedResponse(
                "ledger entry is not an account".into(),
            )),
        }
    }

    /// `simulateTransaction` over a base64 XDR envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on transport or node failure; a failed
    /// simulation is reported inside the response, not as an error.
    pub async fn simulate_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SimulateTransactionResponse, RpcError> {
        self.call(
            "simulateTransaction",
            Some(serde_json::json!({ "transaction": envelope_xdr })),
        )
        .await
    }

    /// `sendTransaction` over a base64 XDR envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on transport or node failure.
    pub async fn send_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SendTransactionResponse, RpcError> {
        self.call(
            "sendTransaction",
            Some(serde_json::json!({ "transaction": envelope_xdr })),
        )
        .await
    }

    /// `getTransaction` by hash.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on transport or node failure.
    pub async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, RpcError> {
        self.call("getTransaction", Some(serde_json::json!({ "hash": hash })))
            .await
    }
}
