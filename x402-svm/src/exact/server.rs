//! Server half of the Solana schemes.

use solana_pubkey::Pubkey;
use x402::amount::{AssetAmount, Price, parse_money};
use x402::chain::ChainId;
use x402::proto::v2::PaymentRequirements;
use x402::scheme::{EXACT_SCHEME, SPLIT_SCHEME, SchemeServer, ServerError};
use x402::split::SplitConfig;

use crate::chain::DEFAULT_DECIMALS;

/// Server half of the Solana `exact` and `split` schemes.
///
/// Money-denominated prices require a configured default mint.
#[derive(Debug)]
pub struct SvmServer {
    scheme: &'static str,
    default_mint: Option<(String, u32)>,
    fee_payer: Option<String>,
}

impl SvmServer {
    /// Creates the `exact` server half.
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            scheme: EXACT_SCHEME,
            default_mint: None,
            fee_payer: None,
        }
    }

    /// Creates the `split` server half.
    #[must_use]
    pub const fn split() -> Self {
        Self {
            scheme: SPLIT_SCHEME,
            default_mint: None,
            fee_payer: None,
        }
    }

    /// Configures the default mint for money-denominated prices.
    #[must_use]
    pub fn with_default_mint(mut self, mint: impl Into<String>, decimals: u32) -> Self {
        self.default_mint = Some((mint.into(), decimals));
        self
    }

    /// Advertises the facilitator fee payer in the requirements so
    /// clients can build fee-payer-aware transactions.
    #[must_use]
    pub fn with_fee_payer(mut self, fee_payer: impl Into<String>) -> Self {
        self.fee_payer = Some(fee_payer.into());
        self
    }
}

impl SchemeServer for SvmServer {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn namespace(&self) -> &'static str {
        "solana"
    }

    fn parse_price(&self, price: &Price, network: &ChainId) -> Result<AssetAmount, ServerError> {
        match price {
            Price::Money(text) => {
                let (mint, decimals) = self
                    .default_mint
                    .as_ref()
                    .ok_or_else(|| ServerError::NoAsset(network.clone()))?;
                let amount = parse_money(text, *decimals)
                    .map_err(|e| ServerError::InvalidPrice(e.to_string()))?;
                Ok(AssetAmount {
                    amount,
                    asset: mint.clone(),
                    extra: Some(serde_json::json!({ "decimals": decimals })),
                })
            }
            Price::Asset(asset_amount) => Ok(asset_amount.clone()),
        }
    }

    fn enhance_requirements(
        &self,
        mut requirements: PaymentRequirements,
    ) -> Result<PaymentRequirements, ServerError> {
        requirements
            .asset
            .parse::<Pubkey>()
            .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;
        requirements
            .pay_to
            .parse::<Pubkey>()
            .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;

        let mut extra = match requirements.extra.take() {
            Some(serde_json::Value::Object(map)) => map,
            None => serde_json::Map::new(),
            Some(other) => {
                return Err(ServerError::InvalidExtra(format!(
                    "extra must be an object, got {other}"
                )));
            }
        };
        extra
            .entry("decimals")
            .or_insert_with(|| serde_json::Value::from(u64::from(DEFAULT_DECIMALS)));
        if let Some(fee_payer) = &self.fee_payer {
            extra
                .entry("feePayer")
                .or_insert_with(|| serde_json::Value::String(fee_payer.clone()));
        }

        if self.scheme == SPLIT_SCHEME {
            let recipients = extra.get("recipients").cloned().ok_or_else(|| {
                ServerError::InvalidExtra("split requires extra.recipients".into())
            })?;
            let config: SplitConfig =
                serde_json::from_value(serde_json::json!({ "recipients": recipients }))
                    .map_err(|e| ServerError::InvalidExtra(e.to_string()))?;
            config
                .validate()
                .map_err(|e| ServerError::InvalidExtra(e.to_string()))?;
            for recipient in &config.recipients {
                recipient
                    .address
                    .parse::<Pubkey>()
                    .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;
            }
        }

        requirements.extra = Some(serde_json::Value::Object(extra));
        Ok(requirements)
    }
}
