//! Server half of the Stellar schemes.

use x402::amount::{AssetAmount, Price, parse_money};
use x402::chain::ChainId;
use x402::proto::v2::PaymentRequirements;
use x402::scheme::{EXACT_SCHEME, SPLIT_SCHEME, SchemeServer, ServerError};
use x402::split::SplitConfig;

use crate::chain::{is_valid_asset_address, is_valid_destination_address};

/// Stellar assets use 7 decimal places.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 7;

/// Server half of the Stellar `exact` and `split` schemes.
///
/// Money-denominated prices require a configured default asset, since
/// Stellar has no chain-global settlement token.
#[derive(Debug)]
pub struct StellarServer {
    scheme: &'static str,
    are_fees_sponsored: bool,
    default_asset: Option<(String, u32)>,
}

impl StellarServer {
    /// Creates the `exact` server half.
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            scheme: EXACT_SCHEME,
            are_fees_sponsored: true,
            default_asset: None,
        }
    }

    /// Creates the `split` server half.
    #[must_use]
    pub const fn split() -> Self {
        Self {
            scheme: SPLIT_SCHEME,
            are_fees_sponsored: true,
            default_asset: None,
        }
    }

    /// Configures the default asset for money-denominated prices.
    #[must_use]
    pub fn with_default_asset(mut self, contract: impl Into<String>, decimals: u32) -> Self {
        self.default_asset = Some((contract.into(), decimals));
        self
    }

    /// Sets whether the facilitator sponsors transaction fees.
    #[must_use]
    pub const fn with_fees_sponsored(mut self, sponsored: bool) -> Self {
        self.are_fees_sponsored = sponsored;
        self
    }
}

impl SchemeServer for StellarServer {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn namespace(&self) -> &'static str {
        "stellar"
    }

    fn parse_price(&self, price: &Price, network: &ChainId) -> Result<AssetAmount, ServerError> {
        match price {
            Price::Money(text) => {
                let (asset, decimals) = self
                    .default_asset
                    .as_ref()
                    .ok_or_else(|| ServerError::NoAsset(network.clone()))?;
                let amount = parse_money(text, *decimals)
                    .map_err(|e| ServerError::InvalidPrice(e.to_string()))?;
                Ok(AssetAmount {
                    amount,
                    asset: asset.clone(),
                    extra: None,
                })
            }
            Price::Asset(asset_amount) => Ok(asset_amount.clone()),
        }
    }

    fn enhance_requirements(
        &self,
        mut requirements: PaymentRequirements,
    ) -> Result<PaymentRequirements, ServerError> {
        if !is_valid_asset_address(&requirements.asset) {
            return Err(ServerError::InvalidAddress(format!(
                "invalid stellar asset address: {}",
                requirements.asset
            )));
        }
        if !is_valid_destination_address(&requirements.pay_to) {
            return Err(ServerError::InvalidAddress(format!(
                "invalid stellar destination: {}",
                requirements.pay_to
            )));
        }

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
            .entry("areFeesSponsored")
            .or_insert(serde_json::Value::Bool(self.are_fees_sponsored));

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
                if !is_valid_destination_address(&recipient.address) {
                    return Err(ServerError::InvalidAddress(format!(
                        "invalid recipient address: {}",
                        recipient.address
                    )));
                }
            }
        }

        requirements.extra = Some(serde_json::Value::Object(extra));
        Ok(requirements)
    }
}
