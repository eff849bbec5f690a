//! Server half of the EVM schemes.
//!
//! Converts operator prices into atomic USDC amounts and fills the
//! EIP-712 domain fields clients need to sign without extra RPC lookups.

use std::str::FromStr;

use alloy_primitives::Address;
use x402::amount::{AssetAmount, Price, parse_money};
use x402::chain::ChainId;
use x402::proto::v2::PaymentRequirements;
use x402::scheme::{EXACT_SCHEME, SPLIT_SCHEME, SchemeServer, ServerError};
use x402::split::SplitConfig;

use crate::chain::{Eip155ChainReference, NetworkConfig, known_networks};

/// Server half of the EVM `exact` and `split` schemes.
#[derive(Debug)]
pub struct Eip155Server {
    networks: Vec<NetworkConfig>,
    scheme: &'static str,
}

impl Eip155Server {
    /// Creates the `exact` server half with the built-in network table.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            networks: known_networks(),
            scheme: EXACT_SCHEME,
        }
    }

    /// Creates the `split` server half with the built-in network table.
    #[must_use]
    pub fn split() -> Self {
        Self {
            networks: known_networks(),
            scheme: SPLIT_SCHEME,
        }
    }

    /// Adds or replaces a network config (builder style).
    #[must_use]
    pub fn with_network(mut self, config: NetworkConfig) -> Self {
        self.networks.retain(|n| n.chain != config.chain);
        self.networks.push(config);
        self
    }

    fn network_config(&self, network: &ChainId) -> Option<&NetworkConfig> {
        let chain = Eip155ChainReference::try_from(network).ok()?;
        self.networks.iter().find(|n| n.chain == chain)
    }
}

impl SchemeServer for Eip155Server {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn namespace(&self) -> &'static str {
        "eip155"
    }

    fn parse_price(&self, price: &Price, network: &ChainId) -> Result<AssetAmount, ServerError> {
        match price {
            Price::Money(text) => {
                let asset = self
                    .network_config(network)
                    .and_then(NetworkConfig::default_asset)
                    .ok_or_else(|| ServerError::NoAsset(network.clone()))?;
                let amount = parse_money(text, asset.decimals)
                    .map_err(|e| ServerError::InvalidPrice(e.to_string()))?;
                Ok(AssetAmount {
                    amount,
                    asset: asset.address.to_string(),
                    extra: Some(serde_json::json!({
                        "name": asset.name,
                        "version": asset.version,
                    })),
                })
            }
            Price::Asset(asset_amount) => {
                Address::from_str(&asset_amount.asset)
                    .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;
                Ok(asset_amount.clone())
            }
        }
    }

    fn enhance_requirements(
        &self,
        mut requirements: PaymentRequirements,
    ) -> Result<PaymentRequirements, ServerError> {
        let asset = Address::from_str(&requirements.asset)
            .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;
        Address::from_str(&requirements.pay_to)
            .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;

        // Fill EIP-712 domain fields from the network table when absent.
        let has_domain = requirements
            .extra
            .as_ref()
            .is_some_and(|extra| extra.get("name").is_some() && extra.get("version").is_some());
        if !has_domain {
            let info = self
                .network_config(&requirements.network)
                .and_then(|config| config.find_asset(asset))
                .ok_or_else(|| {
                    ServerError::InvalidExtra(format!(
                        "no EIP-712 domain known for asset {asset}; provide extra.name/version"
                    ))
                })?;
            let mut extra = match requirements.extra.take() {
                Some(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            extra.insert("name".into(), serde_json::Value::String(info.name.clone()));
            extra.insert(
                "version".into(),
                serde_json::Value::String(info.version.clone()),
            );
            requirements.extra = Some(serde_json::Value::Object(extra));
        }

        if self.scheme == SPLIT_SCHEME {
            let config = SplitConfig::from_extra(requirements.extra.as_ref()).ok_or_else(|| {
                ServerError::InvalidExtra("split requires extra.recipients".into())
            })?;
            config
                .validate()
                .map_err(|e| ServerError::InvalidExtra(e.to_string()))?;
            for recipient in &config.recipients {
                Address::from_str(&recipient.address)
                    .map_err(|e| ServerError::InvalidAddress(e.to_string()))?;
            }
        }

        Ok(requirements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_requirements(scheme: &str, extra: Option<serde_json::Value>) -> PaymentRequirements {
        PaymentRequirements {
            scheme: scheme.into(),
            network: ChainId::new("eip155", "84532"),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            amount: "1000".into(),
            max_timeout_seconds: 60,
            extra,
        }
    }

    #[test]
    fn money_price_converts_to_default_usdc() {
        let server = Eip155Server::exact();
        let amount = server
            .parse_price(&Price::from("$0.001"), &ChainId::new("eip155", "84532"))
            .unwrap();
        assert_eq!(amount.amount, "1000");
        assert_eq!(amount.extra.unwrap()["name"], "USDC");
    }

    #[test]
    fn enhance_fills_domain_from_table() {
        let server = Eip155Server::exact();
        let enhanced = server
            .enhance_requirements(base_requirements("exact", None))
            .unwrap();
        let extra = enhanced.extra.unwrap();
        assert_eq!(extra["name"], "USDC");
        assert_eq!(extra["version"], "2");
    }

    #[test]
    fn split_requires_valid_recipients() {
        let server = Eip155Server::split();
        let missing = server.enhance_requirements(base_requirements("split", None));
        assert!(matches!(missing, Err(ServerError::InvalidExtra(_))));

        let bad_sum = base_requirements(
            "split",
            Some(serde_json::json!({
                "recipients": [
                    {"address": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C", "bps": 4000},
                ]
            })),
        );
        assert!(matches!(
            server.enhance_requirements(bad_sum),
            Err(ServerError::InvalidExtra(_))
        ));

        let good = base_requirements(
            "split",
            Some(serde_json::json!({
                "recipients": [
                    {"address": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C", "bps": 7000},
                    {"address": "0x036CbD53842c5426634e7929541eC2318f3dCF7e", "bps": 3000},
                ]
            })),
        );
        assert!(server.enhance_requirements(good).is_ok());
    }
}
