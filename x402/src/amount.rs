//! Human-readable price parsing.
//!
//! Prices enter the system once, at the resource-server configuration
//! boundary, and are converted immediately to atomic units using the
//! asset's declared decimals. Everything downstream works on decimal
//! strings of atomic units; floating point never touches amount math.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price as configured by the resource server operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    /// A human-readable money string such as `"$0.001"` or `"1.50"`,
    /// converted to the network's default settlement asset.
    Money(String),
    /// An explicit amount of a specific asset, already in atomic units.
    Asset(AssetAmount),
}

impl From<&str> for Price {
    fn from(s: &str) -> Self {
        Self::Money(s.to_owned())
    }
}

/// An atomic-unit amount of a concrete asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    /// Amount in atomic units, as a decimal string.
    pub amount: String,
    /// Token contract / mint address.
    pub asset: String,
    /// Asset-specific extra data (e.g. EIP-712 domain fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Errors from [`parse_money`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The text is not a decimal number.
    #[error("unparseable money amount: {0}")]
    Unparseable(String),
    /// Negative amounts are not payments.
    #[error("money amount must be positive: {0}")]
    NotPositive(String),
    /// The amount has more fractional digits than the asset supports.
    #[error("amount {amount} has more precision than {decimals} decimals")]
    ExcessPrecision {
        /// The offending amount text.
        amount: String,
        /// The asset's declared decimals.
        decimals: u32,
    },
}

/// Parses a money string like `"$0.001"` into atomic units of an asset
/// with the given number of decimals.
///
/// A leading `$` and surrounding whitespace are tolerated. The result is
/// exact: amounts that do not fit the asset's precision are rejected
/// rather than rounded.
///
/// # Errors
///
/// Returns an [`AmountError`] for non-numeric, non-positive, or
/// over-precise input.
pub fn parse_money(text: &str, decimals: u32) -> Result<String, AmountError> {
    let trimmed = text.trim().trim_start_matches('$');
    let value = Decimal::from_str(trimmed)
        .map_err(|_| AmountError::Unparseable(text.to_owned()))?;
    if value <= Decimal::ZERO {
        return Err(AmountError::NotPositive(text.to_owned()));
    }
    let factor = 10u64
        .checked_pow(decimals)
        .ok_or_else(|| AmountError::Unparseable(text.to_owned()))?;
    let scaled = value
        .checked_mul(Decimal::from(factor))
        .ok_or_else(|| AmountError::Unparseable(text.to_owned()))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(AmountError::ExcessPrecision {
            amount: text.to_owned(),
            decimals,
        });
    }
    Ok(scaled.normalize().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dollar_prices() {
        assert_eq!(parse_money("$0.001", 6).unwrap(), "1000");
        assert_eq!(parse_money("$1.50", 6).unwrap(), "1500000");
        assert_eq!(parse_money("2", 7).unwrap(), "20000000");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse_money("$abc", 6),
            Err(AmountError::Unparseable(_))
        ));
        assert!(matches!(
            parse_money("-1", 6),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            parse_money("0", 6),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            parse_money("$0.0000001", 6),
            Err(AmountError::ExcessPrecision { .. })
        ));
    }

    #[test]
    fn price_untagged_serde() {
        let money: Price = serde_json::from_str("\"$0.001\"").unwrap();
        assert_eq!(money, Price::Money("$0.001".into()));

        let asset: Price = serde_json::from_value(serde_json::json!({
            "amount": "1000",
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        }))
        .unwrap();
        assert!(matches!(asset, Price::Asset(_)));
    }
}
