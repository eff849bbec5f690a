//! `ScAddress` / strkey conversions and `ScVal` helpers.

use stellar_xdr::curr::{
    AccountId, Hash, Int128Parts, PublicKey, ScAddress, ScVal, Uint256,
};

/// Errors converting between strkey strings and XDR addresses.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    /// The string is not a recognized `G…` or `C…` strkey.
    #[error("invalid stellar address: {0}")]
    Invalid(String),
    /// The XDR address is of a type this mechanism does not handle.
    #[error("unsupported sc address type")]
    UnsupportedType,
}

/// Renders an [`ScAddress`] as its strkey string.
///
/// # Errors
///
/// Returns [`AddressError::UnsupportedType`] for address kinds other
/// than ed25519 accounts and contracts.
pub fn sc_address_to_string(address: &ScAddress) -> Result<String, AddressError> {
    match address {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes)))) => {
            Ok(stellar_strkey::ed25519::PublicKey(*bytes).to_string())
        }
        ScAddress::Contract(contract) => {
            Ok(stellar_strkey::Contract(contract.0.0).to_string())
        }
        _ => Err(AddressError::UnsupportedType),
    }
}

/// Parses a strkey string into an [`ScAddress`].
///
/// # Errors
///
/// Returns [`AddressError::Invalid`] for anything that is not a `G…`
/// account or `C…` contract strkey.
pub fn sc_address_from_string(address: &str) -> Result<ScAddress, AddressError> {
    if let Ok(public) = stellar_strkey::ed25519::PublicKey::from_string(address) {
        return Ok(ScAddress::Account(AccountId(
            PublicKey::PublicKeyTypeEd25519(Uint256(public.0)),
        )));
    }
    if let Ok(contract) = stellar_strkey::Contract::from_string(address) {
        return Ok(ScAddress::Contract(stellar_xdr::curr::ContractId(Hash(
            contract.0,
        ))));
    }
    Err(AddressError::Invalid(address.to_owned()))
}

/// Builds an `AccountId` from a `G…` strkey.
///
/// # Errors
///
/// Returns [`AddressError::Invalid`] for non-account strkeys.
pub fn account_id_from_string(address: &str) -> Result<AccountId, AddressError> {
    let public = stellar_strkey::ed25519::PublicKey::from_string(address)
        .map_err(|_| AddressError::Invalid(address.to_owned()))?;
    Ok(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(
        public.0,
    ))))
}

/// Extracts a strkey string from an `ScVal::Address`.
#[must_use]
pub fn sc_val_to_address(value: &ScVal) -> Option<String> {
    match value {
        ScVal::Address(address) => sc_address_to_string(address).ok(),
        _ => None,
    }
}

/// Extracts an `i128` from an `ScVal::I128`.
#[must_use]
pub fn sc_val_to_i128(value: &ScVal) -> Option<i128> {
    match value {
        ScVal::I128(Int128Parts { hi, lo }) => {
            Some((i128::from(*hi) << 64) | i128::from(*lo))
        }
        _ => None,
    }
}

/// Builds an `ScVal::I128` from an `i128`.
#[must_use]
pub fn i128_to_sc_val(value: i128) -> ScVal {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "GDQOE23CFSUMSVQK4Y5JHPPYK73VYCNHZHA7ENKCV37P6SUEO6XQBKPP";
    const CONTRACT: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

    #[test]
    fn account_round_trip() {
        let sc = sc_address_from_string(ACCOUNT).unwrap();
        assert!(matches!(sc, ScAddress::Account(_)));
        assert_eq!(sc_address_to_string(&sc).unwrap(), ACCOUNT);
    }

    #[test]
    fn contract_round_trip() {
        let sc = sc_address_from_string(CONTRACT).unwrap();
        assert!(matches!(sc, ScAddress::Contract(_)));
        assert_eq!(sc_address_to_string(&sc).unwrap(), CONTRACT);
    }

    #[test]
    fn i128_round_trip() {
        for value in [0i128, 1, 10_000_000, i128::from(u64::MAX) + 7] {
            assert_eq!(sc_val_to_i128(&i128_to_sc_val(value)), Some(value));
        }
        assert_eq!(sc_val_to_i128(&ScVal::Void), None);
    }
}
