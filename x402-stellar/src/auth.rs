//! Soroban authorization-entry analysis and signing.

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    HashIdPreimage, HashIdPreimageSorobanAuthorization, InvokeHostFunctionOp, Limits, ScBytes,
    ScMap, ScMapEntry, ScSymbol, ScVal, ScVec, SorobanAuthorizationEntry, SorobanCredentials,
    WriteXdr,
};

use crate::address::sc_address_to_string;
use crate::signer::StellarKeypair;

/// Errors signing an authorization entry.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// XDR encoding failed.
    #[error("xdr encoding failed: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),
    /// The signature `ScVal` could not be assembled.
    #[error("signature value assembly failed")]
    SignatureValue,
}

/// Which addresses have signed (or still must sign) the auth entries of
/// an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSignatureStatus {
    /// Addresses whose credential carries a non-void signature.
    pub already_signed: Vec<String>,
    /// Addresses whose credential signature is still `SCV_VOID`.
    pub pending_signature: Vec<String>,
}

impl AuthSignatureStatus {
    /// Returns `true` if `address` appears in either set.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.already_signed.iter().any(|a| a == address)
            || self.pending_signature.iter().any(|a| a == address)
    }
}

/// Classifies every address-credentialed auth entry of an invocation as
/// already-signed or pending.
///
/// Source-account credentials are skipped: they are implicitly covered
/// by the envelope signature.
#[must_use]
pub fn auth_signature_status(invocation: &InvokeHostFunctionOp) -> AuthSignatureStatus {
    let mut status = AuthSignatureStatus::default();
    for entry in invocation.auth.iter() {
        let SorobanCredentials::Address(credentials) = &entry.credentials else {
            continue;
        };
        let Ok(address) = sc_address_to_string(&credentials.address) else {
            continue;
        };
        let bucket = if matches!(credentials.signature, ScVal::Void) {
            &mut status.pending_signature
        } else {
            &mut status.already_signed
        };
        if !bucket.contains(&address) {
            bucket.push(address);
        }
    }
    status
}

/// Signs one address-credentialed auth entry with the given keypair.
///
/// Sets the credential's `signatureExpirationLedger`, computes the
/// `ENVELOPE_TYPE_SOROBAN_AUTHORIZATION` preimage hash, and installs the
/// standard ed25519 signature structure (a vector of
/// `{public_key, signature}` maps).
///
/// # Errors
///
/// Returns [`AuthError`] if XDR encoding fails.
pub fn sign_auth_entry(
    entry: &mut SorobanAuthorizationEntry,
    keypair: &StellarKeypair,
    network_id: [u8; 32],
    signature_expiration_ledger: u32,
) -> Result<(), AuthError> {
    let SorobanCredentials::Address(credentials) = &mut entry.credentials else {
        return Ok(());
    };
    credentials.signature_expiration_ledger = signature_expiration_ledger;

    let preimage = HashIdPreimage::SorobanAuthorization(HashIdPreimageSorobanAuthorization {
        network_id: stellar_xdr::curr::Hash(network_id),
        nonce: credentials.nonce,
        signature_expiration_ledger,
        invocation: entry.root_invocation.clone(),
    });
    let payload = preimage.to_xdr(Limits::none())?;
    let digest: [u8; 32] = Sha256::digest(&payload).into();
    let signature = keypair.sign(&digest);

    credentials.signature = signature_sc_val(keypair, &signature)?;
    Ok(())
}

fn signature_sc_val(
    keypair: &StellarKeypair,
    signature: &[u8; 64],
) -> Result<ScVal, AuthError> {
    let key_entry = ScMapEntry {
        key: ScVal::Symbol(ScSymbol(
            "public_key"
                .as_bytes()
                .to_vec()
                .try_into()
                .map_err(|_| AuthError::SignatureValue)?,
        )),
        val: ScVal::Bytes(ScBytes(
            keypair
                .raw_public_key()
                .to_vec()
                .try_into()
                .map_err(|_| AuthError::SignatureValue)?,
        )),
    };
    let sig_entry = ScMapEntry {
        key: ScVal::Symbol(ScSymbol(
            "signature"
                .as_bytes()
                .to_vec()
                .try_into()
                .map_err(|_| AuthError::SignatureValue)?,
        )),
        val: ScVal::Bytes(ScBytes(
            signature
                .to_vec()
                .try_into()
                .map_err(|_| AuthError::SignatureValue)?,
        )),
    };
    let map = ScVal::Map(Some(ScMap(
        vec![key_entry, sig_entry]
            .try_into()
            .map_err(|_| AuthError::SignatureValue)?,
    )));
    Ok(ScVal::Vec(Some(ScVec(
        vec![map].try_into().map_err(|_| AuthError::SignatureValue)?,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::sc_address_from_string;
    use stellar_xdr::curr::{
        HostFunction, InvokeContractArgs, SorobanAddressCredentials, SorobanAuthorizedFunction,
        SorobanAuthorizedInvocation, VecM,
    };

    const PAYER: &str = "GDQOE23CFSUMSVQK4Y5JHPPYK73VYCNHZHA7ENKCV37P6SUEO6XQBKPP";
    const CONTRACT: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

    fn entry_for(address: &str, signature: ScVal) -> SorobanAuthorizationEntry {
        let contract = sc_address_from_string(CONTRACT).unwrap();
        SorobanAuthorizationEntry {
            credentials: SorobanCredentials::Address(SorobanAddressCredentials {
                address: sc_address_from_string(address).unwrap(),
                nonce: 1,
                signature_expiration_ledger: 0,
                signature,
            }),
            root_invocation: SorobanAuthorizedInvocation {
                function: SorobanAuthorizedFunction::ContractFn(InvokeContractArgs {
                    contract_address: contract,
                    function_name: ScSymbol("transfer".as_bytes().to_vec().try_into().unwrap()),
                    args: VecM::default(),
                }),
                sub_invocations: VecM::default(),
            },
        }
    }

    fn invocation(entries: Vec<SorobanAuthorizationEntry>) -> InvokeHostFunctionOp {
        InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(InvokeContractArgs {
                contract_address: sc_address_from_string(CONTRACT).unwrap(),
                function_name: ScSymbol("transfer".as_bytes().to_vec().try_into().unwrap()),
                args: VecM::default(),
            }),
            auth: entries.try_into().unwrap(),
        }
    }

    #[test]
    fn void_signature_is_pending_nonvoid_is_signed() {
        let signed = entry_for(PAYER, ScVal::Bool(true));
        let status = auth_signature_status(&invocation(vec![signed]));
        assert_eq!(status.already_signed, vec![PAYER.to_owned()]);
        assert!(status.pending_signature.is_empty());

        let pending = entry_for(PAYER, ScVal::Void);
        let status = auth_signature_status(&invocation(vec![pending]));
        assert!(status.already_signed.is_empty());
        assert_eq!(status.pending_signature, vec![PAYER.to_owned()]);
    }

    #[test]
    fn sign_auth_entry_fills_signature_and_expiration() {
        let keypair = StellarKeypair::from_secret_bytes([3u8; 32]);
        let mut entry = entry_for(keypair.public_key(), ScVal::Void);
        sign_auth_entry(&mut entry, &keypair, [0u8; 32], 12_345).unwrap();

        let SorobanCredentials::Address(credentials) = &entry.credentials else {
            panic!("expected address credentials");
        };
        assert_eq!(credentials.signature_expiration_ledger, 12_345);
        assert!(!matches!(credentials.signature, ScVal::Void));

        let status = auth_signature_status(&invocation(vec![entry]));
        assert_eq!(status.already_signed, vec![keypair.public_key().to_owned()]);
    }
}
