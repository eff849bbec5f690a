//! The EVM `exact` scheme: EIP-3009 payment of an exact amount to a
//! single recipient.
//!
//! - [`client`] builds and signs the authorization
//! - [`server`] parses prices and fills the EIP-712 domain
//! - [`facilitator`] verifies signatures and settles on-chain

pub mod client;
pub mod facilitator;
pub mod server;
pub mod types;

pub use client::{Eip155Client, SignerLike, sign_erc3009_authorization};
pub use facilitator::Eip155ExactFacilitator;
pub use server::Eip155Server;
pub use types::{Eip155Extra, Eip3009Authorization, Eip3009Payload};

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use alloy_signer_local::PrivateKeySigner;
    use x402::chain::ChainId;
    use x402::proto::v2::PaymentRequirements;

    use super::facilitator::verify::{AmountRule, check_payment};
    use super::*;
    use crate::chain::Eip155ChainReference;

    const CHAIN: Eip155ChainReference = Eip155ChainReference::new(84_532);

    fn requirements(amount: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("eip155", "84532"),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            amount: amount.into(),
            max_timeout_seconds: 600,
            extra: Some(serde_json::json!({"name": "USDC", "version": "2"})),
        }
    }

    async fn signed_payload(
        signer: &std::sync::Arc<PrivateKeySigner>,
        requirements: &PaymentRequirements,
    ) -> x402::proto::v2::PaymentPayload {
        use x402::scheme::SchemeClient;
        Eip155Client::exact(std::sync::Arc::clone(signer))
            .build_payload(requirements)
            .await
            .unwrap()
    }

    fn random_signer() -> std::sync::Arc<PrivateKeySigner> {
        std::sync::Arc::new(PrivateKeySigner::random())
    }

    #[tokio::test]
    async fn sign_then_check_recovers_the_signer() {
        let signer = random_signer();
        let reqs = requirements("1000");
        let payload = signed_payload(&signer, &reqs).await;

        let checked = check_payment("exact", CHAIN, AmountRule::Exact, &payload, &reqs).unwrap();
        // An EOA signature that classifies as Eoa has already been
        // recovered against the payer.
        assert!(matches!(
            checked.signature,
            super::facilitator::signature::StructuredSignature::Eoa(_)
        ));
        assert_eq!(checked.payload.authorization.from, signer.address());
        assert_eq!(
            <U256 as From<_>>::from(checked.payload.authorization.value),
            U256::from(1000u64)
        );
    }

    #[tokio::test]
    async fn check_is_deterministic() {
        let signer = random_signer();
        let reqs = requirements("1000");
        let payload = signed_payload(&signer, &reqs).await;
        let first = check_payment("exact", CHAIN, AmountRule::Exact, &payload, &reqs).map(|_| ());
        let second = check_payment("exact", CHAIN, AmountRule::Exact, &payload, &reqs).map(|_| ());
        assert_eq!(first.is_ok(), second.is_ok());
    }

    #[tokio::test]
    async fn tampered_recipient_is_rejected() {
        let signer = random_signer();
        let reqs = requirements("1000");
        let payload = signed_payload(&signer, &reqs).await;

        let mut other = reqs.clone();
        other.pay_to = "0x0000000000000000000000000000000000000001".into();
        let failure =
            check_payment("exact", CHAIN, AmountRule::Exact, &payload, &other).unwrap_err();
        assert_eq!(failure.reason, "invalid_evm_payload_recipient_mismatch");
        assert_eq!(failure.payer, Some(signer.address().to_string()));
    }

    #[tokio::test]
    async fn amount_check_precedes_recipient_check() {
        let signer = random_signer();
        let offered = requirements("1000");
        let payload = signed_payload(&signer, &offered).await;

        // Both the amount and the recipient disagree with the demand;
        // the amount reason must surface first.
        let mut demanded = requirements("2000");
        demanded.pay_to = "0x0000000000000000000000000000000000000001".into();
        let failure =
            check_payment("exact", CHAIN, AmountRule::Exact, &payload, &demanded).unwrap_err();
        assert_eq!(failure.reason, "invalid_evm_payload_amount_insufficient");
    }

    #[tokio::test]
    async fn exact_scheme_rejects_overpayment_split_accepts_it() {
        let signer = random_signer();
        let offered = requirements("2000");
        let payload = signed_payload(&signer, &offered).await;

        // Server actually demanded less than the authorization carries.
        let demanded = requirements("1000");
        let failure =
            check_payment("exact", CHAIN, AmountRule::Exact, &payload, &demanded).unwrap_err();
        assert_eq!(failure.reason, "invalid_evm_payload_amount_mismatch");

        assert!(check_payment("exact", CHAIN, AmountRule::AtLeast, &payload, &demanded).is_ok());
    }

    #[tokio::test]
    async fn underpayment_is_always_rejected() {
        let signer = random_signer();
        let offered = requirements("500");
        let payload = signed_payload(&signer, &offered).await;
        let demanded = requirements("1000");
        for rule in [AmountRule::Exact, AmountRule::AtLeast] {
            let failure = check_payment("exact", CHAIN, rule, &payload, &demanded).unwrap_err();
            assert_eq!(failure.reason, "invalid_evm_payload_amount_insufficient");
        }
    }

    #[tokio::test]
    async fn wrong_network_is_rejected() {
        let signer = random_signer();
        let reqs = requirements("1000");
        let payload = signed_payload(&signer, &reqs).await;
        let other_chain = Eip155ChainReference::new(8453);
        let failure =
            check_payment("exact", other_chain, AmountRule::Exact, &payload, &reqs).unwrap_err();
        assert_eq!(failure.reason, "invalid_network");
    }

    #[tokio::test]
    async fn garbage_signature_falls_back_to_contract_validation() {
        let signer = random_signer();
        let reqs = requirements("1000");
        let mut payload = signed_payload(&signer, &reqs).await;
        // Flip a byte of the signature: recovery now yields a different
        // address, so classification must not claim EOA validity.
        let mut inner: Eip3009Payload =
            serde_json::from_value(payload.payload.clone()).unwrap();
        let mut bytes = inner.signature.to_vec();
        bytes[10] ^= 0xFF;
        inner.signature = bytes.into();
        payload.payload = serde_json::to_value(&inner).unwrap();

        let checked = check_payment("exact", CHAIN, AmountRule::Exact, &payload, &reqs).unwrap();
        assert!(matches!(
            checked.signature,
            super::facilitator::signature::StructuredSignature::Eip1271(_)
        ));
    }
}
