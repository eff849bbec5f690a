//! The Solana `exact` scheme: one SPL `TransferChecked` of an exact
//! amount to the recipient's associated token account.

pub mod client;
pub mod facilitator;
pub mod server;
pub mod types;

pub use client::SvmClient;
pub use facilitator::SvmExactFacilitator;
pub use server::SvmServer;
pub use types::{SolanaPayload, SolanaPayloadExtra};

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as b64;
    use solana_hash::Hash;
    use solana_keypair::Keypair;
    use solana_pubkey::Pubkey;
    use solana_signer::Signer;
    use x402::chain::ChainId;
    use x402::proto::v2::{PaymentPayload, PaymentRequirements, V2};

    use super::client::build_transfer_transaction;
    use super::facilitator::{AmountRule, check_payment, extract_transfer};
    use crate::chain::{DEVNET_REFERENCE, SolanaChainReference, derive_ata};

    fn devnet() -> SolanaChainReference {
        SolanaChainReference::devnet()
    }

    fn requirements(amount: &str, mint: &Pubkey, pay_to: &Pubkey) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("solana", DEVNET_REFERENCE),
            asset: mint.to_string(),
            pay_to: pay_to.to_string(),
            amount: amount.into(),
            max_timeout_seconds: 60,
            extra: Some(serde_json::json!({"decimals": 6})),
        }
    }

    fn payload_for(keypair: &Keypair, mint: &Pubkey, pay_to: &Pubkey, amount: u64) -> PaymentPayload {
        let (tx, extra) =
            build_transfer_transaction(keypair, mint, pay_to, amount, 6, None, Hash::default())
                .unwrap();
        let payload = super::types::SolanaPayload {
            transaction: b64.encode(bincode::serialize(&tx).unwrap()),
            extra: Some(extra),
        };
        PaymentPayload {
            x402_version: V2,
            scheme: "exact".into(),
            network: ChainId::new("solana", DEVNET_REFERENCE),
            payload: serde_json::to_value(&payload).unwrap(),
        }
    }

    #[test]
    fn build_then_extract_round_trips_the_transfer() {
        let keypair = Keypair::new();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();
        let (tx, extra) =
            build_transfer_transaction(&keypair, &mint, &pay_to, 1_000, 6, None, Hash::default())
                .unwrap();

        let info = extract_transfer(&tx).unwrap();
        assert_eq!(info.amount, 1_000);
        assert_eq!(info.decimals, 6);
        assert_eq!(info.mint, mint);
        assert_eq!(info.authority, keypair.pubkey());
        assert_eq!(info.fee_payer, keypair.pubkey());
        assert_eq!(info.destination, derive_ata(&pay_to, &mint, &spl_token::ID));
        assert_eq!(info.source.to_string(), extra.source_ata);
    }

    #[test]
    fn happy_path_verifies_offline() {
        let keypair = Keypair::new();
        let facilitator = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();

        let payload = payload_for(&keypair, &mint, &pay_to, 1_000);
        let reqs = requirements("1000", &mint, &pay_to);
        let (_, info) = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator,
            &payload,
            &reqs,
        )
        .unwrap();
        assert_eq!(info.authority, keypair.pubkey());
    }

    #[test]
    fn mint_mismatch_is_rejected() {
        let keypair = Keypair::new();
        let facilitator = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();

        let payload = payload_for(&keypair, &mint, &pay_to, 1_000);
        let reqs = requirements("1000", &Pubkey::new_unique(), &pay_to);
        let failure = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator,
            &payload,
            &reqs,
        )
        .unwrap_err();
        assert_eq!(failure.reason, "mint_mismatch");
    }

    #[test]
    fn wrong_destination_ata_is_rejected() {
        let keypair = Keypair::new();
        let facilitator = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();

        let payload = payload_for(&keypair, &mint, &Pubkey::new_unique(), 1_000);
        let reqs = requirements("1000", &mint, &Pubkey::new_unique());
        let failure = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator,
            &payload,
            &reqs,
        )
        .unwrap_err();
        assert_eq!(failure.reason, "recipient_mismatch");
    }

    #[test]
    fn amount_rules_match_the_schemes() {
        let keypair = Keypair::new();
        let facilitator = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();

        // Overpaying transaction against a smaller requirement.
        let payload = payload_for(&keypair, &mint, &pay_to, 2_000);
        let reqs = requirements("1000", &mint, &pay_to);

        let strict = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator,
            &payload,
            &reqs,
        )
        .unwrap_err();
        assert_eq!(strict.reason, "amount_mismatch");

        assert!(
            check_payment(
                "exact",
                &devnet(),
                AmountRule::AtLeast,
                &facilitator,
                &payload,
                &reqs,
            )
            .is_ok()
        );

        // Underpayment fails both rules.
        let payload = payload_for(&keypair, &mint, &pay_to, 500);
        for rule in [AmountRule::Exact, AmountRule::AtLeast] {
            let failure =
                check_payment("exact", &devnet(), rule, &facilitator, &payload, &reqs)
                    .unwrap_err();
            assert_eq!(failure.reason, "amount_insufficient");
        }
    }

    #[test]
    fn facilitator_fee_payer_is_cosignable() {
        let keypair = Keypair::new();
        let facilitator = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();

        // Two-signer message: facilitator pays fees, client authorizes
        // the transfer. Only the client's slot is filled at build time.
        let (tx, _) = build_transfer_transaction(
            &keypair,
            &mint,
            &pay_to,
            1_000,
            6,
            Some(facilitator),
            Hash::default(),
        )
        .unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert_eq!(tx.message.static_account_keys()[0], facilitator);
        assert_eq!(tx.signatures[0], solana_signature::Signature::default());
        assert_ne!(tx.signatures[1], solana_signature::Signature::default());

        let payload = PaymentPayload {
            x402_version: V2,
            scheme: "exact".into(),
            network: ChainId::new("solana", DEVNET_REFERENCE),
            payload: serde_json::to_value(&super::types::SolanaPayload {
                transaction: b64.encode(bincode::serialize(&tx).unwrap()),
                extra: None,
            })
            .unwrap(),
        };
        let reqs = requirements("1000", &mint, &pay_to);
        let (_, info) = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator,
            &payload,
            &reqs,
        )
        .unwrap();
        assert_eq!(info.fee_payer, facilitator);
        assert_eq!(info.authority, keypair.pubkey());
    }

    #[test]
    fn facilitator_moving_funds_is_rejected() {
        let facilitator_keypair = Keypair::new();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();

        // The facilitator as transfer authority is never acceptable,
        // even though it may pay fees.
        let payload = payload_for(&facilitator_keypair, &mint, &pay_to, 1_000);
        let reqs = requirements("1000", &mint, &pay_to);
        let failure = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator_keypair.pubkey(),
            &payload,
            &reqs,
        )
        .unwrap_err();
        assert_eq!(failure.reason, "facilitator_is_payer");
    }

    #[test]
    fn garbage_payloads_are_rejected() {
        let facilitator = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::new_unique();
        let reqs = requirements("1000", &mint, &pay_to);

        let payload = PaymentPayload {
            x402_version: V2,
            scheme: "exact".into(),
            network: ChainId::new("solana", DEVNET_REFERENCE),
            payload: serde_json::json!({"transaction": "definitely-not-base64!"}),
        };
        let failure = check_payment(
            "exact",
            &devnet(),
            AmountRule::Exact,
            &facilitator,
            &payload,
            &reqs,
        )
        .unwrap_err();
        assert_eq!(failure.reason, "invalid_svm_payload_malformed");
    }
}
