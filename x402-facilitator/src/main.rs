//! Facilitator service entry point.
//!
//! ```bash
//! # Serve Base Sepolia + Stellar testnet + Solana devnet
//! EVM_RPC_URL_84532=https://sepolia.base.org \
//! FACILITATOR_EVM_PRIVATE_KEY=0x... \
//! FACILITATOR_STELLAR_PRIVATE_KEY=S... \
//! SOLANA_RPC_URL=https://api.devnet.solana.com \
//! FACILITATOR_SOLANA_PRIVATE_KEY=... \
//! cargo run -p x402-facilitator
//! ```
//!
//! `RUST_LOG` controls log verbosity; `--host` / `--port` (or `HOST` /
//! `PORT`) control the bind address.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use x402::facilitator::FacilitatorLocal;
use x402::scheme::{SchemeFacilitator, SchemeRegistry};

use x402_facilitator::config::FacilitatorConfig;
use x402_facilitator::handlers::facilitator_router;

#[derive(Debug, Parser)]
#[command(name = "x402-facilitator", about = "x402 payment facilitator service")]
struct Args {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Bind port.
    #[arg(long, env = "PORT", default_value_t = 4021)]
    port: u16,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = FacilitatorConfig::from_env();

    let mut registry: SchemeRegistry<Arc<dyn SchemeFacilitator>> = SchemeRegistry::new();

    #[cfg(feature = "chain-eip155")]
    register_evm(&mut registry, &config)?;
    #[cfg(feature = "chain-stellar")]
    register_stellar(&mut registry, &config)?;
    #[cfg(feature = "chain-solana")]
    register_solana(&mut registry, &config)?;

    if registry.is_empty() {
        tracing::warn!("no mechanisms configured; facilitator will reject every payment");
    }

    let state = Arc::new(FacilitatorLocal::new(registry));
    let app = facilitator_router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("facilitator shut down");
    Ok(())
}

#[cfg(feature = "chain-eip155")]
fn register_evm(
    registry: &mut SchemeRegistry<Arc<dyn SchemeFacilitator>>,
    config: &FacilitatorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use alloy_network::EthereumWallet;
    use alloy_provider::ProviderBuilder;
    use alloy_signer_local::PrivateKeySigner;
    use x402::chain::ChainIdPattern;
    use x402_evm::chain::Eip155ChainReference;
    use x402_evm::exact::Eip155ExactFacilitator;
    use x402_evm::split::Eip155SplitFacilitator;

    if config.evm_chains.is_empty() {
        return Ok(());
    }
    let Some(key) = &config.evm_private_key else {
        tracing::warn!("EVM chains configured without FACILITATOR_EVM_PRIVATE_KEY; skipping");
        return Ok(());
    };
    let signer: PrivateKeySigner = key
        .trim()
        .parse()
        .map_err(|e| format!("invalid FACILITATOR_EVM_PRIVATE_KEY: {e}"))?;
    let signer_address = signer.address();
    let wallet = EthereumWallet::from(signer);

    for chain_config in &config.evm_chains {
        let chain = Eip155ChainReference::new(chain_config.chain_id);
        let rpc_url: url::Url = chain_config
            .rpc_url
            .parse()
            .map_err(|e| format!("invalid RPC URL for {chain}: {e}"))?;
        let provider = ProviderBuilder::new()
            .wallet(wallet.clone())
            .connect_http(rpc_url);
        let pattern = ChainIdPattern::exact(chain.as_chain_id());

        registry.register(
            "exact",
            &pattern,
            Arc::new(Eip155ExactFacilitator::new(
                provider.clone(),
                chain,
                signer_address,
            )),
        );
        registry.register(
            "split",
            &pattern,
            Arc::new(Eip155SplitFacilitator::new(provider, chain, signer_address)),
        );
        tracing::info!(chain = %chain, signer = %signer_address, "registered EVM mechanisms");
    }
    Ok(())
}

#[cfg(feature = "chain-stellar")]
fn register_stellar(
    registry: &mut SchemeRegistry<Arc<dyn SchemeFacilitator>>,
    config: &FacilitatorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use x402::chain::ChainIdPattern;
    use x402_stellar::chain::StellarNetwork;
    use x402_stellar::exact::{StellarCore, StellarExactFacilitator};
    use x402_stellar::rpc::SorobanRpc;
    use x402_stellar::signer::StellarKeypair;
    use x402_stellar::split::StellarSplitFacilitator;

    let Some(seed) = &config.stellar_private_key else {
        return Ok(());
    };
    let network = match config.stellar_network.as_str() {
        "testnet" => StellarNetwork::Testnet,
        "pubnet" => StellarNetwork::Pubnet,
        other => return Err(format!("unknown STELLAR_NETWORK: {other}").into()),
    };
    let rpc_url = config
        .stellar_rpc_url
        .clone()
        .or_else(|| network.default_rpc_url().map(str::to_owned))
        .ok_or("STELLAR_RPC_URL is required on pubnet")?;

    let keypair = StellarKeypair::from_secret_seed(seed.trim())?;
    let rpc = SorobanRpc::new(rpc_url.parse()?)?;
    let core = StellarCore::new(keypair, network, rpc);
    let pattern = ChainIdPattern::exact(network.as_chain_id());

    registry.register(
        "exact",
        &pattern,
        Arc::new(StellarExactFacilitator::new(core.clone())),
    );
    registry.register(
        "split",
        &pattern,
        Arc::new(StellarSplitFacilitator::new(core.clone())),
    );
    tracing::info!(network = %network.as_chain_id(), signer = %core.address(), "registered Stellar mechanisms");
    Ok(())
}

#[cfg(feature = "chain-solana")]
fn register_solana(
    registry: &mut SchemeRegistry<Arc<dyn SchemeFacilitator>>,
    config: &FacilitatorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use solana_keypair::Keypair;
    use x402::chain::ChainIdPattern;
    use x402_svm::chain::{SolanaChainReference, SolanaProvider};
    use x402_svm::exact::SvmExactFacilitator;
    use x402_svm::split::SvmSplitFacilitator;

    let (Some(key), Some(rpc_url)) = (&config.solana_private_key, &config.solana_rpc_url) else {
        return Ok(());
    };
    let chain = match config.solana_network.as_str() {
        "mainnet" => SolanaChainReference::mainnet(),
        "devnet" => SolanaChainReference::devnet(),
        reference => {
            let chain_id = x402::chain::ChainId::new("solana", reference);
            SolanaChainReference::try_from(&chain_id)?
        }
    };

    let keypair = Keypair::from_base58_string(key.trim());
    let pattern = ChainIdPattern::exact(chain.as_chain_id());
    let provider = SolanaProvider::new(rpc_url.clone(), keypair, chain);

    registry.register(
        "exact",
        &pattern,
        Arc::new(SvmExactFacilitator::new(provider.clone())),
    );
    registry.register(
        "split",
        &pattern,
        Arc::new(SvmSplitFacilitator::new(provider.clone())),
    );
    tracing::info!(network = %provider.chain().as_chain_id(), signer = %provider.pubkey(), "registered Solana mechanisms");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("received Ctrl-C, shutting down");
    }
}
