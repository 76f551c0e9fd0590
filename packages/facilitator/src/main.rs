mod chain;
mod config;
mod crypto;
mod database;
mod facilitator;
mod handlers;
mod models;
mod repositories;
mod services;
#[cfg(test)]
mod testing;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use ethers::types::U256;
use tracing::{info, warn};

use crate::{
    chain::{
        contracts::{
            ANCHOR_EVENTS, CO_GATEWAY_EVENTS, GATEWAY_EVENTS, REDEEM_POOL_EVENTS,
            STAKE_POOL_EVENTS,
        },
        event_source::{EventSource, RangeLimits},
        relayer::ChainRelayer,
    },
    config::config::{ChainConfig, FacilitatorConfig},
    database::{
        database::Database,
        store::{CheckpointStore, Store, TransactionJournal},
    },
    facilitator::{facilitator::Facilitator, setup::SetupRecords},
    handlers::registry::HandlerRegistry,
    repositories::{
        observers::{AuxiliaryChainObserver, GatewayObserver, MessageObserver, RequestObserver},
        repositories::Repositories,
    },
    services::{
        accept_service::AcceptService,
        confirm_service::ConfirmService,
        context::{ChainContext, Chains},
        progress_service::ProgressService,
        prove_service::ProveService,
        retry::RetryPolicy,
    },
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[clap(name = "facilitator", version)]
struct Args {
    /// TOML configuration; environment variables are used when omitted.
    #[clap(long)]
    config: Option<PathBuf>,
}

fn chain_context(relayer: &Arc<ChainRelayer>, config: &ChainConfig, retry: RetryPolicy) -> ChainContext {
    ChainContext {
        chain_id: relayer.chain_id(),
        submitter: relayer.clone(),
        proof_generator: relayer.clone(),
        worker: relayer.worker(),
        gas_price: U256::from(config.gas_price),
        retry,
    }
}

fn event_source(
    name: &str,
    relayer: &ChainRelayer,
    config: &ChainConfig,
    fragments: &[&str],
    checkpoints: Arc<dyn CheckpointStore>,
    max_block_range: u64,
) -> Result<EventSource> {
    EventSource::new(
        name,
        relayer.provider().clone(),
        vec![config.pool()?, config.gateway()?, config.anchor()?],
        fragments,
        checkpoints,
        RangeLimits {
            start_block: config.start_block,
            confirmations: config.confirmations,
            max_block_range,
        },
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facilitator=info".into()),
        )
        .init();

    info!("🚀 Starting facilitator");

    let args = Args::parse();
    let config = match args.config {
        Some(path) => FacilitatorConfig::from_file(path),
        None => FacilitatorConfig::from_env(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    let kinds = config.event_kinds()?;

    let database = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .context("Failed to initialize database")?,
    );
    Database::run_migrations(&database.pool).context("Failed to run migrations")?;
    database.health_check()?;

    let store: Arc<dyn Store> = database.clone();
    let journal: Arc<dyn TransactionJournal> = database.clone();
    let checkpoints: Arc<dyn CheckpointStore> = database.clone();

    info!("🔗 Initializing origin relayer");
    let origin_relayer = Arc::new(
        ChainRelayer::new(
            &config.origin.rpc_url,
            &config.origin.private_key,
            config.origin.chain_id,
            journal.clone(),
        )
        .await
        .context("Failed to initialize origin relayer")?,
    );

    info!("🔗 Initializing auxiliary relayer");
    let auxiliary_relayer = Arc::new(
        ChainRelayer::new(
            &config.auxiliary.rpc_url,
            &config.auxiliary.private_key,
            config.auxiliary.chain_id,
            journal,
        )
        .await
        .context("Failed to initialize auxiliary relayer")?,
    );

    let retry = config.facilitator.retry;
    let chains = Arc::new(Chains {
        origin: chain_context(&origin_relayer, &config.origin, retry),
        auxiliary: chain_context(&auxiliary_relayer, &config.auxiliary, retry),
    });

    let repositories = Arc::new(Repositories::new(store));

    info!("🌱 Checking setup records");
    SetupRecords::from_config(&config)?
        .seed(&repositories)
        .await?;

    info!("⚙️  Attaching protocol services");
    repositories
        .request
        .attach(Arc::new(RequestObserver::Accept(Arc::new(AcceptService::new(
            repositories.clone(),
            chains.clone(),
            config.origin.pool()?,
            config.auxiliary.pool()?,
        )))))
        .await;
    repositories
        .gateway
        .attach(Arc::new(GatewayObserver::Confirm(Arc::new(
            ConfirmService::new(repositories.clone(), chains.clone()),
        ))))
        .await;
    repositories
        .message
        .attach(Arc::new(MessageObserver::Progress(Arc::new(
            ProgressService::new(repositories.clone(), chains.clone()),
        ))))
        .await;
    repositories
        .auxiliary_chain
        .attach(Arc::new(AuxiliaryChainObserver::Prove(Arc::new(
            ProveService::new(
                repositories.clone(),
                chains,
                config.auxiliary.chain_id,
                config.origin.gateway()?,
                config.auxiliary.gateway()?,
            ),
        ))))
        .await;

    let registry = HandlerRegistry::new(&kinds, repositories.clone(), config.auxiliary.chain_id);
    let facilitator = Facilitator::new(repositories, registry);
    info!("📋 Subscribed to {} event kind(s)", facilitator.kinds().len());

    let max_block_range = config.facilitator.max_block_range;
    let sources = vec![
        event_source(
            "origin",
            &origin_relayer,
            &config.origin,
            &[STAKE_POOL_EVENTS, GATEWAY_EVENTS, ANCHOR_EVENTS].concat(),
            checkpoints.clone(),
            max_block_range,
        )?,
        event_source(
            "auxiliary",
            &auxiliary_relayer,
            &config.auxiliary,
            &[REDEEM_POOL_EVENTS, CO_GATEWAY_EVENTS, ANCHOR_EVENTS].concat(),
            checkpoints,
            max_block_range,
        )?,
    ];

    facilitator.resume().await?;

    info!("✅ All services started successfully");

    tokio::select! {
        result = facilitator.run(sources, Duration::from_secs(config.facilitator.poll_interval_secs)) => result?,
        _ = tokio::signal::ctrl_c() => info!("🛑 Shutting down"),
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, facilitator.drain()).await.is_err() {
        warn!("⚠️  Observer tasks still running after {:?}", SHUTDOWN_GRACE);
    }

    Ok(())
}
