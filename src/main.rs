//! Paygate merge worker
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌────────────┐    ┌─────────────┐
//! │  Config  │───▶│ Cursors  │───▶│ MergeWorker│───▶│ ACH service │
//! │  (YAML)  │    │(PG/memory│    │  (claims)  │    │ (contents)  │
//! └──────────┘    └──────────┘    └─────┬──────┘    └─────────────┘
//!                                       ▼
//!                                 ┌────────────┐
//!                                 │ output_dir │
//!                                 └────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use paygate::ach::HttpAchClient;
use paygate::config::PaygateConfig;
use paygate::cursor::{MicroDepositCursor, TransferCursor};
use paygate::merge::{DirectorySink, MergeWorker};
use paygate::repository::{
    DepositoryRepository, MemoryRepository, MicroDepositRepository, PgRepository,
    TransferRepository,
};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

struct Stores {
    transfers: Arc<dyn TransferRepository>,
    depositories: Arc<dyn DepositoryRepository>,
    micro_deposits: Arc<dyn MicroDepositRepository>,
}

async fn open_stores(config: &PaygateConfig) -> anyhow::Result<Stores> {
    match &config.postgres_url {
        Some(url) => {
            let repo = PgRepository::connect(url)
                .await
                .context("connecting to PostgreSQL")?;
            repo.ensure_schema().await.context("creating schema")?;
            let repo = Arc::new(repo);
            Ok(Stores {
                transfers: repo.clone(),
                depositories: repo.clone(),
                micro_deposits: repo,
            })
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory repositories");
            let repo = Arc::new(MemoryRepository::new());
            Ok(Stores {
                transfers: repo.clone(),
                depositories: repo.clone(),
                micro_deposits: repo,
            })
        }
    }
}

async fn run(config: PaygateConfig) -> anyhow::Result<()> {
    let stores = open_stores(&config).await?;
    let ach = Arc::new(
        HttpAchClient::new(&config.ach.endpoint, config.ach.request_timeout())
            .context("building ACH client")?,
    );

    let batch_size = config.merging.batch_size;
    tracing::info!(output_dir = %config.merging.output_dir, "merged files directory");
    let mut worker = MergeWorker::new(
        TransferCursor::new(stores.transfers, stores.depositories, batch_size),
        MicroDepositCursor::new(stores.micro_deposits, batch_size),
        ach,
        Arc::new(DirectorySink::new(&config.merging.output_dir)),
        &config.odfi.routing_number,
        config.merging.poll_interval(),
    );

    tokio::select! {
        _ = worker.run() => {}
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for shutdown signal")?;
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = PaygateConfig::load(&env).with_context(|| format!("loading {} config", env))?;
    let _log_guard = paygate::logging::init_logging(&config.logging);

    tracing::info!(git_hash = env!("GIT_HASH"), env = %env, "starting paygate");

    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    rt.block_on(run(config))
}
