//! ChainSync CLI: run the indexer and inspect what it wrote.
//!
//! # Commands
//! ```text
//! chainsync run       [--config chainsync.yaml] [--stop-height N]
//! chainsync status    [--json]
//! chainsync enrich    [--batch-size N]
//! chainsync programs  [--limit N] [--json]
//! chainsync info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use chainsync_codec::{DecoderRegistry, EnrichmentCache, HttpProgramDecoder, ProgramView};
use chainsync_core::SyncConfig;
use chainsync_engine::{
    classify_executions, describe_programs, BroadcastSink, DescribedProgram, EventSink,
    SyncEngineBuilder, WebhookSink,
};
use chainsync_rpc::{HttpTransport, RetryConfig, RpcChainClient, WsHeadWatcher, WsWatcherConfig};

mod backend;
mod config;
mod logging;

use backend::Backend;
use config::{CliConfig, Overrides};

const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const PROGRAM_CACHE_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(
    name = "chainsync",
    about = "ChainSync CLI: single-writer chain indexer",
    long_about = "
ChainSync CLI: ingest blocks from a node into SQLite or Postgres, one atomic
commit per block, and publish change notifications.

ENVIRONMENT VARIABLES:
  CHAINSYNC_CONFIG         Path to the YAML config file
  CHAINSYNC_RPC_URL        Node JSON-RPC endpoint
  CHAINSYNC_DATABASE_URL   sqlite:<path> | postgres://... | memory
  RUST_LOG                 Overrides the configured log filter
",
    version
)]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true, env = "CHAINSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync engine until Ctrl-C, the stop height, or a fatal error
    Run,

    /// Show the cursor and row counts of the store
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify stored contract executions that have no program type yet
    Enrich {
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
    },

    /// List recent program submissions with their decoded view
    Programs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show build info and the registered message types
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Info = cli.command {
        return cmd_info();
    }

    let config = CliConfig::load(cli.config.as_deref(), &cli.overrides)?;
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Run => cmd_run(config.sync).await,
        Commands::Status { json } => cmd_status(&config.sync, json).await,
        Commands::Enrich { batch_size } => cmd_enrich(&config.sync, batch_size).await,
        Commands::Programs { limit, json } => cmd_programs(&config.sync, limit, json).await,
        Commands::Info => cmd_info(),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_run(sync: SyncConfig) -> Result<()> {
    let transport =
        HttpTransport::new(&sync.rpc_url, RPC_REQUEST_TIMEOUT).context("build RPC transport")?;
    let client = RpcChainClient::new(transport, RetryConfig::from(&sync.backoff));
    let backend = Backend::open(&sync).await?;

    let sink: Arc<dyn EventSink> = match &sync.publisher.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url, WEBHOOK_TIMEOUT).context("build webhook sink")?),
        None => {
            let (sink, mut rx) = BroadcastSink::new(sync.publisher.channel_capacity);
            tokio::spawn(async move {
                while let Ok(n) = rx.recv().await {
                    tracing::debug!(topic = n.topic(), "notification");
                }
            });
            Arc::new(sink)
        }
    };

    let watcher = sync.ws_url.as_ref().map(|url| {
        WsHeadWatcher::spawn(
            url.clone(),
            WsWatcherConfig {
                reconnect_initial: sync.backoff.initial_backoff(),
                reconnect_max: sync.backoff.max_backoff(),
            },
        )
    });

    let mut builder = SyncEngineBuilder::new(sync.clone())
        .client(Arc::new(client))
        .sink(sink);
    builder = backend.attach(builder);
    if let Some(watcher) = &watcher {
        builder = builder.heads(watcher.subscribe());
    }
    let mut engine = builder.build()?;

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            token.cancel();
        }
    });

    let report = engine.run(cancel).await?;
    drop(watcher);

    tracing::info!(
        state = %report.final_state,
        last_height = report.cursor.as_ref().map(|c| c.last_height),
        blocks = report.metrics.blocks_committed,
        dropped_notifications = report.metrics.notifications_dropped,
        "done"
    );
    Ok(())
}

async fn cmd_status(sync: &SyncConfig, as_json: bool) -> Result<()> {
    let backend = Backend::open(sync).await?;
    let stats = backend.store().stats().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("Backend:       {}", backend.name());
    match &stats.cursor {
        Some(c) => println!("Cursor:        {} ({})", c.last_height, c.last_hash),
        None => println!("Cursor:        none (next run starts at {})", sync.start_height),
    }
    println!("Blocks:        {}", stats.blocks);
    println!("Transactions:  {}", stats.transactions);
    println!("Messages:      {}", stats.messages);
    println!("  unrecognized {}", stats.unrecognized);
    println!("  unparsed     {}", stats.unparsed);
    Ok(())
}

async fn cmd_enrich(sync: &SyncConfig, batch_size: usize) -> Result<()> {
    let backend = Backend::open(sync).await?;
    let report = classify_executions(backend.store().as_ref(), batch_size).await?;
    println!(
        "Classified {} contract executions ({} unknown)",
        report.classified, report.unknown
    );
    Ok(())
}

async fn cmd_programs(sync: &SyncConfig, limit: usize, as_json: bool) -> Result<()> {
    let backend = Backend::open(sync).await?;
    let store = backend.store();

    let programs: Vec<DescribedProgram> = match &sync.program_decoder_url {
        Some(url) => {
            let decoder = HttpProgramDecoder::new(url, sync.program_decoder_timeout())
                .context("build program decoder")?;
            let cache = EnrichmentCache::new(decoder, PROGRAM_CACHE_CAPACITY);
            describe_programs(store.as_ref(), &cache, limit).await?
        }
        None => store
            .program_submissions(limit)
            .await?
            .into_iter()
            .map(|p| DescribedProgram {
                view: ProgramView::Raw {
                    bytecode_hex: format!("0x{}", hex::encode(&p.bytecode)),
                },
                tx_hash: p.tx_hash,
                msg_index: p.msg_index,
                block_height: p.block_height,
                sender: p.sender,
            })
            .collect(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&programs)?);
        return Ok(());
    }
    println!("{} program submissions", programs.len());
    for p in &programs {
        let view = match &p.view {
            ProgramView::Decoded { summary } => summary.to_string(),
            ProgramView::Raw { bytecode_hex } => format!("raw {} bytes", bytecode_hex.len().saturating_sub(2) / 2),
        };
        println!(
            "  {:>10}  {}#{}  {}  {}",
            p.block_height, p.tx_hash, p.msg_index, p.sender, view
        );
    }
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("ChainSync v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Storage backends:  memory, sqlite:<path>, postgres://...");
    println!("Writer lock:       Postgres advisory lock | SQLite lease row | in-process");
    println!("Notifications:     new-block, new-transaction, new-deposit, new-withdrawal");
    println!();
    println!("Registered message types:");
    let registry = DecoderRegistry::standard();
    for type_url in registry.type_urls() {
        println!(
            "  {:45} module={}",
            type_url,
            registry.module_of(type_url).unwrap_or_default()
        );
    }
    Ok(())
}
