//! podmortem — pod crash forensics observer.
//!
//! Watches pods for crash transitions and captures logs, events and env
//! before restarts overwrite them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use podmortem_daemon::demo::DemoCluster;
use podmortem_daemon::{Daemon, DaemonConfig, DaemonOptions};
use podmortem_notify::{Notifier, SlackNotifier, TelegramNotifier, WebhookNotifier};
use podmortem_store::{Compression, FileStore, Storage};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "podmortem")]
#[command(about = "Pod crash forensics observer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the observer daemon
    Daemon {
        /// Path to the JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// HTTP listen address (overrides config)
        #[arg(long)]
        http_addr: Option<String>,

        /// Namespace to watch (overrides config; default all)
        #[arg(short = 'n', long)]
        namespace: Option<String>,

        /// Slack incoming-webhook URL
        #[arg(long)]
        slack_webhook: Option<String>,

        /// Telegram bot token
        #[arg(long)]
        telegram_token: Option<String>,

        /// Telegram chat ID
        #[arg(long)]
        telegram_chat_id: Option<String>,

        /// Generic webhook URL
        #[arg(long)]
        webhook_url: Option<String>,

        /// Bearer token sent to the generic webhook
        #[arg(long)]
        webhook_token: Option<String>,

        /// Watch a built-in synthetic cluster instead of a real one
        #[arg(long)]
        demo: bool,
    },

    /// List saved crash reports
    List {
        /// Path to the JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print one saved report as JSON
    Show {
        /// Report id
        id: String,

        /// Path to the JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete reports older than the configured retention
    Prune {
        /// Path to the JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("podmortem=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            config,
            http_addr,
            namespace,
            slack_webhook,
            telegram_token,
            telegram_chat_id,
            webhook_url,
            webhook_token,
            demo,
        } => {
            run_daemon(DaemonArgs {
                config,
                http_addr,
                namespace,
                slack_webhook,
                telegram_token,
                telegram_chat_id,
                webhook_url,
                webhook_token,
                demo,
            })
            .await
        }
        Commands::List { config } => list_reports(config),
        Commands::Show { id, config } => show_report(&id, config),
        Commands::Prune { config } => prune_reports(config),
    }
}

struct DaemonArgs {
    config: Option<PathBuf>,
    http_addr: Option<String>,
    namespace: Option<String>,
    slack_webhook: Option<String>,
    telegram_token: Option<String>,
    telegram_chat_id: Option<String>,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
    demo: bool,
}

async fn run_daemon(args: DaemonArgs) -> anyhow::Result<()> {
    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.http_addr = addr;
    }
    if let Some(namespace) = args.namespace {
        config.namespace = namespace;
    }

    let store: Arc<dyn Storage> = Arc::new(open_store(&config)?);

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(url) = args.slack_webhook {
        notifiers.push(Arc::new(SlackNotifier::new(url, "")?));
    }
    if let (Some(token), Some(chat_id)) = (args.telegram_token, args.telegram_chat_id) {
        notifiers.push(Arc::new(TelegramNotifier::new(None, token, chat_id)?));
    }
    if let Some(url) = args.webhook_url {
        let mut headers = HashMap::new();
        if let Some(token) = args.webhook_token {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        notifiers.push(Arc::new(WebhookNotifier::new(url, headers)?));
    }

    let (informer, pod_api) = if args.demo {
        let namespace = if config.namespace.is_empty() {
            "demo"
        } else {
            config.namespace.as_str()
        };
        let cluster = DemoCluster::new(namespace);
        (cluster.informer(), cluster.pod_api())
    } else {
        anyhow::bail!(
            "no cluster backend in this build: pass --demo, or embed the daemon \
             with your cluster's InformerSource/PodApi (see podmortem-daemon docs)"
        );
    };

    info!(
        addr = %config.http_addr,
        namespace = %config.namespace,
        notifiers = notifiers.len(),
        "starting podmortem daemon"
    );

    let daemon = Daemon::new(DaemonOptions {
        config,
        store,
        notifiers,
        pod_api,
        informer,
    })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("received termination signal, shutting down");
        let _ = shutdown_tx.send(true);
    });

    daemon.run(shutdown_rx).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

fn open_store(config: &DaemonConfig) -> anyhow::Result<FileStore> {
    Ok(FileStore::new(
        &config.reports.path,
        Compression::parse(&config.reports.compression),
    )?)
}

fn list_reports(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = DaemonConfig::load(config.as_deref())?;
    let store = open_store(&config)?;

    let mut reports = store.list()?;
    reports.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));

    if reports.is_empty() {
        println!("no reports saved under {}", config.reports.path.display());
        return Ok(());
    }

    for report in &reports {
        println!(
            "{}  {}  {:<12} {:<28} {:<18} exit={:<4} restarts={}",
            report.id,
            report.collected_at.format("%Y-%m-%d %H:%M:%S"),
            report.crash.namespace,
            report.crash.pod_name,
            report.crash.reason,
            report.crash.exit_code,
            report.crash.restart_count,
        );
    }
    println!();
    println!("{} report(s)", reports.len());

    Ok(())
}

fn show_report(id: &str, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = DaemonConfig::load(config.as_deref())?;
    let store = open_store(&config)?;

    let report = store.load(id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn prune_reports(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = DaemonConfig::load(config.as_deref())?;
    let retention = config.retention();
    if retention.is_zero() {
        println!("retention is disabled (reports.retention_secs = 0)");
        return Ok(());
    }

    let store = open_store(&config)?;
    match store.prune(retention)? {
        Some(result) => {
            println!(
                "deleted {}, kept {}, failed {}",
                result.deleted, result.kept, result.failed
            );
            if let Some(e) = result.first_error {
                println!("first error: {e}");
            }
        }
        None => println!("store has no retention support"),
    }
    Ok(())
}
