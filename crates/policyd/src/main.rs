use anyhow::Context;
use clap::Parser;
use policy_lifecycle::{Lifecycle, ShutdownSubscription};
use policy_rules::RuleRegistry;
use policy_store::{MemoryStore, NullObserver, Observer};
use policy_throttle::RateLimiterSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

mod logging;
mod observer_task;
mod pipeline;
mod server;
mod sweeper;

use pipeline::DecisionPipeline;
use server::ConnectionServer;
use sweeper::RetentionSweeper;

/// Policy decision service for a mail transfer agent (MTA).
///
/// Listens for framed `smtpd_access_policy` inquiries, answers each
/// against an ordered rule set and a set of rate limiters, and persists
/// the decision for later inspection.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Opt {
    /// Address to listen on, e.g. "0.0.0.0:5002". Falls back to
    /// `POLICY_SERVER_HOST`/`POLICY_SERVER_PORT`, then `0.0.0.0:5002`.
    #[arg(long)]
    listen: Option<String>,

    /// `tracing_subscriber::EnvFilter` directive. Falls back to
    /// `POLICYD_LOG`, then a built-in default.
    #[arg(long)]
    log_filter: Option<String>,

    /// How often the retention sweeper runs, e.g. "2h", "30m". Falls back
    /// to `POLICY_SWEEP_INTERVAL_HOURS`, then a built-in 2-hour default.
    #[arg(long, value_parser = humantime::parse_duration)]
    sweep_interval: Option<Duration>,

    /// How long an Inquiry Record is retained before the sweeper deletes
    /// it, e.g. "24h". Falls back to `POLICY_RETENTION_HOURS`, then a
    /// built-in 24-hour default.
    #[arg(long, value_parser = humantime::parse_duration)]
    retention: Option<Duration>,

    /// Bounded grace period the process waits for in-flight inquiries to
    /// finish draining after shutdown is requested.
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    shutdown_grace_period: Duration,
}

impl Opt {
    fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = match &self.listen {
            Some(addr) => addr.clone(),
            None => {
                let host = std::env::var("POLICY_SERVER_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string());
                let port = std::env::var("POLICY_SERVER_PORT")
                    .unwrap_or_else(|_| "5002".to_string());
                format!("{host}:{port}")
            }
        };
        addr.parse()
            .with_context(|| format!("invalid listen address '{addr}'"))
    }

    /// Resolves `--retention`, falling back to `POLICY_RETENTION_HOURS`
    /// (an integer hour count), then a built-in 24-hour default.
    fn retention(&self) -> anyhow::Result<Duration> {
        Self::duration_with_hours_env(self.retention, "POLICY_RETENTION_HOURS", 24)
    }

    /// Resolves `--sweep-interval`, falling back to
    /// `POLICY_SWEEP_INTERVAL_HOURS` (an integer hour count), then a
    /// built-in 2-hour default.
    fn sweep_interval(&self) -> anyhow::Result<Duration> {
        Self::duration_with_hours_env(self.sweep_interval, "POLICY_SWEEP_INTERVAL_HOURS", 2)
    }

    fn duration_with_hours_env(
        cli_value: Option<Duration>,
        env_var: &str,
        default_hours: u64,
    ) -> anyhow::Result<Duration> {
        if let Some(duration) = cli_value {
            return Ok(duration);
        }
        let hours = match std::env::var(env_var) {
            Ok(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{env_var} must be an integer hour count, got '{value}'"))?,
            Err(_) => default_hours,
        };
        Ok(Duration::from_secs(hours * 3600))
    }
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    logging::init(opt.log_filter.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(run(opt))
}

async fn run(opt: Opt) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting policyd");

    let addr = opt.listen_addr()?;

    let store: Arc<dyn policy_store::Store> = Arc::new(MemoryStore::new());
    let observer: Arc<dyn Observer> = Arc::new(NullObserver);

    let registry = Arc::new(
        RuleRegistry::load(Arc::clone(&store))
            .await
            .context("loading persisted rule set")?,
    );
    let limiters = Arc::new(
        RateLimiterSet::load(Arc::clone(&store))
            .await
            .context("loading persisted rate limiters")?,
    );

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(1024);
    let pipeline = Arc::new(DecisionPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&limiters),
        Arc::clone(&store),
        event_tx,
    ));

    let mut lifecycle = Lifecycle::new(opt.shutdown_grace_period);

    let server = ConnectionServer::bind(addr, Arc::clone(&pipeline)).await?;
    let server_task = tokio::spawn({
        let shutdown = ShutdownSubscription::get();
        async move { server.run(shutdown).await }
    });

    let observer_task = tokio::spawn({
        let shutdown = ShutdownSubscription::get();
        observer_task::run(event_rx, observer, shutdown)
    });

    let retention = opt.retention()?;
    let sweep_interval = opt.sweep_interval()?;
    let sweeper_task = tokio::spawn({
        let shutdown = ShutdownSubscription::get();
        let sweeper = RetentionSweeper::new(
            store,
            limiters,
            chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::hours(24)),
            sweep_interval,
        );
        async move { sweeper.run(shutdown).await }
    });

    lifecycle.wait_for_shutdown().await;

    // Best-effort: give the background tasks a moment to notice the
    // shutdown signal and return on their own before the process exits.
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = tokio::join!(server_task, observer_task, sweeper_task);
    })
    .await;

    Ok(())
}
