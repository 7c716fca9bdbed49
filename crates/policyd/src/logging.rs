use tracing_subscriber::EnvFilter;

/// Default `POLICYD_LOG` directive when neither `--log-filter` nor the
/// environment variable is set.
pub const DEFAULT_LOG_FILTER: &str = "policyd=info,policy_rules=info,policy_throttle=info";

/// Initializes the global `tracing` subscriber once. Config precedence is
/// CLI flag, then `POLICYD_LOG`, then [`DEFAULT_LOG_FILTER`].
pub fn init(cli_filter: Option<&str>) -> anyhow::Result<()> {
    let directive = cli_filter
        .map(str::to_string)
        .or_else(|| std::env::var("POLICYD_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let env_filter = EnvFilter::try_new(&directive)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
