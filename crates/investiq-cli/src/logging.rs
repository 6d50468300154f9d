use tracing_subscriber::EnvFilter;

/// Filter directive variable. Defaults to `warn`.
pub const LOG_ENV: &str = "INVESTIQ_LOG";

/// Set to `json` for one JSON object per event.
pub const LOG_FORMAT_ENV: &str = "INVESTIQ_LOG_FORMAT";

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// command output.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
