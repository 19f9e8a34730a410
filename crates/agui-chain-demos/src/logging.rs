use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// How diagnostic logs are rendered on stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
    /// No diagnostic output at all.
    Off,
}

/// Builds the log filter: the `--log-level` directive when given, then
/// `RUST_LOG`, then `warn` so chain chatter stays out of the demo output.
pub fn resolve_filter(level: Option<&str>) -> Result<EnvFilter, ParseError> {
    match level {
        Some(directive) => EnvFilter::try_new(directive),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))),
    }
}

/// Installs the global subscriber. Logs go to stderr; stdout carries only
/// the events the scenarios emit. A second call is a no-op.
pub fn init(level: Option<&str>, format: LogFormat) -> Result<(), ParseError> {
    let filter = resolve_filter(level)?;
    let installed = match format {
        LogFormat::Off => return Ok(()),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
    Ok(())
}
