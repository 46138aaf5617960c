use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Extra filter directives, e.g. `shadowstream_frame=trace,shadowstream_session=debug`.
pub const LOG_ENV: &str = "SHADOWSTREAM_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Library targets are only worth printing when digging into the stream.
    fn show_target(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// `level` applies everywhere; `directives` narrow or widen single crates.
/// Unparseable directives are dropped.
fn build_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.as_filter().into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Log to stderr so stdout stays clean for sample output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_ENV).ok();
    let filter = build_filter(level, directives.as_deref());
    let per_crate = directives.is_some_and(|d| !d.trim().is_empty());

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(per_crate || level.show_target());

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().flatten_event(true).try_init();
        }
    }
}
