use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::app_config::LoggingSection;

/// Diagnostics settings after merging flags and the `[logging]` section.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `--log-level` wins over `--quiet`, which wins over the file.
    /// `RUST_LOG` wins over all of them.
    pub fn resolve(flag: Option<&str>, section: &LoggingSection, quiet: bool) -> Self {
        let log_level = flag
            .map(str::to_string)
            .or_else(|| quiet.then(|| "error".to_string()))
            .or_else(|| section.level.clone())
            .unwrap_or_else(|| "info".to_string());
        Self {
            log_level,
            json: section.json,
        }
    }
}

/// Install the global subscriber. Diagnostics go to stderr so stdout stays
/// clean for command output. Safe to call more than once.
pub fn init_tracing(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = Registry::default().with(env_filter);

    let result = if config.json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
    };

    // Already set is expected in tests; anything else is reported and
    // capture continues without diagnostics.
    if let Err(e) = result
        && !e.to_string().contains("already been set")
    {
        eprintln!("qhlog: failed to initialize logging: {e}");
    }
}
