use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::credentials::env_token::DEFAULT_TOKEN_ENV;
use crate::adapters::sources::tds_source::DEFAULT_TDS_PORT;
use crate::config::capture_config::{
    CaptureConfig, DEFAULT_INTERVAL_SECS, DEFAULT_LOG_FILE, DEFAULT_TIMEOUT_SECS, DEFAULT_TOP_N,
};
use crate::core::errors::{CaptureError, Result};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "qhlog.toml";

/// Top-level configuration read from `qhlog.toml`.
///
/// Every field is optional: command-line flags and environment variables
/// override the file, and built-in defaults fill the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CaptureError::InvalidConfig {
                detail: format!("config file {} not found", path.display()),
            });
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CaptureError::InvalidConfig {
            detail: format!("failed to parse {}: {e}", path.display()),
        })
    }

    /// Find the config to use.
    ///
    /// An explicit path must exist. Otherwise `./qhlog.toml`, then
    /// `<config dir>/qhlog/config.toml`; defaults when neither exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load(&local);
        }

        if let Some(global) = dirs::config_dir().map(|d| d.join("qhlog").join("config.toml"))
            && global.exists()
        {
            return Self::load(&global);
        }

        Ok(Self::default())
    }
}

/// The `[capture]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureSection {
    pub interval_secs: Option<u64>,
    pub top_n: Option<usize>,
    pub log_path: Option<PathBuf>,
}

/// Which capture source to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The lakehouse SQL endpoint over TDS, with an access token
    #[default]
    Tds,
    /// T-SQL over an HTTP SQL gateway
    Http,
    /// Replay a JSON fixture file
    File,
}

/// The `[source]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSection {
    pub kind: Option<SourceKind>,
    pub endpoint: Option<String>,
    pub lakehouse: Option<String>,
    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,
    /// Literal token. Prefer `token_env` outside of tests.
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub fixture: Option<PathBuf>,
}

/// The `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

/// Values given on the command line (or via environment variables),
/// which take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub interval_secs: Option<u64>,
    pub top_n: Option<usize>,
    pub log_path: Option<PathBuf>,
    pub source: Option<SourceKind>,
    pub endpoint: Option<String>,
    pub lakehouse: Option<String>,
    pub fixture: Option<PathBuf>,
    pub max_cycles: Option<u64>,
}

/// Where the HTTP source gets its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Env(String),
    Static(String),
}

/// Fully resolved source settings.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Tds {
        server: String,
        port: u16,
        database: Option<String>,
        token: TokenSource,
        timeout: Duration,
    },
    Http {
        endpoint: String,
        lakehouse: Option<String>,
        token: TokenSource,
        timeout: Duration,
    },
    File {
        fixture: PathBuf,
    },
}

impl AppConfig {
    /// Log path to read from, for the reader commands.
    pub fn log_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.capture.log_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }

    /// Merge file, overrides and defaults, then validate.
    pub fn resolve(&self, overrides: &RunOverrides) -> Result<(CaptureConfig, SourceConfig)> {
        let interval_secs = overrides
            .interval_secs
            .or(self.capture.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let top_n = overrides
            .top_n
            .or(self.capture.top_n)
            .unwrap_or(DEFAULT_TOP_N);
        let log_path = self.log_path(overrides.log_path.as_deref());

        let source = self.resolve_source(overrides)?;
        let capture = CaptureConfig::validated(
            Duration::from_secs(interval_secs),
            top_n,
            log_path,
            overrides.max_cycles,
        )?;

        Ok((capture, source))
    }

    fn resolve_source(&self, overrides: &RunOverrides) -> Result<SourceConfig> {
        let kind = overrides
            .source
            .or(self.source.kind)
            .unwrap_or_default();

        match kind {
            SourceKind::Tds => {
                let endpoint = self.endpoint(overrides, "tds")?;
                let (server, port) = parse_server(&endpoint)?;
                Ok(SourceConfig::Tds {
                    server,
                    port,
                    database: self.lakehouse(overrides),
                    token: self.token_source(),
                    timeout: self.timeout()?,
                })
            }
            SourceKind::Http => {
                let endpoint = self.endpoint(overrides, "http")?;
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(CaptureError::InvalidConfig {
                        detail: format!("endpoint '{endpoint}' must be an http(s) URL"),
                    });
                }
                Ok(SourceConfig::Http {
                    endpoint,
                    lakehouse: self.lakehouse(overrides),
                    token: self.token_source(),
                    timeout: self.timeout()?,
                })
            }
            SourceKind::File => {
                let fixture = overrides
                    .fixture
                    .clone()
                    .or_else(|| self.source.fixture.clone())
                    .ok_or_else(|| CaptureError::InvalidConfig {
                        detail: "the file source needs a fixture (--fixture or [source] fixture)"
                            .into(),
                    })?;
                Ok(SourceConfig::File { fixture })
            }
        }
    }

    fn endpoint(&self, overrides: &RunOverrides, kind: &str) -> Result<String> {
        overrides
            .endpoint
            .clone()
            .or_else(|| self.source.endpoint.clone())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CaptureError::InvalidConfig {
                detail: format!(
                    "the {kind} source needs an endpoint (--endpoint, \
                     QHLOG_ENDPOINT or [source] endpoint)"
                ),
            })
    }

    fn lakehouse(&self, overrides: &RunOverrides) -> Option<String> {
        overrides
            .lakehouse
            .clone()
            .or_else(|| self.source.lakehouse.clone())
    }

    /// A literal token wins over `token_env`.
    fn token_source(&self) -> TokenSource {
        match (&self.source.token, &self.source.token_env) {
            (Some(token), _) => TokenSource::Static(token.clone()),
            (None, Some(var)) => TokenSource::Env(var.clone()),
            (None, None) => TokenSource::Env(DEFAULT_TOKEN_ENV.to_string()),
        }
    }

    fn timeout(&self) -> Result<Duration> {
        let timeout_secs = self.source.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(CaptureError::InvalidConfig {
                detail: "source timeout_secs must be positive".into(),
            });
        }
        Ok(Duration::from_secs(timeout_secs))
    }
}

/// Split a TDS endpoint into host and port. Accepts `host`, `host:port`
/// and the SQL Server style `host,port`.
fn parse_server(endpoint: &str) -> Result<(String, u16)> {
    let invalid = |why: &str| CaptureError::InvalidConfig {
        detail: format!(
            "tds endpoint '{endpoint}' {why}; expected host[:port], \
             e.g. xyz.datawarehouse.fabric.microsoft.com"
        ),
    };

    if endpoint.contains("://") || endpoint.contains('/') {
        return Err(invalid("is a URL"));
    }

    match endpoint.rsplit_once([',', ':']) {
        Some((host, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| invalid("has an invalid port"))?;
            let host = host.trim();
            if host.is_empty() {
                return Err(invalid("has no host"));
            }
            Ok((host.to_string(), port))
        }
        None => Ok((endpoint.to_string(), DEFAULT_TDS_PORT)),
    }
}
