use std::path::Path;

use crate::adapters::credentials::env_token::{EnvTokenProvider, StaticTokenProvider};
use crate::adapters::log::json_lines_log::JsonLinesLog;
use crate::adapters::sources::file_source::FileSource;
use crate::adapters::sources::http_source::HttpQuerySource;
use crate::adapters::sources::tds_source::TdsQuerySource;
use crate::cli::RunArgs;
use crate::cli::output;
use crate::config::app_config::{AppConfig, RunOverrides, SourceConfig, TokenSource};
use crate::config::capture_config::CaptureConfig;
use crate::core::errors::Result;
use crate::core::services::capture_loop::{CaptureLoop, RunSummary};
use crate::core::services::stop_signal::StopHandle;
use crate::core::traits::capture_log::CaptureLog;
use crate::core::traits::credentials::CredentialProvider;
use crate::core::traits::lifecycle::Supervised;
use crate::core::traits::source::CaptureSource;

/// Execute the `qhlog run` command.
///
/// Validates the configuration, then captures in the foreground until
/// Ctrl+C / SIGTERM or the cycle limit. Configuration errors are the
/// only failures that end the process with an error.
pub fn execute(
    args: &RunArgs,
    config: &AppConfig,
    log_path: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let overrides = RunOverrides {
        interval_secs: args.interval,
        top_n: args.top_n,
        log_path: log_path.map(Path::to_path_buf),
        source: args.source,
        endpoint: args.endpoint.clone(),
        lakehouse: args.lakehouse.clone(),
        fixture: args.fixture.clone(),
        max_cycles: if args.once { Some(1) } else { args.max_cycles },
    };
    let (capture, source) = config.resolve(&overrides)?;

    if !quiet {
        print_banner(&capture, &source);
    }

    let log = JsonLinesLog::new(capture.log_path.clone());
    let summary = match source {
        SourceConfig::Tds {
            server,
            port,
            database,
            token,
            timeout,
        } => {
            let source =
                TdsQuerySource::new(server, port, database, timeout, credentials(token))?;
            host(capture, source, log)?
        }
        SourceConfig::Http {
            endpoint,
            lakehouse,
            token,
            timeout,
        } => {
            let source = HttpQuerySource::new(endpoint, lakehouse, timeout, credentials(token))?;
            host(capture, source, log)?
        }
        SourceConfig::File { fixture } => host(capture, FileSource::new(fixture), log)?,
    };

    if !quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn credentials(token: TokenSource) -> Box<dyn CredentialProvider> {
    match token {
        TokenSource::Env(var) => Box::new(EnvTokenProvider::new(var)),
        TokenSource::Static(value) => Box::new(StaticTokenProvider::new(value)),
    }
}

fn host<S: CaptureSource, L: CaptureLog>(
    config: CaptureConfig,
    source: S,
    log: L,
) -> Result<RunSummary> {
    let mut capture = CaptureLoop::new(config, source, log);
    install_signal_handlers(capture.stop_handle());
    let summary = capture.start()?;
    tracing::debug!(
        state = ?capture.state(),
        log_path = %capture.log().path().display(),
        "capture host exiting"
    );
    Ok(summary)
}

/// Translate Ctrl+C and SIGTERM into a stop request. The loop finishes
/// the cycle in progress before returning.
fn install_signal_handlers(stop: StopHandle) {
    let spawned = std::thread::Builder::new()
        .name("qhlog-signals".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!(error = %e, "signal handling unavailable");
                    return;
                }
            };
            if rt.block_on(wait_for_shutdown()) {
                tracing::info!("shutdown requested, finishing current cycle");
                stop.request_stop();
            }
        });

    if let Err(e) = spawned {
        tracing::warn!(error = %e, "could not start signal thread");
    }
}

/// Resolves to `true` once a shutdown signal arrives, `false` if signals
/// cannot be observed on this platform.
async fn wait_for_shutdown() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            return tokio::select! {
                res = tokio::signal::ctrl_c() => res.is_ok(),
                _ = term.recv() => true,
            };
        }
    }
    tokio::signal::ctrl_c().await.is_ok()
}

fn print_banner(capture: &CaptureConfig, source: &SourceConfig) {
    output::header("qhlog run");
    output::field("Log file", capture.log_path.display());
    output::field("Interval", format!("{}s", capture.interval.as_secs()));
    output::field("Top-n", capture.top_n);
    match source {
        SourceConfig::Tds {
            server,
            port,
            database,
            ..
        } => {
            output::field("Source", format!("tds {server}:{port}"));
            if let Some(name) = database {
                output::field("Lakehouse", name);
            }
        }
        SourceConfig::Http {
            endpoint,
            lakehouse,
            ..
        } => {
            output::field("Source", format!("http {endpoint}"));
            if let Some(name) = lakehouse {
                output::field("Lakehouse", name);
            }
        }
        SourceConfig::File { fixture } => {
            output::field("Source", format!("file {}", fixture.display()))
        }
    }
    if capture.max_cycles.is_none() {
        println!("\n  Press Ctrl+C to stop\n");
    }
}

fn print_summary(summary: &RunSummary) {
    output::header(&format!("Stopped after {} cycle(s)", summary.cycles));
    output::success(&format!(
        "{} entries appended ({} records)",
        summary.entries_appended, summary.records_captured
    ));
    if summary.source_failures > 0 {
        output::warning(&format!(
            "{} cycle(s) skipped: source unavailable",
            summary.source_failures
        ));
    }
    if summary.persistence_failures > 0 {
        output::error(&format!(
            "{} cycle(s) NOT persisted: log write failed",
            summary.persistence_failures
        ));
    }
    if let Some(at) = summary.last_capture {
        println!("  Last capture: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
