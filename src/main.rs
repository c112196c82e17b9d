mod adapters;
mod cli;
mod config;
mod core;
mod logging;

use clap::Parser;

use cli::{Cli, Commands};
use cli::commands::read::ReadOptions;
use config::app_config::AppConfig;
use logging::{LogConfig, init_tracing};

fn main() {
    let args = Cli::parse();

    // Configuration problems are fatal before anything is captured.
    let config = match AppConfig::discover(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    init_tracing(&LogConfig::resolve(
        args.log_level.as_deref(),
        &config.logging,
        args.quiet,
    ));

    let log_path = config.log_path(args.log_path.as_deref());

    let result = match &args.command {
        Commands::Run(run_args) => cli::commands::run::execute(
            run_args,
            &config,
            args.log_path.as_deref(),
            args.quiet,
        ),
        Commands::Read {
            hours,
            all,
            search,
            min_cpu,
            last,
            json,
        } => cli::commands::read::execute(
            &log_path,
            &ReadOptions {
                hours: (!*all).then_some(*hours),
                search: search.clone(),
                min_cpu_ms: *min_cpu,
                last: *last,
                json: *json,
            },
        ),
        Commands::Summary { hours, all, top } => {
            cli::commands::summary::execute(&log_path, (!*all).then_some(*hours), *top)
        }
        Commands::Status => cli::commands::status::execute(&log_path),
    };

    if let Err(e) = result {
        exit_with(&e);
    }
}

/// Configuration errors exit with 2, everything else with 1.
fn exit_with(e: &crate::core::errors::CaptureError) -> ! {
    cli::output::error(&format!("Error: {e}"));
    std::process::exit(if e.is_fatal() { 2 } else { 1 });
}
