use std::process::ExitCode;

use clap::Parser;
use log::error;
use squirrel_relay::RelayConfig;

/// squirrel-relay - update server for Squirrel.Mac and Squirrel.Windows
///
/// Answers update checks from the releases a repository publishes on GitHub.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
/// This is useful for accessing private repositories or avoiding rate limits.
///
/// Examples:
///   squirrel-relay --listen 127.0.0.1:3000
///   curl http://127.0.0.1:3000/owner/repo/darwin/1.0.0
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    config: RelayConfig,

    /// Log filter (e.g. "debug" or "squirrel_relay=trace").
    /// RUST_LOG takes precedence when it is set.
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match squirrel_relay::run_with_shutdown(cli.config, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
