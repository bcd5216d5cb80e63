use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{value_parser, Arg, Command};
use tracing_subscriber::EnvFilter;

use oneanime::server::write_template;
use oneanime::{ImageServer, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Command::new("oneanime")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serve a random image from a group of image directories")
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .arg(
            Arg::new("config")
                .value_name("CONFIG_FILE")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the JSON config file"),
        )
        .subcommand(
            Command::new("init").about("Copy the template config.json into the current directory"),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oneanime=info")),
        )
        .init();

    let result = match cli.subcommand() {
        Some(("init", _)) => init(),
        _ => match cli.get_one::<PathBuf>("config") {
            Some(path) => serve(path).await,
            None => Err("missing config file, run `oneanime init` for a template".into()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

fn init() -> Result<(), Box<dyn std::error::Error>> {
    let written = write_template(std::env::current_dir()?)?;
    tracing::info!(path = %written.display(), "Template config file copied");
    Ok(())
}

async fn serve(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_file(config_path)?;
    let server = ImageServer::new(config)?;

    server.run_until(shutdown_signal()).await?;

    let stats = server.stats().snapshot();
    tracing::info!(
        requests = stats.requests,
        not_found = stats.not_found,
        originals = stats.originals,
        derived = stats.derived,
        cache_hits = stats.cache_hits,
        hit_ratio = stats.hit_ratio(),
        encodes = stats.encodes,
        failures = stats.failures,
        uptime_secs = stats.uptime.as_secs(),
        "Server stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl+C, running until killed");
        std::future::pending::<()>().await;
    }
}
