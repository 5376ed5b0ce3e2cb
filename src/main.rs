use clap::Parser;
use log::{error, info};
use rg_pipe::{App, AppConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// rg-pipe - Formatted system metrics and window manager state on stdout
#[derive(Parser, Debug, Clone)]
#[command(name = "rg-pipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; a relative path that does not exist is looked up
    /// in the config directory
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// Run every worker for a single cycle and exit
    #[arg(long = "once")]
    once: bool,

    /// List available receivers
    #[arg(short = 'l', long = "list")]
    list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Level 0 (default): warn only, so stdout stays a clean pipe
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Starting rg-pipe v{}", env!("CARGO_PKG_VERSION"));

    let registry = rg_pipe_receivers::registry();

    if cli.list {
        for name in registry.list_receivers() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let (config, path) = match AppConfig::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Loaded {} entries from {}",
        config.entries.len(),
        path.display()
    );

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            stopper.cancel();
        }
    });

    match App::new(config, registry)
        .once(cli.once)
        .run(std::io::stdout(), cancel)
        .await
    {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
