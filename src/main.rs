//! `pop3d`: serve the maildrops under a base directory over POP3.

use clap::Parser;
use pop3_maildrop::config::Pop3Config;
use pop3_maildrop::error::{Pop3Error, Result};
use pop3_maildrop::transport::start_server;
use pop3_maildrop::utils::logging::init_logging;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

/// POP3 maildrop server
#[derive(Parser, Debug)]
#[command(name = "pop3d")]
#[command(about = "Serve per-user maildrop directories over POP3")]
#[command(version)]
struct Cli {
    /// TCP port to listen on
    port: u16,

    /// Directory holding one maildrop subdirectory per user
    base_directory: PathBuf,

    /// TOML configuration file; command-line arguments take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pop3d: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("pop3d: {e}");
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

/// Defaults, then the config file, then `POP3_*` variables, then the command line
fn load_config(cli: &Cli) -> Result<Pop3Config> {
    let mut config = match &cli.config {
        Some(path) => Pop3Config::from_file(path)?,
        None => Pop3Config::default(),
    };
    config.apply_env()?;

    config.server.port = cli.port;
    config.server.base_directory = cli.base_directory.clone();
    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }
    if cli.verbose {
        config.logging.log_level = Level::DEBUG;
    }
    if cli.json {
        config.logging.json_format = true;
    }

    Ok(config)
}

fn run(config: Pop3Config) -> Result<()> {
    config.validate_strict()?;

    let base = &config.server.base_directory;
    std::fs::create_dir_all(base).map_err(|e| {
        Pop3Error::ConfigError(format!(
            "Cannot create base directory {}: {e}",
            base.display()
        ))
    })?;

    info!(
        app = %config.logging.app_name,
        port = config.server.port,
        base_directory = %base.display(),
        "Starting POP3 server"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(start_server(config.server))
}
