//! tattle: run an interactive shell through a pty and mirror its output to a
//! remote collector.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tattle_lib::config::{self, TattleConfig};
use tattle_lib::{logging, TattleError};

#[derive(Parser, Debug)]
#[command(name = "tattle")]
#[command(version, about = "Relay a shell session and mirror it to a collector")]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "TATTLE_CONFIG")]
    config: Option<PathBuf>,

    /// URL batches are posted to.
    #[arg(long, env = "TATTLE_COLLECTOR_URL")]
    collector_url: Option<String>,

    /// URL session open/close announcements are posted to.
    #[arg(long)]
    session_url: Option<String>,

    /// Delay before draining queued events, in milliseconds.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Shell to run instead of $SHELL.
    #[arg(long)]
    shell: Option<String>,

    /// Drop events still queued when the shell exits.
    #[arg(long)]
    no_flush_on_exit: bool,

    /// Log file (logs never go to the terminal).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output logs as JSON.
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(self, mut config: TattleConfig) -> TattleConfig {
        if let Some(url) = self.collector_url {
            config.collector_url = url;
        }
        if self.session_url.is_some() {
            config.session_url = self.session_url;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        if self.shell.is_some() {
            config.shell = self.shell;
        }
        if self.no_flush_on_exit {
            config.flush_on_exit = false;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        config
    }
}

/// Load the config file and apply flag overrides. A broken file falls back
/// to defaults and the error is handed back for reporting after logging
/// starts.
fn resolve_config(args: Args) -> (TattleConfig, Option<TattleError>) {
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let (base, error) = match TattleConfig::load_from(&path) {
        Ok(config) => (config, None),
        Err(e) => (TattleConfig::default(), Some(e)),
    };
    (args.apply(base), error)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let log_json = args.log_json;
    let (config, config_error) = resolve_config(args);

    if let Err(e) = logging::init_tracing(&config.log_path(), log_json) {
        eprintln!("tattle: logging disabled: {}", e);
    }
    if let Some(e) = config_error {
        tracing::warn!("Using default config: {}", e);
        eprintln!("tattle: using default config: {}", e);
    }

    match tattle_lib::run(&config) {
        Ok(summary) => {
            let code = summary.exit_code.unwrap_or(0).min(255) as u8;
            ExitCode::from(code)
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("tattle: {}", e);
            ExitCode::FAILURE
        }
    }
}
