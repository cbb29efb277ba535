//! `linact`: command-line front end for the actuator controller.

mod backend;
mod cli;
mod commands;
mod error_fmt;
mod rt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cli::{Cli, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use error_fmt::{CommandError, exit_code_for_error, format_error_json, humanize};
use linact_config::Config;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(&cli) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = ?err, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = load_config(&cli.config)?;
    init_tracing(cli, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .map_err(|e| eyre::eyre!("install ctrl-c handler: {e}"))?;
    }

    commands::execute(cli, &cfg, shutdown)
}

/// Read, parse and validate the config. The default path may be absent,
/// in which case the built-in defaults apply.
fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| CommandError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = linact_config::load_toml(&text)
        .map_err(|e| CommandError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| CommandError::Config(format!("{e}")))?;
    Ok(cfg)
}

/// Console logs on stderr (pretty or JSON), plus an optional JSON-lines file
/// sink from `[logging]`. `RUST_LOG` overrides `--log-level`.
fn init_tracing(cli: &Cli, logging: &linact_config::Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CommandError::Config(format!("--log-level {}: {e}", cli.log_level)))?;
    let console: Box<dyn Layer<Registry> + Send + Sync> = if cli.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| CommandError::Config("logging.file has no file name".into()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let level = logging.level.as_deref().unwrap_or("info");
            let filter = EnvFilter::try_new(level)
                .map_err(|e| CommandError::Config(format!("logging.level {level}: {e}")))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("tracing init: {e}"))
}
