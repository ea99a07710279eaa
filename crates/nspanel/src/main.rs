mod cli;
mod commands;
mod error;

use std::ffi::OsStr;
use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let guard = init_tracing(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        // `exit` skips destructors; flush the log writer first.
        drop(guard);
        std::process::exit(code);
    }
}

/// Stderr by default, or a non-blocking file writer whose guard must live
/// until the process exits.
fn init_tracing(global: &GlobalOpts) -> Option<WorkerGuard> {
    let level = match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard) = match &global.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(OsStr::new("nspanel.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if global.json {
        registry.with(fmt::layer().json().with_writer(writer)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(global.log_file.is_none())
                    .with_target(false),
            )
            .init();
    }
    guard
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = nspanel_config::load(cli.global.config.as_deref())?;
    tracing::debug!(panels = config.panels.len(), command = ?cli.command, "configuration loaded");

    match cli.command {
        Command::Check => commands::check::handle(&config),
        Command::Run => commands::run::handle(config).await,
    }
}
