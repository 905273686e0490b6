//! Dialectic CLI - a headless page session driven from stdin.
//!
//! # Architecture
//!
//! ```text
//! main() -> Gateway::start(config, SettingsStore) -> GatewayHandle
//!                                                       |
//!                                                       v
//!            stdin lines -> Command -> PageRuntime<GatewayHandle> -> stdout
//! ```
//!
//! # Event Loop
//!
//! One `select!` multiplexes:
//!
//! 1. stdin lines, parsed into [`command::Command`]
//! 2. completions of gateway calls queued by the page runtime
//! 3. settings broadcasts from the gateway
//! 4. Ctrl-C
//!
//! After each wakeup, rendered output is flushed to stdout.

mod command;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dialectic_config::{DialecticConfig, ResolvedConfig, dialectic_dir};
use dialectic_gateway::{FileBackend, Gateway, GatewayHandle, SettingsStore};
use dialectic_page::{PageEvent, PageRuntime};

use command::{Command, HELP};

const DEFAULT_HOST: &str = "localhost";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, stay quiet rather than interleave logs with the
    // transcript on stdout.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.dialectic/logs/dialectic.log
    if let Some(dir) = dialectic_dir() {
        candidates.push(dir.join("logs").join("dialectic.log"));
    }

    // Fallback: ./.dialectic/logs/dialectic.log
    candidates.push(PathBuf::from(".dialectic").join("logs").join("dialectic.log"));

    candidates
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = DialecticConfig::load()
        .context("failed to load config")?
        .unwrap_or_default();
    let resolved = ResolvedConfig::from_config(&config).context("invalid config")?;

    let store = SettingsStore::open(FileBackend::new(&resolved.settings_path));
    let gateway =
        Gateway::start(resolved.gateway.clone(), store).context("failed to start gateway")?;

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let mut runtime = PageRuntime::connect(gateway.clone(), &host, &resolved.page).await;
    runtime.dispatch(PageEvent::LauncherClicked, Instant::now());

    let mut stdout = tokio::io::stdout();
    write_out(&mut stdout, HELP).await?;

    let result = run(&gateway, &mut runtime, &mut stdout).await;
    gateway.shutdown();
    result
}

async fn run(
    gateway: &GatewayHandle,
    runtime: &mut PageRuntime<GatewayHandle>,
    stdout: &mut Stdout,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut settings_rx = gateway.subscribe_settings();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        let text = execute(gateway, runtime, command).await;
                        write_out(stdout, &text).await?;
                    }
                    Err(e) => write_out(stdout, &format!("{e}\n")).await?,
                }
            }
            Some(completion) = runtime.next_completion(), if runtime.has_pending() => {
                runtime.apply_completion(completion, Instant::now());
            }
            received = settings_rx.recv() => match received {
                Ok(settings) => runtime.dispatch(PageEvent::SettingsChanged(settings), Instant::now()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Settings broadcasts lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Settings broadcast closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }

        let output = runtime.take_output();
        if !output.is_empty() {
            write_out(stdout, &output.concat()).await?;
        }
    }

    Ok(())
}

/// Run one command. Returns text to print immediately.
async fn execute(
    gateway: &GatewayHandle,
    runtime: &mut PageRuntime<GatewayHandle>,
    command: Command,
) -> String {
    let now = Instant::now();
    match command {
        Command::Submit(text) => {
            if !runtime.chat().is_open() {
                runtime.dispatch(PageEvent::LauncherClicked, now);
            }
            runtime.dispatch(PageEvent::ChatSubmit(text), now);
            String::new()
        }
        Command::DisplayMode(mode) => {
            runtime.dispatch(PageEvent::SetDisplayMode(mode), now);
            if runtime.chat().latest_response().is_none() {
                return "Nothing to show yet.\n".to_string();
            }
            String::new()
        }
        Command::Set(patch) => match gateway.update_settings(patch).await {
            Ok(settings) => {
                runtime.dispatch(PageEvent::SettingsChanged(settings), now);
                "Settings updated.\n".to_string()
            }
            Err(e) => format!("Failed to update settings: {}\n", e.message),
        },
        Command::Settings => match gateway.get_settings().await {
            Ok(settings) => serde_json::to_string_pretty(&settings)
                .map(|json| format!("{json}\n"))
                .unwrap_or_else(|e| format!("Failed to render settings: {e}\n")),
            Err(e) => format!("Failed to read settings: {}\n", e.message),
        },
        Command::Health => match gateway.check_health().await {
            Ok(body) => format!("Analysis service is up: {body}\n"),
            Err(e) => format!("Analysis service is unavailable ({}).\n", e.kind),
        },
        Command::Help => HELP.to_string(),
        Command::Quit | Command::Empty => String::new(),
    }
}

async fn write_out(stdout: &mut Stdout, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
