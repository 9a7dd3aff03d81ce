use anyhow::Result;
use std::sync::Arc;
use terminal_command_keys::config::Config;
use terminal_command_keys::driver::Driver;
use terminal_command_keys::extension::Extension;
use terminal_command_keys::host::shell::{emit, ShellHost};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt::format::FmtSpan, FmtSubscriber};

fn setup_logging(log_level_str: &str) {
    let level = match log_level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("terminal_command_keys={}", level)));

    // stdout carries the request/response protocol, so logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_span_events(FmtSpan::CLOSE)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::load()?);
    setup_logging(&config.log_level);

    tracing::info!(version = %env!("CARGO_PKG_VERSION"), "Starting terminal-command-keys host");
    tracing::debug!("Loaded configuration: {:?}", config);

    let host = Arc::new(ShellHost::new(config.clone()));
    let extension = Extension::activate(host.clone(), host.clone(), &config);
    let driver = Driver::new(host, extension);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(response) = driver.handle_line(&line).await {
                        emit(&response);
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    let disposed = driver.shutdown();
    tracing::info!(disposed, "Host shutdown.");
    Ok(())
}
