use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use std::path::PathBuf;
use std::fs;

/// RUST_LOG, when set and parseable, replaces the defaults entirely
fn log_filter(verbose: bool, rust_log: Option<&str>) -> Result<EnvFilter> {
    let default_directives = if verbose {
        "careerscrape=debug,warn"
    } else {
        "careerscrape=info,warn"
    };
    let filter = match rust_log {
        Some(directives) => EnvFilter::try_new(directives)
            .or_else(|_| EnvFilter::try_new(default_directives))?,
        None => EnvFilter::try_new(default_directives)?,
    };
    Ok(filter)
}

/// Initialize the logging system
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = log_filter(verbose, rust_log.as_deref())?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);

    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(log_file)?;
        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    Ok(())
}
