//! Logging setup walkthrough.
//!
//! Run with:
//! ```bash
//! cargo run --example logging_demo
//! cargo run --example logging_demo -- json
//! cargo run --example logging_demo -- compact "core_runtime=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::env;
use std::time::Duration;
use tracing::{debug, info, instrument, span, trace, warn, Level};

#[core_async::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some(_) => LogFormat::Pretty,
        None => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_redaction(true)
        .with_spans(true)
        .with_target(true);
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    init_logging(config).expect("Failed to initialize logging");
    info!(format = ?format, "Logging initialized");

    simulated_download("lesson-12", 48_000).await;
    secrets_stay_out_of_logs();
}

#[instrument(fields(content_id = %content_id))]
async fn simulated_download(content_id: &str, total: u64) {
    info!(total, "Download started");

    let mut received = 0;
    while received < total {
        received += 16_000;
        trace!(received, "Chunk written");
        debug!(percent = received * 100 / total, "Progress");
        core_async::time::sleep(Duration::from_millis(5)).await;
    }

    let path = format!("/home/ana/.local/share/coursevault/secure_content/content_{content_id}_encrypted.mp4");
    info!(file = %strip_path(&path), bytes = received, "Download completed");
}

fn secrets_stay_out_of_logs() {
    let span = span!(Level::INFO, "key_provisioning");
    let _enter = span.enter();

    let key_hex = "8f1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c";
    info!(
        content_key = %redact_if_sensitive("content_key", key_hex),
        "Content key loaded"
    );
    warn!("Content key was regenerated; existing downloads will be purged");
}
