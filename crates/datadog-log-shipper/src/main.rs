// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;

use datadog_log_hook::{api_key_from_env, Hook, LogEntry, Options};
use serde_json::Value;

const MESSAGE_KEYS: [&str; 2] = ["message", "msg"];
const LEVEL_KEYS: [&str; 2] = ["level", "status"];

#[tokio::main]
pub async fn main() {
    let log_level = env::var("DD_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let Some(api_key) = api_key_from_env() else {
        error!("DD_API_KEY is not set. Shutting down log shipper.");
        return;
    };

    let options = match Options::from_env() {
        Ok(options) => options,
        Err(e) => {
            error!("{e}. Shutting down log shipper.");
            return;
        }
    };

    let hook = match Hook::new(api_key, options) {
        Ok(hook) => hook,
        Err(e) => {
            error!("Failed to start log hook: {e}");
            return;
        }
    };

    info!(
        "Shipping stdin to {} every {:?} or {} records",
        hook.config().post_url,
        hook.config().flush_period,
        hook.config().max_batch_size
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Err(e) = hook.fire(&entry_from_line(&line)).await {
                        error!("Failed to ship log line: {e}");
                    }
                }
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Received interrupt");
                break;
            }
        }
    }

    match hook.shutdown().await {
        Ok(()) => info!("Log shipper stopped"),
        Err(e) => error!("Final flush failed: {e}"),
    }
}

/// A line holding a JSON object keeps its attributes as fields; any other
/// line becomes an info entry with the raw line as message.
fn entry_from_line(line: &str) -> LogEntry {
    let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(line) else {
        return LogEntry::new(Level::INFO, line);
    };

    let message = MESSAGE_KEYS
        .iter()
        .find_map(|key| fields.remove(*key))
        .map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_default();

    let parsed = LEVEL_KEYS.iter().find_map(|key| match fields.get(*key) {
        Some(Value::String(s)) => parse_level(s).map(|level| (*key, level)),
        _ => None,
    });
    let level = match parsed {
        Some((key, level)) => {
            fields.remove(key);
            level
        }
        None => Level::INFO,
    };

    let mut entry = LogEntry::new(level, message);
    entry.fields = fields;
    entry
}

fn parse_level(raw: &str) -> Option<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" | "notice" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "err" | "critical" | "fatal" | "panic" => Some(Level::ERROR),
        _ => None,
    }
}
