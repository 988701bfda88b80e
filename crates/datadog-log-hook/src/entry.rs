// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::Level;

/// One structured log event: severity, message, timestamp and arbitrary fields.
///
/// Entries are built by the application (or by [`crate::layer::HookLayer`] from
/// tracing events) and handed to [`crate::Hook::fire`], which turns them into
/// opaque records with the configured [`crate::formatter::Formatter`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Map<String, Value>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time and no fields.
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Lowercase level name as the logs intake expects it in the `level` attribute.
#[must_use]
pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warning",
        Level::ERROR => "error",
    }
}
