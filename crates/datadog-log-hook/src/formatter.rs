// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Encoding of a [`LogEntry`] into the opaque record stored in a batch.
//!
//! The batching engine never looks inside a record: whatever bytes a
//! [`Formatter`] returns are placed verbatim between the commas of the wire
//! payload. A formatter is therefore expected to produce one JSON value per
//! entry.

use crate::entry::{level_name, LogEntry};
use crate::errors::FormatError;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Turns one entry into one encoded record.
pub trait Formatter: Send + Sync + Debug {
    fn format(&self, entry: &LogEntry) -> Result<Vec<u8>, FormatError>;
}

/// Attribute names used for the three built-in entry properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub time: String,
    pub level: String,
    pub message: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            level: "level".to_string(),
            message: "msg".to_string(),
        }
    }
}

impl FieldMap {
    /// Names recognized by the Datadog logs pipeline without any remapping.
    #[must_use]
    pub fn datadog() -> Self {
        Self {
            time: "timestamp".to_string(),
            level: "level".to_string(),
            message: "message".to_string(),
        }
    }

    fn is_reserved(&self, key: &str) -> bool {
        key == self.time || key == self.level || key == self.message
    }
}

/// Encodes an entry as a single JSON object.
///
/// User fields whose name collides with one of the [`FieldMap`] names are
/// kept under `fields.<name>` instead of overwriting the built-in value.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub field_map: FieldMap,
}

impl JsonFormatter {
    #[must_use]
    pub fn new(field_map: FieldMap) -> Self {
        Self { field_map }
    }

    /// Formatter used when [`crate::config::Options::formatter`] is unset.
    #[must_use]
    pub fn datadog() -> Self {
        Self::new(FieldMap::datadog())
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, entry: &LogEntry) -> Result<Vec<u8>, FormatError> {
        let mut object = Map::with_capacity(entry.fields.len() + 3);
        for (key, value) in &entry.fields {
            if self.field_map.is_reserved(key) {
                object.insert(format!("fields.{key}"), value.clone());
            } else {
                object.insert(key.clone(), value.clone());
            }
        }

        object.insert(
            self.field_map.time.clone(),
            Value::String(entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        object.insert(
            self.field_map.level.clone(),
            Value::String(level_name(entry.level).to_string()),
        );
        object.insert(
            self.field_map.message.clone(),
            Value::String(entry.message.clone()),
        );

        Ok(serde_json::to_vec(&Value::Object(object))?)
    }
}
