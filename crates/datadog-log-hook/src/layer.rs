// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bridge from `tracing` events to the hook.

use crate::constants::INTERNAL_TARGETS;
use crate::entry::LogEntry;
use crate::hook::Hook;
use chrono::Utc;
use serde_json::{Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{error, Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

const LOGGER_NAME_FIELD: &str = "logger.name";

/// Turns every tracing event into a [`LogEntry`] and enqueues it on a [`Hook`].
///
/// Events emitted by this crate and by the HTTP stack it uses are skipped, so
/// shipping a batch cannot produce more records to ship.
#[derive(Debug, Clone)]
pub struct HookLayer {
    hook: Hook,
}

impl HookLayer {
    #[must_use]
    pub fn new(hook: Hook) -> Self {
        Self { hook }
    }
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|internal| {
        target == *internal
            || target
                .strip_prefix(internal)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

impl<S: Subscriber> Layer<S> for HookLayer {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.hook.levels().contains(metadata.level())
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;
        fields.insert(
            LOGGER_NAME_FIELD.to_string(),
            Value::String(metadata.target().to_string()),
        );
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: *metadata.level(),
            message: visitor.message.unwrap_or_default(),
            fields,
        };

        if let Err(e) = self.hook.enqueue(&entry) {
            error!("LOGS | Failed to encode log entry: {}", e);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON representation
        let value = serde_json::Number::from_f64(value)
            .map_or_else(|| Value::String(value.to_string()), Value::Number);
        self.insert(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}
