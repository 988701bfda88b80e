// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the hook.
//!
//! Every failure is local to a single call: an entry that cannot be encoded is
//! dropped, and a batch that cannot be shipped is dropped. Nothing is retried.

use thiserror::Error;

/// The formatter could not turn an entry into a record.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to serialize log entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to format log entry: {0}")]
    Custom(String),
}

/// A flush attempt failed after its batch was detached. The batch is lost.
#[derive(Debug, Error)]
pub enum FlushError {
    /// The wire payload could not be assembled or compressed.
    #[error("failed to build payload: {0}")]
    Payload(#[source] std::io::Error),

    /// The request could not be built, e.g. a malformed intake URL.
    #[error("failed to build request for {url}: {reason}")]
    Request { url: String, reason: String },

    /// The request was built but sending it failed (DNS, connect, timeout).
    #[error("failed to send logs: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors surfaced by [`crate::Hook`].
#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Encoding(#[from] FormatError),

    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error("no tokio runtime available: {0}")]
    Runtime(String),
}

/// Configuration could not be read or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
