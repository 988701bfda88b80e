// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Datadog log hook
//!
//! Batches structured log entries and ships each batch to the Datadog logs
//! intake as a single HTTP request.
//!
//! ```text
//!   fire / enqueue ──> Formatter ──> BatchBuffer ──(full)──┐
//!                                                          ├──> Shipper ──> POST [r1,r2,...]
//!   FlushScheduler ──(idle period elapsed)────────────────┘         │
//!          ^                                                          │
//!          └──────────────────────── rearm ───────────────────────────┘
//! ```
//!
//! A batch is flushed either by the entry that fills it or by the timer once
//! `flush_period` passes without a flush. Failed batches are dropped.
//!
//! ```no_run
//! use datadog_log_hook::{Hook, LogEntry, Options};
//! use tracing::Level;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let hook = Hook::new("<DD_API_KEY>", Options::default().max_batch_size(50))?;
//! hook.fire(&LogEntry::new(Level::INFO, "user logged in").with_field("user_id", 42))
//!     .await?;
//! hook.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod constants;
pub mod entry;
pub mod errors;
pub mod formatter;
pub mod hook;
pub mod http;
pub mod layer;
pub mod payload;
mod scheduler;
pub mod shipper;

pub use batch::Batch;
pub use config::{api_key_from_env, Config, ErrorHandler, Options};
pub use entry::LogEntry;
pub use errors::{ConfigError, FlushError, FormatError, HookError};
pub use formatter::{FieldMap, Formatter, JsonFormatter};
pub use hook::Hook;
pub use layer::HookLayer;
