// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults applied by [`crate::config::Options::resolve`] and the environment
//! variable names read by [`crate::config::Options::from_env`].

use std::time::Duration;

/// Idle time after which the current batch is flushed, whatever its size.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(30);

/// Number of records that forces an immediate flush.
///
/// A batch size of 1 ships every entry as soon as it is fired.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 30;

/// Datadog EU logs intake.
pub const DEFAULT_POST_URL: &str = "https://http-intake.logs.datadoghq.eu/v1/input";

/// Per-request timeout of the HTTP client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key on every intake request.
pub const API_KEY_HEADER: &str = "DD-API-KEY";

/// Tracing targets the [`crate::layer::HookLayer`] never forwards, so shipping
/// a batch cannot feed its own diagnostics back into the buffer.
pub(crate) const INTERNAL_TARGETS: &[&str] = &[
    "datadog_log_hook",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio",
];

pub const ENV_API_KEY: &str = "DD_API_KEY";
pub const ENV_SITE: &str = "DD_SITE";
pub const ENV_POST_URL: &str = "DD_LOGS_HOOK_URL";
pub const ENV_FLUSH_PERIOD: &str = "DD_LOGS_HOOK_FLUSH_PERIOD";
pub const ENV_MAX_BATCH_SIZE: &str = "DD_LOGS_HOOK_MAX_BATCH_SIZE";
pub const ENV_TIMEOUT: &str = "DD_LOGS_HOOK_TIMEOUT";
pub const ENV_COMPRESSION_LEVEL: &str = "DD_LOGS_HOOK_COMPRESSION_LEVEL";
pub const ENV_PROXY_HTTPS: &str = "DD_PROXY_HTTPS";
pub const ENV_HTTPS_PROXY: &str = "HTTPS_PROXY";

/// Builds the logs intake URL for a Datadog site such as `datadoghq.com`.
#[must_use]
pub fn intake_url_for_site(site: &str) -> String {
    format!("https://http-intake.logs.{}/v1/input", site.trim())
}
