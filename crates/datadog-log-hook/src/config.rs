// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hook options and their resolution into a complete [`Config`].
//!
//! Every [`Options`] field may be left unset; [`Options::resolve`] fills the
//! gaps with the defaults from [`crate::constants`]. Zero durations, a zero
//! batch size and an empty URL count as unset.

use crate::constants::{
    intake_url_for_site, DEFAULT_FLUSH_PERIOD, DEFAULT_MAX_BATCH_SIZE, DEFAULT_POST_URL,
    DEFAULT_TIMEOUT, ENV_API_KEY, ENV_COMPRESSION_LEVEL, ENV_FLUSH_PERIOD, ENV_HTTPS_PROXY,
    ENV_MAX_BATCH_SIZE, ENV_POST_URL, ENV_PROXY_HTTPS, ENV_SITE, ENV_TIMEOUT,
};
use crate::errors::{ConfigError, FlushError};
use crate::formatter::{Formatter, JsonFormatter};
use std::env;
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Receives flush errors that have no caller to be returned to: timer
/// triggered flushes and batches shipped in the background by
/// [`crate::Hook::enqueue`].
pub type ErrorHandler = Arc<dyn Fn(&FlushError) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Options {
    /// Idle time after which the current batch is flushed.
    pub flush_period: Option<Duration>,
    /// Number of records that forces an immediate flush.
    pub max_batch_size: Option<usize>,
    /// Intake URL batches are posted to.
    pub post_url: Option<String>,
    /// Encoder applied to every entry.
    pub formatter: Option<Arc<dyn Formatter>>,
    /// Per-request HTTP timeout.
    pub timeout: Option<Duration>,
    pub https_proxy: Option<String>,
    /// zstd level; payloads are sent uncompressed when unset.
    pub compression_level: Option<i32>,
    pub error_handler: Option<ErrorHandler>,
}

impl Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("flush_period", &self.flush_period)
            .field("max_batch_size", &self.max_batch_size)
            .field("post_url", &self.post_url)
            .field("formatter", &self.formatter)
            .field("timeout", &self.timeout)
            .field("https_proxy", &self.https_proxy)
            .field("compression_level", &self.compression_level)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "ErrorHandler"))
            .finish()
    }
}

impl Options {
    #[must_use]
    pub fn flush_period(mut self, period: Duration) -> Self {
        self.flush_period = Some(period);
        self
    }

    #[must_use]
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    #[must_use]
    pub fn post_url(mut self, url: impl Into<String>) -> Self {
        self.post_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn https_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(proxy.into());
        self
    }

    #[must_use]
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    #[must_use]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Reads options from the environment and validates them.
    ///
    /// `DD_LOGS_HOOK_URL` takes precedence over the intake URL derived from
    /// `DD_SITE`. Variables that are unset or blank are left to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let post_url = match env::var(ENV_POST_URL) {
            Ok(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
            _ => match env::var(ENV_SITE) {
                Ok(site) if site.trim().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "{ENV_SITE} cannot be empty"
                    )));
                }
                Ok(site) => Some(intake_url_for_site(&site)),
                Err(_) => None,
            },
        };

        let options = Options {
            flush_period: parse_env::<u64>(ENV_FLUSH_PERIOD)?.map(Duration::from_secs),
            max_batch_size: parse_env(ENV_MAX_BATCH_SIZE)?,
            post_url,
            formatter: None,
            timeout: parse_env::<u64>(ENV_TIMEOUT)?.map(Duration::from_secs),
            https_proxy: env::var(ENV_PROXY_HTTPS)
                .or_else(|_| env::var(ENV_HTTPS_PROXY))
                .ok()
                .filter(|proxy| !proxy.trim().is_empty()),
            compression_level: parse_env(ENV_COMPRESSION_LEVEL)?,
            error_handler: None,
        };

        options.validate()?;
        Ok(options)
    }

    /// Checks the values that can be checked before any request is made.
    ///
    /// [`crate::Hook::new`] does not call this: a malformed URL passed
    /// programmatically surfaces as [`FlushError::Request`] on every flush.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = self.post_url.as_deref().filter(|url| !url.is_empty()) {
            if let Err(e) = reqwest::Url::parse(url) {
                return Err(ConfigError::Invalid(format!(
                    "invalid intake URL '{url}': {e}"
                )));
            }
        }

        if let Some(level) = self.compression_level {
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(ConfigError::Invalid(format!(
                    "compression level {level} is outside {}..={}",
                    range.start(),
                    range.end()
                )));
            }
        }

        Ok(())
    }

    /// Fills every unset field with its default.
    #[must_use]
    pub fn resolve(self) -> Config {
        Config {
            flush_period: self
                .flush_period
                .filter(|period| !period.is_zero())
                .unwrap_or(DEFAULT_FLUSH_PERIOD),
            max_batch_size: self
                .max_batch_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            post_url: self
                .post_url
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_POST_URL.to_string()),
            formatter: self
                .formatter
                .unwrap_or_else(|| Arc::new(JsonFormatter::datadog())),
            timeout: self
                .timeout
                .filter(|timeout| !timeout.is_zero())
                .unwrap_or(DEFAULT_TIMEOUT),
            https_proxy: self.https_proxy,
            compression_level: self.compression_level,
            error_handler: self.error_handler,
        }
    }
}

/// Reads the API key from `DD_API_KEY`.
#[must_use]
pub fn api_key_from_env() -> Option<String> {
    env::var(ENV_API_KEY)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::Invalid(format!("{name} has an invalid value: '{raw}'"))
        }),
        _ => Ok(None),
    }
}

/// Fully resolved hook configuration. Immutable once the hook is built.
#[derive(Clone)]
pub struct Config {
    pub flush_period: Duration,
    pub max_batch_size: usize,
    pub post_url: String,
    pub formatter: Arc<dyn Formatter>,
    pub timeout: Duration,
    pub https_proxy: Option<String>,
    pub compression_level: Option<i32>,
    pub error_handler: Option<ErrorHandler>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("flush_period", &self.flush_period)
            .field("max_batch_size", &self.max_batch_size)
            .field("post_url", &self.post_url)
            .field("formatter", &self.formatter)
            .field("timeout", &self.timeout)
            .field("https_proxy", &self.https_proxy)
            .field("compression_level", &self.compression_level)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Options::default().resolve()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        ENV_API_KEY,
        ENV_SITE,
        ENV_POST_URL,
        ENV_FLUSH_PERIOD,
        ENV_MAX_BATCH_SIZE,
        ENV_TIMEOUT,
        ENV_COMPRESSION_LEVEL,
        ENV_PROXY_HTTPS,
        ENV_HTTPS_PROXY,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let config = Options::default().resolve();
        assert_eq!(config.flush_period, DEFAULT_FLUSH_PERIOD);
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(config.post_url, DEFAULT_POST_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.https_proxy.is_none());
        assert!(config.compression_level.is_none());
        assert!(config.error_handler.is_none());
        assert!(format!("{:?}", config.formatter).contains("timestamp"));
    }

    #[test]
    fn test_resolve_treats_zero_as_unset() {
        let config = Options::default()
            .flush_period(Duration::ZERO)
            .max_batch_size(0)
            .post_url("")
            .timeout(Duration::ZERO)
            .resolve();
        assert_eq!(config.flush_period, DEFAULT_FLUSH_PERIOD);
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(config.post_url, DEFAULT_POST_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let config = Options::default()
            .flush_period(Duration::from_secs(5))
            .max_batch_size(2)
            .post_url("http://localhost:8080/v1/input")
            .timeout(Duration::from_secs(1))
            .https_proxy("https://proxy.local:3128")
            .compression_level(6)
            .resolve();
        assert_eq!(config.flush_period, Duration::from_secs(5));
        assert_eq!(config.max_batch_size, 2);
        assert_eq!(config.post_url, "http://localhost:8080/v1/input");
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.https_proxy.as_deref(), Some("https://proxy.local:3128"));
        assert_eq!(config.compression_level, Some(6));
    }

    #[test]
    fn test_validate() {
        assert!(Options::default().validate().is_ok());
        assert!(Options::default().post_url("not a url").validate().is_err());
        assert!(Options::default().compression_level(3).validate().is_ok());
        assert!(Options::default().compression_level(1000).validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_empty() {
        clear_env();
        let options = Options::from_env().unwrap();
        assert!(options.flush_period.is_none());
        assert!(options.max_batch_size.is_none());
        assert!(options.post_url.is_none());
        assert!(options.https_proxy.is_none());
        assert!(api_key_from_env().is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        clear_env();
        env::set_var(ENV_API_KEY, " my-key ");
        env::set_var(ENV_SITE, "datadoghq.com");
        env::set_var(ENV_FLUSH_PERIOD, "12");
        env::set_var(ENV_MAX_BATCH_SIZE, "100");
        env::set_var(ENV_TIMEOUT, "3");
        env::set_var(ENV_COMPRESSION_LEVEL, "6");
        env::set_var(ENV_HTTPS_PROXY, "https://proxy.local:3128");

        let options = Options::from_env().unwrap();
        assert_eq!(options.flush_period, Some(Duration::from_secs(12)));
        assert_eq!(options.max_batch_size, Some(100));
        assert_eq!(
            options.post_url.as_deref(),
            Some("https://http-intake.logs.datadoghq.com/v1/input")
        );
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.compression_level, Some(6));
        assert_eq!(options.https_proxy.as_deref(), Some("https://proxy.local:3128"));
        assert_eq!(api_key_from_env().as_deref(), Some("my-key"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_url_overrides_site() {
        clear_env();
        env::set_var(ENV_SITE, "datadoghq.com");
        env::set_var(ENV_POST_URL, "http://127.0.0.1:9000/v1/input");
        env::set_var(ENV_PROXY_HTTPS, "https://dd-proxy.local:3128");
        env::set_var(ENV_HTTPS_PROXY, "https://other-proxy.local:3128");

        let options = Options::from_env().unwrap();
        assert_eq!(
            options.post_url.as_deref(),
            Some("http://127.0.0.1:9000/v1/input")
        );
        assert_eq!(
            options.https_proxy.as_deref(),
            Some("https://dd-proxy.local:3128")
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        clear_env();
        env::set_var(ENV_MAX_BATCH_SIZE, "lots");
        assert!(Options::from_env().is_err());

        clear_env();
        env::set_var(ENV_SITE, "   ");
        let err = Options::from_env().unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: DD_SITE cannot be empty");

        clear_env();
        env::set_var(ENV_COMPRESSION_LEVEL, "99");
        assert!(Options::from_env().is_err());
        clear_env();
    }
}
