//! Client configuration.
//!
//! [`LogtreeConfig`] is built in code with `with_*` setters or loaded from the
//! `[logtree]` section of an INI file via [`LogtreeConfig::from_ini_file`].
//! [`Logtree::with_config`](crate::Logtree::with_config) validates it before
//! spawning delivery workers.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Production endpoint of the Logtree service.
pub const DEFAULT_BASE_URL: &str = "https://logtree-server.onrender.com/api/v1";
/// Default connection timeout for delivery requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default overall timeout for a single delivery request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of delivery worker threads.
pub const DEFAULT_WORKERS: usize = 4;
/// Default capacity of the hand-off channel feeding the workers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// INI section read by [`LogtreeConfig::from_ini_file`].
pub const INI_SECTION: &str = "logtree";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path} doesn't exist")]
    NotFound { path: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is invalid: {source}")]
    Parse {
        path: String,
        #[source]
        source: ini::ParseError,
    },
    #[error("missing required key `{0}` in [logtree]")]
    MissingKey(&'static str),
    #[error("invalid value {value:?} for `{key}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Tenant credentials sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    publishable_api_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(publishable_api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            publishable_api_key: publishable_api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Value of the `x-logtree-key` header.
    pub fn publishable_api_key(&self) -> &str {
        &self.publishable_api_key
    }

    /// Value of the `authorization` header.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("publishable_api_key", &self.publishable_api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Configuration consumed by [`Logtree`](crate::Logtree).
#[derive(Clone, Debug)]
pub struct LogtreeConfig {
    pub credentials: Credentials,
    /// Write delivery failures to the `log` facade instead of discarding them.
    pub should_log_errors: bool,
    /// Base URL the channel paths are appended to.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound on a whole request, including reading the response.
    pub request_timeout: Duration,
    /// Number of worker threads performing deliveries concurrently.
    pub workers: usize,
    /// Jobs accepted before new sends are dropped.
    pub capacity: usize,
    /// Minimum interval between drop warnings.
    pub warn_interval: Duration,
}

impl LogtreeConfig {
    pub fn new(publishable_api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(publishable_api_key, secret_key),
            should_log_errors: true,
            base_url: DEFAULT_BASE_URL.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }

    pub fn with_should_log_errors(mut self, should_log_errors: bool) -> Self {
        self.should_log_errors = should_log_errors;
        self
    }

    /// Override the service URL; a trailing `/` is ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }

    /// Full URL for a channel path such as `/logs`.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Check the values that would make the client unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPositive`] for a zero worker count, capacity
    /// or timeout, and [`ConfigError::InvalidValue`] for an empty base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive(self.workers, "workers")?;
        ensure_positive(self.capacity, "capacity")?;
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::NotPositive("connect_timeout_ms"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NotPositive("request_timeout_ms"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "base_url",
                value: self.base_url.clone(),
            });
        }
        Ok(())
    }

    /// Load the `[logtree]` section of an INI file.
    ///
    /// `publishable_api_key` and `secret_key` are required; every other key
    /// falls back to its default:
    ///
    /// ```ini
    /// [logtree]
    /// publishable_api_key = pk_live_123
    /// secret_key = sk_live_456
    /// should_log_errors = false
    /// base_url = https://logs.internal.example.com/api/v1
    /// connect_timeout_ms = 2000
    /// request_timeout_ms = 10000
    /// workers = 2
    /// capacity = 256
    /// warn_interval_ms = 5000
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed, a
    /// required key is missing, or a value fails to parse or validate.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let ini = Ini::load_from_file(path).map_err(|err| match err {
            ini::Error::Io(io) if io.kind() == ErrorKind::NotFound => ConfigError::NotFound {
                path: display.clone(),
            },
            ini::Error::Io(io) => ConfigError::Io {
                path: display.clone(),
                source: io,
            },
            ini::Error::Parse(parse) => ConfigError::Parse {
                path: display.clone(),
                source: parse,
            },
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let section = ini
            .section(Some(INI_SECTION))
            .ok_or(ConfigError::MissingKey("publishable_api_key"))?;
        let required = |key: &'static str| {
            section
                .get(key)
                .map(str::to_owned)
                .ok_or(ConfigError::MissingKey(key))
        };

        let mut config = Self::new(required("publishable_api_key")?, required("secret_key")?);
        if let Some(flag) = parse_key::<bool>(section, "should_log_errors")? {
            config.should_log_errors = flag;
        }
        if let Some(url) = section.get("base_url") {
            config.base_url = url.to_owned();
        }
        if let Some(ms) = parse_key::<u64>(section, "connect_timeout_ms")? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_key::<u64>(section, "request_timeout_ms")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(workers) = parse_key::<usize>(section, "workers")? {
            config.workers = workers;
        }
        if let Some(capacity) = parse_key::<usize>(section, "capacity")? {
            config.capacity = capacity;
        }
        if let Some(ms) = parse_key::<u64>(section, "warn_interval_ms")? {
            config.warn_interval = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }
}

fn ensure_positive(value: usize, field: &'static str) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::NotPositive(field))
    } else {
        Ok(value)
    }
}

fn parse_key<T: FromStr>(
    section: &ini::Properties,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    section
        .get(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw.to_owned(),
            })
        })
        .transpose()
}
