//! # Bus configuration.
//!
//! [`BusConfig`] carries the dispatcher's tuning knobs; [`BusBuilder`]
//! assembles and validates them before any resource is allocated.
//!
//! # Example
//! ```
//! use eventbus::EventBus;
//!
//! let bus = EventBus::builder()
//!     .buffer_size(16)
//!     .num_workers(4)
//!     .build()
//!     .expect("valid configuration");
//! # drop(bus);
//! ```

use crate::bus::EventBus;
use crate::error::ConfigError;

/// Environment variable that force-enables debug tracing.
///
/// Accepted truthy values: `1`, `true`, `yes`, `on` (case-insensitive).
pub const DEBUG_ENV_VAR: &str = "EVENTBUS_DEBUG";

/// Dispatcher configuration.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Initial capacity of the dispatch buffer.
    pub buffer_size: usize,
    /// Number of parallel dispatch workers.
    pub num_workers: usize,
    /// Emit verbose internal tracing at debug level.
    pub debug_logging: bool,
}

impl Default for BusConfig {
    /// Provides the default configuration:
    /// - `buffer_size = 1`
    /// - `num_workers = 1`
    /// - `debug_logging` taken from [`DEBUG_ENV_VAR`]
    fn default() -> Self {
        BusConfig {
            buffer_size: 1,
            num_workers: 1,
            debug_logging: env_truthy(DEBUG_ENV_VAR),
        }
    }
}

pub(crate) fn env_truthy(key: &str) -> bool {
    std::env::var(key)
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

/// Builder for an [`EventBus`]; obtained from [`EventBus::builder`].
///
/// [`BusBuilder::build`] validates every setting and fails fast with a
/// [`ConfigError`] instead of constructing a misconfigured bus.
#[derive(Clone, Debug, Default)]
pub struct BusBuilder {
    buffer_size: Option<usize>,
    num_workers: Option<usize>,
    debug_logging: bool,
}

impl BusBuilder {
    /// Sets the initial capacity of the dispatch buffer (must be >= 1).
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Sets the number of parallel dispatch workers (must be >= 1).
    pub fn num_workers(mut self, num: usize) -> Self {
        self.num_workers = Some(num);
        self
    }

    /// Enables verbose internal tracing for this bus.
    ///
    /// Debug tracing can also be enabled for every bus by setting
    /// [`DEBUG_ENV_VAR`] to a truthy value.
    pub fn enable_debug_logging(mut self) -> Self {
        self.debug_logging = true;
        self
    }

    /// Validates the settings and constructs the bus.
    pub fn build(self) -> Result<EventBus, ConfigError> {
        Ok(EventBus::with_config(self.into_config()?))
    }

    pub(crate) fn into_config(self) -> Result<BusConfig, ConfigError> {
        let mut conf = BusConfig::default();
        if let Some(size) = self.buffer_size {
            if size < 1 {
                return Err(ConfigError::InvalidBufferSize(size));
            }
            conf.buffer_size = size;
        }
        if let Some(num) = self.num_workers {
            if num < 1 {
                return Err(ConfigError::InvalidWorkerCount(num));
            }
            conf.num_workers = num;
        }
        if self.debug_logging {
            conf.debug_logging = true;
        }
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let conf = BusConfig::default();
        assert_eq!(conf.buffer_size, 1);
        assert_eq!(conf.num_workers, 1);
    }

    #[test]
    fn builder_applies_settings() {
        let conf = BusBuilder::default()
            .buffer_size(8)
            .num_workers(3)
            .enable_debug_logging()
            .into_config()
            .expect("valid");
        assert_eq!(conf.buffer_size, 8);
        assert_eq!(conf.num_workers, 3);
        assert!(conf.debug_logging);
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let err = BusBuilder::default()
            .buffer_size(0)
            .into_config()
            .expect_err("invalid");
        assert_eq!(err, ConfigError::InvalidBufferSize(0));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let err = BusBuilder::default()
            .num_workers(0)
            .into_config()
            .expect_err("invalid");
        assert_eq!(err, ConfigError::InvalidWorkerCount(0));
    }

    #[test]
    fn env_truthiness() {
        // Unique variable names: tests in one binary run concurrently.
        std::env::set_var("EVENTBUS_TEST_TRUTHY_ON", "On");
        assert!(env_truthy("EVENTBUS_TEST_TRUTHY_ON"));

        std::env::set_var("EVENTBUS_TEST_TRUTHY_ONE", "1");
        assert!(env_truthy("EVENTBUS_TEST_TRUTHY_ONE"));

        std::env::set_var("EVENTBUS_TEST_TRUTHY_YES", " YES ");
        assert!(env_truthy("EVENTBUS_TEST_TRUTHY_YES"));

        std::env::set_var("EVENTBUS_TEST_TRUTHY_OFF", "off");
        assert!(!env_truthy("EVENTBUS_TEST_TRUTHY_OFF"));

        assert!(!env_truthy("EVENTBUS_TEST_TRUTHY_UNSET"));
    }
}
