// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Log output setup with a debug switch that can be flipped at runtime.
//!
//! [`init`] installs a global `tracing` subscriber whose filter sits behind
//! a reload layer. The returned [`LogLevel`] toggles debug output without
//! restarting, which is what the management `debug` field drives.
//!
//! ```no_run
//! use restconf_callhome::logging::{self, LoggingConfig};
//!
//! let log_level = logging::init(LoggingConfig::default().with_debug(false))?;
//! log_level.set_debug(true)?;
//! # Ok::<(), restconf_callhome::error::ConfigError>(())
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt as fmt_layer, reload};

use crate::error::ConfigError;

/// Configuration for the log output.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used while debug output is off.
    pub level: Level,
    /// Start with debug output on.
    pub debug: bool,
    /// Include file and line information.
    pub file_info: bool,
    /// Include the event target.
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            debug: false,
            file_info: false,
            target: true,
        }
    }
}

impl LoggingConfig {
    /// Sets the level used while debug output is off.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Starts with debug output on or off.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Includes file and line information.
    #[must_use]
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Includes or omits the event target.
    #[must_use]
    pub fn with_target(mut self, target: bool) -> Self {
        self.target = target;
        self
    }
}

/// Handle on the active log level.
///
/// Clones share the same switch.
#[derive(Clone)]
pub struct LogLevel {
    base: Level,
    debug: Arc<AtomicBool>,
    handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogLevel {
    /// Creates a switch that is not connected to any subscriber.
    ///
    /// Useful when the embedding application owns the `tracing` setup:
    /// the flag is tracked but no filter is changed.
    #[must_use]
    pub fn detached(debug: bool) -> Self {
        Self {
            base: Level::INFO,
            debug: Arc::new(AtomicBool::new(debug)),
            handle: None,
        }
    }

    /// Returns `true` if debug output is on.
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Acquire)
    }

    /// Turns debug output on or off.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Logging` if the subscriber owning the filter is
    /// gone.
    pub fn set_debug(&self, enabled: bool) -> Result<(), ConfigError> {
        if let Some(handle) = &self.handle {
            handle
                .reload(filter(self.base, enabled))
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
        }
        let previous = self.debug.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            tracing::info!(debug = enabled, "Debug logging toggled");
        }
        Ok(())
    }
}

impl fmt::Debug for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogLevel")
            .field("base", &self.base)
            .field("debug", &self.debug_enabled())
            .field("attached", &self.handle.is_some())
            .finish()
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` directives are honored on top of the configured level.
///
/// # Errors
///
/// Returns `ConfigError::Logging` if a global subscriber is already set.
pub fn init(config: LoggingConfig) -> Result<LogLevel, ConfigError> {
    let (filter_layer, handle) = reload::Layer::new(filter(config.level, config.debug));

    let output = fmt_layer::layer()
        .with_target(config.target)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(output)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(LogLevel {
        base: config.level,
        debug: Arc::new(AtomicBool::new(config.debug)),
        handle: Some(handle),
    })
}

fn filter(base: Level, debug: bool) -> EnvFilter {
    let level = if debug { Level::DEBUG } else { base };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_tracks_flag() {
        let level = LogLevel::detached(false);
        assert!(!level.debug_enabled());

        level.set_debug(true).unwrap();
        assert!(level.debug_enabled());

        let shared = level.clone();
        shared.set_debug(false).unwrap();
        assert!(!level.debug_enabled());
    }

    #[test]
    fn config_builder() {
        let config = LoggingConfig::default()
            .with_level(Level::WARN)
            .with_debug(true)
            .with_file_info()
            .with_target(false);
        assert_eq!(config.level, Level::WARN);
        assert!(config.debug);
        assert!(config.file_info);
        assert!(!config.target);
    }
}
