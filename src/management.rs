// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Management node for the library itself.
//!
//! Exposes the library's own knobs and counters as named fields:
//!
//! | Field               | Access | Value                                   |
//! |---------------------|--------|-----------------------------------------|
//! | `debug`             | rw     | debug logging on or off                 |
//! | `streamCount`       | ro     | open notification streams               |
//! | `subscriptionCount` | ro     | active notification subscriptions       |
//! | `callHome`          | rw     | call-home options and state, on demand  |
//!
//! The call-home manager is only created when `callHome` is first written
//! (or [`Management::init_call_home`] is called); reading it before that
//! yields nothing.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use serde_json::{Map, Value, json};

use crate::call_home::{CallHome, RegistrationOptions};
use crate::client::TreeAdapter;
use crate::error::{Error, NodeError, Result};
use crate::logging::LogLevel;
use crate::protocol::{Resolver, Transport};
use crate::subscription::SubscriptionStats;

/// Debug logging switch.
pub const DEBUG: &str = "debug";
/// Number of open notification streams.
pub const STREAM_COUNT: &str = "streamCount";
/// Number of active subscriptions.
pub const SUBSCRIPTION_COUNT: &str = "subscriptionCount";
/// Call-home sub-resource.
pub const CALL_HOME: &str = "callHome";

/// Library management node.
///
/// # Examples
///
/// ```no_run
/// use restconf_callhome::logging::LogLevel;
/// use restconf_callhome::management::Management;
/// use restconf_callhome::protocol::HttpResolver;
/// use serde_json::json;
///
/// # fn example() -> restconf_callhome::Result<()> {
/// let management = Management::new(HttpResolver::new(), LogLevel::detached(false));
///
/// management.write_field("debug", json!(true))?;
/// management.write_field(
///     "callHome",
///     json!({"deviceId": "car-1", "address": "http://registrar:8090", "retryRateMs": 5000}),
/// )?;
/// println!("{}", management.read());
/// # Ok(())
/// # }
/// ```
pub struct Management<R: Resolver> {
    log_level: LogLevel,
    resolver: R,
    call_home: OnceLock<CallHome<R>>,
    stats: RwLock<Vec<Weak<dyn SubscriptionStats>>>,
}

impl<R: Resolver + Clone> Management<R> {
    /// Creates a management node.
    ///
    /// `resolver` is used for the call-home manager once it is created.
    #[must_use]
    pub fn new(resolver: R, log_level: LogLevel) -> Self {
        Self {
            log_level,
            resolver,
            call_home: OnceLock::new(),
            stats: RwLock::new(Vec::new()),
        }
    }

    /// Counts the streams and subscriptions of `stats`.
    ///
    /// Only a weak reference is kept; sources that are dropped stop being
    /// counted.
    pub fn track(&self, stats: &Arc<dyn SubscriptionStats>) {
        let mut sources = self.stats.write();
        sources.retain(|source| source.strong_count() > 0);
        sources.push(Arc::downgrade(stats));
    }

    /// Counts the push streams of a tree adapter.
    ///
    /// The adapter's subscriptions stop being counted once it is dropped.
    pub fn track_adapter<T: Transport>(&self, adapter: &TreeAdapter<T>) {
        let stats: Arc<dyn SubscriptionStats> = Arc::clone(adapter.subscriptions()) as _;
        self.track(&stats);
    }

    /// Returns `true` if debug logging is on.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.log_level.debug_enabled()
    }

    /// Turns debug logging on or off.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Logging` if the filter could not be changed.
    pub fn set_debug(&self, enabled: bool) -> Result<()> {
        Ok(self.log_level.set_debug(enabled)?)
    }

    /// Returns the number of open notification streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.sources().iter().map(|s| s.stream_count()).sum()
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.sources().iter().map(|s| s.subscription_count()).sum()
    }

    /// Returns the call-home manager, if it was created.
    #[must_use]
    pub fn call_home(&self) -> Option<&CallHome<R>> {
        self.call_home.get()
    }

    /// Returns the call-home manager, creating it on first use.
    pub fn init_call_home(&self) -> &CallHome<R> {
        self.call_home.get_or_init(|| {
            tracing::debug!("Creating call-home manager");
            CallHome::new(self.resolver.clone())
        })
    }

    /// Reads every field as one JSON object.
    #[must_use]
    pub fn read(&self) -> Value {
        let mut object = Map::new();
        for name in [DEBUG, STREAM_COUNT, SUBSCRIPTION_COUNT, CALL_HOME] {
            if let Ok(value) = self.read_field(name) {
                object.insert(name.to_string(), value);
            }
        }
        Value::Object(object)
    }

    /// Reads one field by name.
    ///
    /// # Errors
    ///
    /// Returns `NodeError::NoSuchResource` for an unknown name, or for
    /// `callHome` before the manager exists.
    pub fn read_field(&self, name: &str) -> std::result::Result<Value, NodeError> {
        match name {
            DEBUG => Ok(Value::Bool(self.debug())),
            STREAM_COUNT => Ok(json!(self.stream_count())),
            SUBSCRIPTION_COUNT => Ok(json!(self.subscription_count())),
            CALL_HOME => self
                .call_home()
                .map(call_home_value)
                .ok_or_else(|| no_such_field(name)),
            _ => Err(no_such_field(name)),
        }
    }

    /// Writes one field by name.
    ///
    /// Writing `callHome` creates the manager if needed and applies the
    /// options it carries; options equal to the current ones change
    /// nothing.
    ///
    /// # Errors
    ///
    /// - `NodeError::NoSuchResource` for an unknown name
    /// - `NodeError::ReadOnly` for the counters
    /// - `NodeError::Decode` if `value` has the wrong shape
    /// - `ConfigError` if the options are invalid or the log filter could
    ///   not be changed
    ///
    /// # Panics
    ///
    /// Writing `callHome` panics if called outside a Tokio runtime.
    pub fn write_field(&self, name: &str, value: Value) -> Result<()> {
        match name {
            DEBUG => {
                let enabled = value.as_bool().ok_or_else(|| NodeError::Decode {
                    path: name.to_string(),
                    message: format!("expected a boolean, got {value}"),
                })?;
                self.set_debug(enabled)
            }
            STREAM_COUNT | SUBSCRIPTION_COUNT => Err(NodeError::ReadOnly {
                path: name.to_string(),
            }
            .into()),
            CALL_HOME => {
                let options: RegistrationOptions =
                    serde_json::from_value(value).map_err(|e| NodeError::Decode {
                        path: name.to_string(),
                        message: e.to_string(),
                    })?;
                self.init_call_home().apply_options(options)?;
                Ok(())
            }
            _ => Err(Error::Node(no_such_field(name))),
        }
    }

    fn sources(&self) -> Vec<Arc<dyn SubscriptionStats>> {
        self.stats.read().iter().filter_map(Weak::upgrade).collect()
    }
}

impl<R: Resolver> fmt::Debug for Management<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Management")
            .field("log_level", &self.log_level)
            .field("call_home", &self.call_home.get())
            .finish_non_exhaustive()
    }
}

fn call_home_value<R: Resolver>(call_home: &CallHome<R>) -> Value {
    let state = call_home.state();
    let mut value = serde_json::to_value(call_home.options()).unwrap_or_else(|_| json!({}));
    if let Value::Object(object) = &mut value {
        object.insert("registered".to_string(), Value::Bool(state.registered()));
        object.insert("phase".to_string(), Value::String(state.phase.to_string()));
        object.insert("attempts".to_string(), json!(state.attempts));
        if let Some(error) = state.last_error {
            object.insert("lastErr".to_string(), Value::String(error));
        }
        if let Some(at) = state.last_attempt {
            object.insert("lastAttempt".to_string(), Value::String(at.to_rfc3339()));
        }
    }
    value
}

fn no_such_field(name: &str) -> NodeError {
    NodeError::NoSuchResource {
        path: name.to_string(),
    }
}
