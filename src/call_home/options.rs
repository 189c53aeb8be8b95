// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registration options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ParseError};

/// Where and how often to register with the registrar.
///
/// Serialized in camelCase so the options can come straight from a startup
/// JSON file:
///
/// ```
/// use restconf_callhome::call_home::RegistrationOptions;
///
/// let options = RegistrationOptions::from_json(
///     r#"{"deviceId": "car-1", "address": "http://registrar:8090", "endpoint": "/restconf", "retryRateMs": 5000}"#,
/// )
/// .unwrap();
/// assert_eq!(options.url(), "http://registrar:8090/restconf");
///
/// let options = RegistrationOptions::new("car-1", "http://registrar:8090")
///     .with_local_address("http://car:8080/restconf")
///     .with_retry_rate_ms(0);
/// assert!(!options.retries());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationOptions {
    /// Identity announced to the registrar.
    pub device_id: String,
    /// Registrar base address.
    pub address: String,
    /// Path appended to `address`.
    pub endpoint: String,
    /// Callback address sent to the registrar.
    pub local_address: String,
    /// Delay between attempts, in milliseconds. Zero disables retry.
    pub retry_rate_ms: u64,
}

impl RegistrationOptions {
    /// Default delay between registration attempts.
    pub const DEFAULT_RETRY_RATE_MS: u64 = 5_000;

    /// Creates options with no endpoint, no local address and the default
    /// retry rate.
    #[must_use]
    pub fn new(device_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            endpoint: String::new(),
            local_address: String::new(),
            retry_rate_ms: Self::DEFAULT_RETRY_RATE_MS,
        }
    }

    /// Parses options from JSON.
    ///
    /// Missing members take their default value; validation happens when
    /// the options are applied.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the input is not a valid options object.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the path appended to the registrar address.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the callback address sent to the registrar.
    #[must_use]
    pub fn with_local_address(mut self, local_address: impl Into<String>) -> Self {
        self.local_address = local_address.into();
        self
    }

    /// Sets the retry rate. Zero disables retry.
    #[must_use]
    pub fn with_retry_rate_ms(mut self, retry_rate_ms: u64) -> Self {
        self.retry_rate_ms = retry_rate_ms;
        self
    }

    /// Returns the registrar URL: `address` followed by `endpoint`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.address, self.endpoint)
    }

    /// Returns `true` if failed attempts are retried.
    #[must_use]
    pub fn retries(&self) -> bool {
        self.retry_rate_ms > 0
    }

    /// Returns the delay between attempts.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_rate_ms)
    }

    /// Checks that the options can drive a registration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` naming the first empty required
    /// field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::MissingField("deviceId"));
        }
        if self.address.trim().is_empty() {
            return Err(ConfigError::MissingField("address"));
        }
        Ok(())
    }
}
