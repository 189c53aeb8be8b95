// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registration state.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::client::RemoteDevice;

/// Phase of the registration state machine.
///
/// ```text
/// Unregistered -> Connecting -> Registered
///                     |  ^
///                     +--+ failure, retry enabled
///                     |
///                     +-> Fatal   failure, retry disabled
/// ```
///
/// Applying changed options moves any phase back to `Unregistered`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RegistrationPhase {
    /// No registration in progress.
    #[default]
    Unregistered,
    /// Attempting to register.
    Connecting,
    /// Registered with the current registrar.
    Registered,
    /// A failed attempt with retry disabled stopped the loop.
    Fatal,
}

impl RegistrationPhase {
    /// Returns `true` once registration succeeded.
    #[must_use]
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Registered)
    }

    /// Returns `true` if the loop stopped on a configuration error.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }
}

impl fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unregistered => "unregistered",
            Self::Connecting => "connecting",
            Self::Registered => "registered",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Transition reported to registration listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterUpdate {
    /// The device registered with the given registrar.
    Register,
    /// The device left the given registrar because options changed.
    Unregister,
}

/// Snapshot of the registration state.
pub struct RegistrationState<T> {
    /// Current phase.
    pub phase: RegistrationPhase,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// Registrar the device is registered with.
    pub registrar: Option<RemoteDevice<T>>,
    /// Attempts made by the current registration run.
    pub attempts: u32,
    /// When the most recent attempt started.
    pub last_attempt: Option<DateTime<Utc>>,
}

impl<T> RegistrationState<T> {
    /// Returns `true` if the phase is [`RegistrationPhase::Registered`].
    #[must_use]
    pub fn registered(&self) -> bool {
        self.phase.is_registered()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Marks the start of a new attempt. The counter saturates instead of
    /// wrapping since retries are unbounded.
    pub(crate) fn begin_attempt(&mut self) {
        self.phase = RegistrationPhase::Connecting;
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt = Some(Utc::now());
    }
}

impl<T> Default for RegistrationState<T> {
    fn default() -> Self {
        Self {
            phase: RegistrationPhase::Unregistered,
            last_error: None,
            registrar: None,
            attempts: 0,
            last_attempt: None,
        }
    }
}

impl<T> Clone for RegistrationState<T> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase,
            last_error: self.last_error.clone(),
            registrar: self.registrar.clone(),
            attempts: self.attempts,
            last_attempt: self.last_attempt,
        }
    }
}

impl<T> fmt::Debug for RegistrationState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationState")
            .field("phase", &self.phase)
            .field("last_error", &self.last_error)
            .field("registrar", &self.registrar.as_ref().map(RemoteDevice::address))
            .field("attempts", &self.attempts)
            .field("last_attempt", &self.last_attempt)
            .finish()
    }
}
