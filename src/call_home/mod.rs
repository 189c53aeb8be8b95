// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Call-home: device-initiated registration with a remote registrar.
//!
//! Instead of waiting for a management system to find it, the device
//! reaches out to a registrar and invokes its `register` action with its
//! identity and callback address:
//!
//! ```text
//! POST {address}{endpoint}/data/registrar:register
//! {"deviceId": "car-1", "address": "http://car:8080/restconf"}
//! ```
//!
//! # Features
//!
//! - **Idempotent reconfiguration**: applying the same options twice does
//!   nothing
//! - **Fixed-rate retry**: failed attempts are retried every
//!   `retry_rate_ms`, without backoff or attempt limit
//! - **Listeners**: notified of `Register` and `Unregister` transitions, with
//!   a catch-up notification for late subscribers
//!
//! A failed attempt with `retry_rate_ms == 0` is a configuration error. The
//! background run stops and invokes the fatal handler, which terminates the
//! process unless replaced with [`CallHome::with_fatal_handler`].

mod manager;
mod options;
mod state;

pub use manager::{
    CallHome, FatalHandler, ListenerToken, REGISTER_ACTION, REGISTRAR_MODULE, RegistrationListener,
};
pub use options::RegistrationOptions;
pub use state::{RegisterUpdate, RegistrationPhase, RegistrationState};
