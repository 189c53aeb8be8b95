// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `restconf_callhome` - Call-home registration and remote tree access for
//! RESTCONF-style management endpoints.
//!
//! A device running this library announces itself to a registrar, then lets
//! management code read, write and watch remote configuration trees as if
//! they were local.
//!
//! # Supported Features
//!
//! - **Call-home**: Register with a registrar, retry at a fixed rate, notify
//!   listeners of `Register` / `Unregister` transitions
//! - **Tree access**: Read subtrees and leaves, write leaves, upsert
//!   subtrees, invoke actions, delete nodes
//! - **Subscriptions**: Shared push streams per path with callback dispatch
//! - **Management**: Debug logging switch, stream counters, on-demand
//!   call-home configuration
//!
//! # Quick Start
//!
//! ## Call-Home
//!
//! ```no_run
//! use restconf_callhome::call_home::{CallHome, RegistrationOptions};
//! use restconf_callhome::protocol::HttpResolver;
//!
//! #[tokio::main]
//! async fn main() -> restconf_callhome::Result<()> {
//!     let call_home = CallHome::new(HttpResolver::new());
//!
//!     let options = RegistrationOptions::from_json(
//!         r#"{"deviceId": "car-1", "address": "http://registrar:8090", "endpoint": "/restconf",
//!             "localAddress": "http://car:8080/restconf", "retryRateMs": 5000}"#,
//!     )?;
//!
//!     // Registers with the registrar in the background
//!     call_home.apply_options(options)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Reading and Writing a Remote Tree
//!
//! ```no_run
//! use restconf_callhome::client::{NodePath, RemoteDevice};
//! use restconf_callhome::protocol::HttpTransport;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> restconf_callhome::Result<()> {
//!     let device = RemoteDevice::new("car:8080", HttpTransport::new("car:8080/restconf")?);
//!     let car = device.browser("car");
//!     let path = NodePath::parse("car")?;
//!
//!     let tree = car.read(&path).await.to_json()?;
//!     println!("{tree}");
//!
//!     car.upsert(&path, json!({"mileage": {"odometer": 1001}}))
//!         .await
//!         .into_result()?;
//!     Ok(())
//! }
//! ```

pub mod call_home;
pub mod client;
pub mod error;
pub mod logging;
pub mod management;
pub mod protocol;
pub mod subscription;

pub use call_home::{CallHome, RegisterUpdate, RegistrationOptions};
pub use client::{Node, NodePath, RemoteDevice, TreeAdapter, TreeOp};
pub use error::{
    ConfigError, Error, NodeError, ParseError, ProtocolError, RegistrationError, Result,
};
pub use management::Management;
#[cfg(feature = "http")]
pub use protocol::{HttpConfig, HttpResolver, HttpTransport};
pub use protocol::{Resolver, Transport};
pub use subscription::{Notification, Subscription, SubscriptionId, SubscriptionManager};
