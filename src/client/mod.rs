// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote tree access.
//!
//! A [`RemoteDevice`] pairs an address with a [`Transport`](crate::protocol::Transport).
//! [`RemoteDevice::browser`] returns a [`TreeAdapter`] bound to one module
//! of that device, which turns reads, writes, actions and subscriptions on
//! [`NodePath`]s into wire requests.
//!
//! # Example
//!
//! ```no_run
//! use restconf_callhome::client::{NodePath, RemoteDevice};
//! use restconf_callhome::protocol::HttpTransport;
//! use serde_json::json;
//!
//! # async fn example() -> restconf_callhome::Result<()> {
//! let device = RemoteDevice::new("car:8080/restconf", HttpTransport::new("car:8080/restconf")?);
//! let car = device.browser("car");
//!
//! let mileage = NodePath::parse("car/mileage")?;
//! let odometer = car.read_field(&mileage, "odometer").await.into_result()?;
//! println!("odometer: {odometer:?}");
//!
//! car.write_field(&mileage, "odometer", json!(0)).await.into_result()?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod device;
mod node;
mod operation;
mod path;

pub use adapter::TreeAdapter;
pub use device::RemoteDevice;
pub use node::{Node, merge_patch};
pub use operation::TreeOp;
pub use path::NodePath;
