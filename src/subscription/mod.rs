// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback and push-subscription machinery.
//!
//! # Overview
//!
//! - [`CallbackList`] - Ordered callbacks with snapshot dispatch, used for
//!   call-home registration listeners and per-path notification handlers
//! - [`CancelToken`] - Removes one callback without owning the list
//! - [`SubscriptionManager`] - Long-lived push streams keyed by path
//!
//! # Usage
//!
//! Subscriptions are normally created through a tree adapter:
//!
//! ```no_run
//! use restconf_callhome::client::{NodePath, RemoteDevice};
//! use restconf_callhome::protocol::HttpTransport;
//! use restconf_callhome::subscription::Notification;
//!
//! # async fn example() -> restconf_callhome::Result<()> {
//! let device = RemoteDevice::new("http://car:8080/restconf", HttpTransport::new("car:8080/restconf")?);
//! let car = device.browser("car");
//!
//! let path = NodePath::parse("car/mileage")?;
//! let sub = car
//!     .subscribe(&path, |notification| {
//!         if let Notification::Event(change) = notification {
//!             println!("mileage changed: {change}");
//!         }
//!     })
//!     .await?;
//!
//! // Later
//! car.unsubscribe(&sub);
//! # Ok(())
//! # }
//! ```

mod callback;
mod manager;

pub use callback::{CallbackList, CancelToken, SubscriptionId};
pub use manager::{
    Notification, NotificationHandler, Subscription, SubscriptionManager, SubscriptionStats,
};
