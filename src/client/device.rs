// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handle on the tree behind a remote endpoint.

use std::fmt;
use std::sync::Arc;

use crate::client::TreeAdapter;
use crate::protocol::Transport;

/// A remote device: the address it was resolved from and the transport
/// reaching it.
///
/// Cheap to clone; holds no state besides the address and a shared
/// transport. Use [`browser`](Self::browser) to operate on one of its
/// modules.
pub struct RemoteDevice<T> {
    address: String,
    transport: Arc<T>,
}

impl<T> RemoteDevice<T> {
    /// Creates a device handle.
    #[must_use]
    pub fn new(address: impl Into<String>, transport: T) -> Self {
        Self::with_shared(address, Arc::new(transport))
    }

    /// Creates a device handle over an already shared transport.
    #[must_use]
    pub fn with_shared(address: impl Into<String>, transport: Arc<T>) -> Self {
        Self {
            address: address.into(),
            transport,
        }
    }

    /// Returns the address the device was resolved from.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

impl<T: Transport> RemoteDevice<T> {
    /// Returns an adapter over `module` of this device.
    #[must_use]
    pub fn browser(&self, module: impl Into<String>) -> TreeAdapter<T> {
        TreeAdapter::new(Arc::clone(&self.transport), module)
    }
}

impl<T> Clone for RemoteDevice<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> fmt::Debug for RemoteDevice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDevice")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
