// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport layer for talking to remote management endpoints.
//!
//! The tree adapter never speaks HTTP itself: every primitive operation is
//! turned into a [`WireRequest`] and handed to a [`Transport`], which
//! performs it and returns a [`WireResponse`]. Push notifications arrive
//! through an [`EventStream`] opened by the same transport.
//!
//! # Implementations
//!
//! - [`HttpTransport`]: RESTCONF-style HTTP using `reqwest`, Server-Sent
//!   Events for push streams
//! - [`HttpResolver`]: builds an [`HttpTransport`] for an address, used by
//!   call-home to reach a registrar
//!
//! Embedders with a different wire (a test double, a tunnel over an
//! already-open connection) implement [`Transport`] and [`Resolver`]
//! themselves.

#[cfg(feature = "http")]
mod http;
mod sse;

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpResolver, HttpTransport};
pub use sse::{SseEvent, SseParser};

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

use crate::client::RemoteDevice;
use crate::error::ProtocolError;

/// Request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read a node.
    Get,
    /// Create or replace a node.
    Put,
    /// Invoke an action.
    Post,
    /// Remove a node.
    Delete,
}

impl Method {
    /// Returns the verb as it appears on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request produced by the tree adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Request verb.
    pub method: Method,
    /// Module the path belongs to.
    pub module: String,
    /// Path without module qualification, already percent-encoded.
    pub path: String,
    /// Serialized JSON body, if the verb carries one.
    pub body: Option<String>,
}

impl WireRequest {
    /// Returns the target as `module:path`, the form RESTCONF puts in URLs.
    #[must_use]
    pub fn qualified_path(&self) -> String {
        qualify(&self.module, &self.path)
    }
}

/// Response to a [`WireRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Raw response body (may be empty).
    pub body: String,
}

impl WireResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a `200` response carrying `body`.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Creates a `204` response with no body.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204, String::new())
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request to open a push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Module the path belongs to.
    pub module: String,
    /// Path without module qualification.
    pub path: String,
}

impl StreamRequest {
    /// Returns the target as `module:path`.
    #[must_use]
    pub fn qualified_path(&self) -> String {
        qualify(&self.module, &self.path)
    }
}

fn qualify(module: &str, path: &str) -> String {
    if module.is_empty() {
        path.to_string()
    } else {
        format!("{module}:{path}")
    }
}

/// Receiving end of a push stream.
///
/// Each item is the raw JSON payload of one event. The stream ends when the
/// remote closes it or the producing task stops.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Result<String, ProtocolError>>,
}

impl EventStream {
    /// Default number of buffered events.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a stream and the sender that feeds it.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<String, ProtocolError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Receives the next event, or `None` once the stream has closed.
    pub async fn recv(&mut self) -> Option<Result<String, ProtocolError>> {
        self.rx.recv().await
    }
}

/// Performs requests against one remote endpoint.
///
/// Implementations must be safe to call concurrently: every call is
/// self-contained. No retry happens at this level.
pub trait Transport: Send + Sync + 'static {
    /// Performs a single request.
    ///
    /// Non-success statuses are returned as responses, not errors; only
    /// failures to obtain a response are errors.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if no response could be obtained.
    fn execute(
        &self,
        request: WireRequest,
    ) -> impl Future<Output = Result<WireResponse, ProtocolError>> + Send;

    /// Opens a push stream for a path.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the stream could not be established.
    fn open_stream(
        &self,
        request: StreamRequest,
    ) -> impl Future<Output = Result<EventStream, ProtocolError>> + Send;
}

/// Turns an address into a handle on the remote tree behind it.
pub trait Resolver: Send + Sync + 'static {
    /// Transport used by resolved devices.
    type Transport: Transport;

    /// Resolves `address` into a remote device.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the address is unusable or the transport
    /// cannot be built.
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<RemoteDevice<Self::Transport>, ProtocolError>> + Send;
}
