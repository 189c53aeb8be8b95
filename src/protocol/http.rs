// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport speaking the RESTCONF conventions.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};

use crate::client::RemoteDevice;
use crate::error::ProtocolError;
use crate::protocol::sse::SseParser;
use crate::protocol::{
    EventStream, Method, Resolver, StreamRequest, Transport, WireRequest, WireResponse,
};

/// Media type for JSON-encoded data tree bodies.
const DATA_MEDIA_TYPE: &str = "application/yang-data+json";

/// Media type requested for push streams.
const STREAM_MEDIA_TYPE: &str = "text/event-stream";

// ============================================================================
// HttpConfig
// ============================================================================

/// Configuration for an HTTP transport.
///
/// The address is the RESTCONF root of the remote endpoint; data requests go
/// to `{address}/data/...` and push streams to `{address}/streams/...`.
///
/// # Examples
///
/// ```
/// use restconf_callhome::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("192.168.1.10:8080/restconf")
///     .with_credentials("admin", "secret")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.base_url(), "http://192.168.1.10:8080/restconf");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    address: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default connect timeout, also used for push streams.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default `User-Agent` header.
    pub const DEFAULT_USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    /// Creates a configuration for the given address.
    ///
    /// Addresses without a scheme get `http://`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credentials: None,
            timeout: Self::DEFAULT_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Sets basic authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the timeout for request/response calls.
    ///
    /// Push streams are long-lived and only bounded by the connect timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header sent with every request.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the configured address, as given.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the credentials if set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the address with a scheme and without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }

    /// Creates an [`HttpTransport`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the address is not a valid URL or the HTTP client
    /// cannot be created.
    pub fn into_transport(self) -> Result<HttpTransport, ProtocolError> {
        let base_url = self.base_url();
        Url::parse(&base_url)
            .map_err(|e| ProtocolError::InvalidAddress(format!("{}: {e}", self.address)))?;

        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        let stream_client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(HttpTransport {
            base_url,
            client,
            stream_client,
            credentials: self.credentials,
        })
    }
}

// ============================================================================
// HttpTransport
// ============================================================================

/// RESTCONF-style HTTP transport.
///
/// Each [`WireRequest`] becomes one HTTP request to
/// `{base}/data/{module}:{path}`. Push streams are Server-Sent Events read
/// from `{base}/streams/{module}:{path}` by a background task.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    stream_client: Client,
    credentials: Option<(String, String)>,
}

impl HttpTransport {
    /// Creates a transport for `address` with default settings.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the client cannot be built.
    pub fn new(address: impl Into<String>) -> Result<Self, ProtocolError> {
        HttpConfig::new(address).into_transport()
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn data_url(&self, qualified_path: &str) -> String {
        format!("{}/data/{qualified_path}", self.base_url)
    }

    fn stream_url(&self, qualified_path: &str) -> String {
        format!("{}/streams/{qualified_path}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((username, password)) => builder.basic_auth(username, Some(password)),
            None => builder,
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Put => Self::PUT,
            Method::Post => Self::POST,
            Method::Delete => Self::DELETE,
        }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, ProtocolError> {
        let url = self.data_url(&request.qualified_path());

        tracing::debug!(method = %request.method, url = %url, "Sending RESTCONF request");

        let mut builder = self
            .authorize(self.client.request(request.method.into(), &url))
            .header(ACCEPT, DATA_MEDIA_TYPE);
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, DATA_MEDIA_TYPE).body(body);
        }

        let response = builder.send().await.map_err(ProtocolError::Http)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ProtocolError::AuthenticationFailed);
        }

        let body = response.text().await.map_err(ProtocolError::Http)?;

        tracing::debug!(status = status.as_u16(), body = %body, "Received RESTCONF response");

        Ok(WireResponse::new(status.as_u16(), body))
    }

    async fn open_stream(&self, request: StreamRequest) -> Result<EventStream, ProtocolError> {
        let url = self.stream_url(&request.qualified_path());

        tracing::debug!(url = %url, "Opening event stream");

        let mut response = self
            .authorize(self.stream_client.get(&url))
            .header(ACCEPT, STREAM_MEDIA_TYPE)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProtocolError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let (tx, stream) = EventStream::channel(EventStream::DEFAULT_CAPACITY);
        tokio::spawn(async move {
            let mut parser = SseParser::new();
            loop {
                let chunk = tokio::select! {
                    () = tx.closed() => break,
                    chunk = response.chunk() => chunk,
                };
                match chunk {
                    Ok(Some(bytes)) => match parser.feed(&bytes) {
                        Ok(events) => {
                            for event in events {
                                if tx.send(Ok(event.data)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "Dropping event stream");
                            let _ = tx.send(Err(e)).await;
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(ProtocolError::Http(e))).await;
                        break;
                    }
                }
            }
            tracing::debug!(url = %url, "Event stream ended");
        });

        Ok(stream)
    }
}

// ============================================================================
// HttpResolver
// ============================================================================

/// Resolves addresses into HTTP-backed remote devices.
///
/// Every resolved device gets its own [`HttpTransport`] built with the
/// resolver's timeout and credentials.
#[derive(Debug, Clone, Default)]
pub struct HttpResolver {
    credentials: Option<(String, String)>,
    timeout: Option<Duration>,
}

impl HttpResolver {
    /// Creates a resolver with default transport settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets credentials used for every resolved device.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the request timeout used for every resolved device.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn config_for(&self, address: &str) -> HttpConfig {
        let mut config = HttpConfig::new(address);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some((username, password)) = &self.credentials {
            config = config.with_credentials(username.as_str(), password.as_str());
        }
        config
    }
}

impl Resolver for HttpResolver {
    type Transport = HttpTransport;

    async fn resolve(&self, address: &str) -> Result<RemoteDevice<HttpTransport>, ProtocolError> {
        let transport = self.config_for(address).into_transport()?;
        Ok(RemoteDevice::new(address, transport))
    }
}
