// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `restconf_callhome` library.
//!
//! The hierarchy separates failures by where they are handled:
//!
//! - [`ConfigError`]: operator mistakes, surfaced immediately and never retried
//! - [`RegistrationError`]: call-home attempts that failed and will be retried
//! - [`ProtocolError`]: transport-level failures (connection, HTTP, channels)
//! - [`NodeError`]: failures attached to a single node of a tree operation
//! - [`ParseError`]: malformed JSON handed to the library

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing input.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A tree operation failed on a specific node.
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    /// A registration attempt failed.
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),
}

/// Configuration errors.
///
/// These are never retried: they indicate the operator has to change
/// something before the operation can succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option was left empty.
    #[error("missing required option: {0}")]
    MissingField(&'static str),

    /// Registration failed and no retry interval is configured.
    #[error("failed to register and no retry rate configured (last error: {last_error})")]
    RetryDisabled {
        /// The failure that ended the registration run.
        last_error: String,
    },

    /// The log filter could not be installed or changed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Failures of a single call-home attempt.
///
/// `Connectivity` and `Rejected` are treated the same by the retry loop;
/// the distinction is kept for diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The registrar could not be reached.
    #[error("registrar unreachable: {0}")]
    Connectivity(String),

    /// The registrar was reached but refused the registration.
    #[error("registration rejected: {0}")]
    Rejected(String),

    /// Options changed while the attempt was running; its result was
    /// discarded.
    #[error("registration superseded by newer options")]
    Superseded,
}

/// Errors related to protocol communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection to the remote endpoint failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A push stream sent a line longer than the parser accepts.
    #[error("stream frame exceeds {limit} bytes")]
    FrameTooLarge {
        /// Maximum accepted size in bytes.
        limit: usize,
    },
}

/// Errors attached to one node of a tree operation.
///
/// A tree walk that hits one of these keeps going for sibling nodes; the
/// error is reported where it happened instead of aborting the walk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The remote endpoint has no resource at this path.
    #[error("no such resource: {path}")]
    NoSuchResource {
        /// Wire path of the missing resource.
        path: String,
    },

    /// The remote endpoint answered with a non-success status.
    #[error("{path}: remote returned status {status}: {message}")]
    Status {
        /// Wire path of the request.
        path: String,
        /// HTTP-style status code.
        status: u16,
        /// Error message reported by the remote, or the status reason.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("{path}: malformed response: {message}")]
    Decode {
        /// Wire path of the request.
        path: String,
        /// Decoder message.
        message: String,
    },

    /// The request never produced a response.
    #[error("{path}: transport failure: {message}")]
    Transport {
        /// Wire path of the request.
        path: String,
        /// Transport message.
        message: String,
    },

    /// The node cannot be written.
    #[error("{path} is read-only")]
    ReadOnly {
        /// Path of the rejected write.
        path: String,
    },
}

impl NodeError {
    /// Returns the wire path the error is attached to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NoSuchResource { path }
            | Self::Status { path, .. }
            | Self::Decode { path, .. }
            | Self::Transport { path, .. }
            | Self::ReadOnly { path } => path,
        }
    }

    /// Returns `true` if the request did not reach the remote endpoint.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Errors related to parsing JSON input.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path string could not be parsed.
    #[error("invalid path '{path}': {message}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_disabled_display() {
        let err = ConfigError::RetryDisabled {
            last_error: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to register and no retry rate configured (last error: connection refused)"
        );
    }

    #[test]
    fn error_from_config_error() {
        let err: Error = ConfigError::MissingField("address").into();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField("address"))
        ));
    }

    #[test]
    fn node_error_display() {
        let err = NodeError::NoSuchResource {
            path: "car/make".to_string(),
        };
        assert_eq!(err.to_string(), "no such resource: car/make");
    }

    #[test]
    fn node_error_path() {
        let err = NodeError::Status {
            path: "register".to_string(),
            status: 400,
            message: "bad input".to_string(),
        };
        assert_eq!(err.path(), "register");
        assert!(!err.is_transport());
    }

    #[test]
    fn registration_error_display() {
        let err = RegistrationError::Rejected("unknown device".to_string());
        assert_eq!(err.to_string(), "registration rejected: unknown device");
    }
}
