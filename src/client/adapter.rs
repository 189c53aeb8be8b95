// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tree adapter over a [`Transport`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::client::node::{list_items, member};
use crate::client::operation::local_name;
use crate::client::{Node, NodePath, TreeOp};
use crate::error::{NodeError, ProtocolError};
use crate::protocol::{Transport, WireResponse};
use crate::subscription::{Notification, Subscription, SubscriptionManager};

/// Status returned for a path with no resource behind it.
const NOT_FOUND: u16 = 404;

/// Binds tree operations on one module of a remote device to a transport.
///
/// Each method issues exactly one request (subscriptions aside) and
/// returns a [`Node`]; failures come back as [`Node::Error`] attached to the
/// node that was accessed. Nothing is retried.
///
/// # Examples
///
/// ```no_run
/// use restconf_callhome::client::{NodePath, RemoteDevice};
/// use restconf_callhome::protocol::HttpTransport;
/// use serde_json::json;
///
/// # async fn example() -> restconf_callhome::Result<()> {
/// let device = RemoteDevice::new("car:8080/restconf", HttpTransport::new("car:8080/restconf")?);
/// let car = device.browser("car");
/// let path = NodePath::parse("car")?;
///
/// let odometer = car.read(&path).await.child("mileage").field("odometer");
/// println!("{odometer:?}");
///
/// car.upsert(&path, json!({"mileage": {"odometer": 1001}})).await.into_result()?;
/// # Ok(())
/// # }
/// ```
pub struct TreeAdapter<T> {
    transport: Arc<T>,
    module: String,
    subscriptions: Arc<SubscriptionManager<T>>,
}

impl<T: Transport> TreeAdapter<T> {
    /// Creates an adapter for `module` over `transport`.
    #[must_use]
    pub fn new(transport: Arc<T>, module: impl Into<String>) -> Self {
        let module = module.into();
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&transport),
            module.clone(),
        ));
        Self {
            transport,
            module,
            subscriptions,
        }
    }

    /// Returns the module this adapter operates on.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the subscription manager owned by this adapter.
    #[must_use]
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager<T>> {
        &self.subscriptions
    }

    /// Performs one operation.
    pub async fn execute(&self, op: TreeOp) -> Node {
        let request = op.to_request(&self.module);
        let path = request.path.clone();

        tracing::debug!(
            method = %request.method,
            module = %self.module,
            path = %path,
            "Executing tree operation"
        );

        match self.transport.execute(request).await {
            Ok(response) => decode(&op, path, &response),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Tree operation failed");
                Node::Error(NodeError::Transport {
                    path,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Reads the subtree at `path`.
    pub async fn read(&self, path: &NodePath) -> Node {
        self.execute(TreeOp::Read { path: path.clone() }).await
    }

    /// Reads several nodes independently.
    ///
    /// A failing read only affects its own entry in the result.
    pub async fn read_all(&self, paths: &[NodePath]) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(paths.len());
        for path in paths {
            nodes.push(self.read(path).await);
        }
        nodes
    }

    /// Reads the child container `name` of `path`.
    pub async fn child(&self, path: &NodePath, name: &str) -> Node {
        self.execute(TreeOp::Child {
            path: path.clone(),
            name: name.to_string(),
        })
        .await
    }

    /// Reads leaf `field` of `path`.
    pub async fn read_field(&self, path: &NodePath, field: &str) -> Node {
        self.execute(TreeOp::ReadField {
            path: path.clone(),
            field: field.to_string(),
        })
        .await
    }

    /// Enumerates the entries of the list at `path`.
    ///
    /// A failed read yields a single error node.
    pub async fn list_entries(&self, path: &NodePath) -> Vec<Node> {
        self.execute(TreeOp::ListEntries { path: path.clone() })
            .await
            .entries()
    }

    /// Writes leaf `field` of `path`.
    pub async fn write_field(&self, path: &NodePath, field: &str, value: Value) -> Node {
        self.execute(TreeOp::WriteField {
            path: path.clone(),
            field: field.to_string(),
            value,
        })
        .await
    }

    /// Creates or replaces the subtree at `path`.
    pub async fn upsert(&self, path: &NodePath, subtree: Value) -> Node {
        self.execute(TreeOp::Upsert {
            path: path.clone(),
            subtree,
        })
        .await
    }

    /// Invokes action `name` on `path` and returns its output.
    pub async fn action(&self, path: &NodePath, name: &str, input: Option<Value>) -> Node {
        self.execute(TreeOp::Action {
            path: path.clone(),
            name: name.to_string(),
            input,
        })
        .await
    }

    /// Deletes the node at `path`.
    pub async fn delete(&self, path: &NodePath) -> Node {
        self.execute(TreeOp::Delete { path: path.clone() }).await
    }

    /// Subscribes to push notifications for `path`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the stream could not be opened.
    pub async fn subscribe<F>(&self, path: &NodePath, handler: F) -> Result<Subscription, ProtocolError>
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(path, handler).await
    }

    /// Cancels a subscription. Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.subscriptions.unsubscribe(subscription)
    }
}

impl<T> fmt::Debug for TreeAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeAdapter")
            .field("module", &self.module)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

fn decode(op: &TreeOp, path: String, response: &WireResponse) -> Node {
    if response.status == NOT_FOUND {
        return Node::Error(NodeError::NoSuchResource { path });
    }

    if !response.is_success() {
        let message = remote_error_message(&response.body)
            .unwrap_or_else(|| format!("request failed with status {}", response.status));
        return Node::Error(NodeError::Status {
            path,
            status: response.status,
            message,
        });
    }

    if response.body.trim().is_empty() {
        return Node::Empty;
    }

    let value: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            return Node::Error(NodeError::Decode {
                path,
                message: e.to_string(),
            });
        }
    };

    match op {
        TreeOp::ReadField { field, .. } => Node::Data(unwrap_field(value, field)),
        TreeOp::ListEntries { .. } if list_items(&value).is_none() => {
            Node::Error(NodeError::Decode {
                path,
                message: "expected a list".to_string(),
            })
        }
        _ => Node::Data(value),
    }
}

/// Leaf reads come back wrapped as `{"field": value}`; a bare value is
/// accepted too.
fn unwrap_field(value: Value, field: &str) -> Value {
    let is_wrapper = value
        .as_object()
        .is_some_and(|object| object.len() == 1 && member(&value, local_name(field)).is_some());
    match value {
        Value::Object(object) if is_wrapper => {
            object.into_iter().next().map_or(Value::Null, |(_, v)| v)
        }
        other => other,
    }
}

/// Extracts `error-message` from a RESTCONF `errors` body.
fn remote_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let errors = member(&value, "errors")?;
    let error = member(errors, "error")?;
    let first = match error {
        Value::Array(items) => items.first()?,
        other => other,
    };
    member(first, "error-message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_op(field: &str) -> TreeOp {
        TreeOp::ReadField {
            path: NodePath::parse("car/mileage").unwrap(),
            field: field.to_string(),
        }
    }

    #[test]
    fn not_found_is_path_error() {
        let node = decode(
            &TreeOp::Read {
                path: NodePath::root(),
            },
            "car".to_string(),
            &WireResponse::new(404, ""),
        );
        assert_eq!(
            node,
            Node::Error(NodeError::NoSuchResource {
                path: "car".to_string()
            })
        );
    }

    #[test]
    fn status_error_uses_restconf_message() {
        let body = r#"{"ietf-restconf:errors":{"error":[{"error-type":"application","error-message":"device already registered"}]}}"#;
        let node = decode(&field_op("odometer"), "p".to_string(), &WireResponse::new(409, body));
        assert_eq!(
            node,
            Node::Error(NodeError::Status {
                path: "p".to_string(),
                status: 409,
                message: "device already registered".to_string(),
            })
        );
    }

    #[test]
    fn status_error_without_body() {
        let node = decode(&field_op("odometer"), "p".to_string(), &WireResponse::new(500, ""));
        assert!(matches!(
            node.error(),
            Some(NodeError::Status { status: 500, message, .. }) if message.contains("500")
        ));
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let node = decode(&field_op("odometer"), "p".to_string(), &WireResponse::ok("{oops"));
        assert!(matches!(node, Node::Error(NodeError::Decode { .. })));
    }

    #[test]
    fn empty_body_is_empty_node() {
        let node = decode(
            &TreeOp::Delete {
                path: NodePath::root(),
            },
            "p".to_string(),
            &WireResponse::no_content(),
        );
        assert_eq!(node, Node::Empty);
    }

    #[test]
    fn field_is_unwrapped() {
        let response = WireResponse::ok(r#"{"x:odometer":1000}"#);
        let node = decode(&field_op("odometer"), "p".to_string(), &response);
        assert_eq!(node, Node::Data(json!(1000)));

        let bare = decode(&field_op("odometer"), "p".to_string(), &WireResponse::ok("7"));
        assert_eq!(bare, Node::Data(json!(7)));
    }

    #[test]
    fn list_must_decode_to_array() {
        let op = TreeOp::ListEntries {
            path: NodePath::parse("bird").unwrap(),
        };
        let ok = decode(&op, "bird".to_string(), &WireResponse::ok(r#"{"bird":[]}"#));
        assert_eq!(ok, Node::Data(json!({"bird": []})));

        let bad = decode(&op, "bird".to_string(), &WireResponse::ok(r#"{"a":1,"b":2}"#));
        assert!(bad.is_error());
    }
}
