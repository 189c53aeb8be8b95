// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Result of a tree operation.
//!
//! A [`Node`] is what a tree walk sees at one point of access: decoded data,
//! nothing (writes and actions without output), or the error that happened
//! there. Errors travel inside the node so a walk over several siblings can
//! report partial success.

use serde_json::Value;

use crate::error::NodeError;

/// Outcome of a tree operation on one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Decoded subtree or leaf value.
    Data(Value),
    /// The operation succeeded without returning data.
    Empty,
    /// The operation failed at this node.
    Error(NodeError),
}

impl Node {
    /// Returns `true` if this node carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the error attached to this node, if any.
    #[must_use]
    pub fn error(&self) -> Option<&NodeError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the decoded data, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Converts the node into a `Result`, mapping [`Node::Empty`] to `None`.
    ///
    /// # Errors
    ///
    /// Returns the attached [`NodeError`] for error nodes.
    pub fn into_result(self) -> Result<Option<Value>, NodeError> {
        match self {
            Self::Data(value) => Ok(Some(value)),
            Self::Empty => Ok(None),
            Self::Error(err) => Err(err),
        }
    }

    /// Serializes the data back to JSON.
    ///
    /// Member order is preserved, so an unmodified subtree re-encodes to the
    /// bytes it was decoded from (modulo whitespace). Empty nodes encode as
    /// `{}`.
    ///
    /// # Errors
    ///
    /// Returns the attached [`NodeError`] for error nodes.
    pub fn to_json(&self) -> Result<String, NodeError> {
        match self {
            Self::Data(value) => Ok(value.to_string()),
            Self::Empty => Ok("{}".to_string()),
            Self::Error(err) => Err(err.clone()),
        }
    }

    /// Navigates to a child container of a decoded subtree.
    ///
    /// `name` may carry a module prefix; members are matched with or without
    /// it. Missing members produce [`NodeError::NoSuchResource`]; an error
    /// node stays an error node.
    #[must_use]
    pub fn child(&self, name: &str) -> Node {
        match self {
            Self::Data(value) => match member(value, name) {
                Some(child) => Self::Data(child.clone()),
                None => Self::Error(NodeError::NoSuchResource {
                    path: name.to_string(),
                }),
            },
            Self::Empty => Self::Error(NodeError::NoSuchResource {
                path: name.to_string(),
            }),
            Self::Error(err) => Self::Error(err.clone()),
        }
    }

    /// Reads a leaf of a decoded subtree.
    ///
    /// Same lookup rules as [`child`](Self::child).
    #[must_use]
    pub fn field(&self, name: &str) -> Node {
        self.child(name)
    }

    /// Enumerates the entries of a decoded list.
    ///
    /// Accepts a bare array or a single-member object wrapping the array,
    /// which is how RESTCONF answers a GET on a list. Anything else yields a
    /// single [`NodeError::Decode`] node.
    #[must_use]
    pub fn entries(&self) -> Vec<Node> {
        match self {
            Self::Data(value) => match list_items(value) {
                Some(items) => items.iter().cloned().map(Self::Data).collect(),
                None => vec![Self::Error(NodeError::Decode {
                    path: String::new(),
                    message: "expected a list".to_string(),
                })],
            },
            Self::Empty => Vec::new(),
            Self::Error(err) => vec![Self::Error(err.clone())],
        }
    }
}

impl From<Result<Value, NodeError>> for Node {
    fn from(result: Result<Value, NodeError>) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(err) => Self::Error(err),
        }
    }
}

/// Looks up `name` in an object, falling back to the unqualified name and to
/// members carrying any module prefix.
pub(crate) fn member<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    let object = value.as_object()?;
    if let Some(found) = object.get(name) {
        return Some(found);
    }
    let local = name.split_once(':').map_or(name, |(_, local)| local);
    object.get(local).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.split_once(':').is_some_and(|(_, k)| k == local))
            .map(|(_, v)| v)
    })
}

pub(crate) fn list_items(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(object) if object.len() == 1 => {
            object.values().next().and_then(Value::as_array)
        }
        _ => None,
    }
}

/// Applies a JSON merge patch (RFC 7386) to `target`.
///
/// Objects merge recursively, `null` removes a member, everything else
/// replaces. Subscription handlers use this to mirror remote changes into a
/// local subtree.
///
/// ```
/// use restconf_callhome::client::merge_patch;
/// use serde_json::json;
///
/// let mut car = json!({"mileage": {"odometer": 1000, "trip": 5}});
/// merge_patch(&mut car, &json!({"mileage": {"odometer": 1001, "trip": null}}));
/// assert_eq!(car, json!({"mileage": {"odometer": 1001}}));
/// ```
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_members) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_members) = target {
        for (key, value) in patch_members {
            if value.is_null() {
                target_members.shift_remove(key);
            } else {
                merge_patch(
                    target_members.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}
