// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tree operations and their wire translation.
//!
//! Every primitive operation the adapter supports is a [`TreeOp`] variant,
//! and [`TreeOp::to_request`] is the one place that decides verb, path and
//! body:
//!
//! | Operation     | Verb   | Wire path            | Body                |
//! |---------------|--------|----------------------|---------------------|
//! | `Read`        | GET    | node                 | none                |
//! | `Child`       | GET    | node + child         | none                |
//! | `ReadField`   | GET    | node + field         | none                |
//! | `ListEntries` | GET    | list                 | none                |
//! | `WriteField`  | PUT    | node                 | `{field: value}`    |
//! | `Upsert`      | PUT    | node                 | full subtree        |
//! | `Action`      | POST   | node + action        | input, if any       |
//! | `Delete`      | DELETE | node                 | none                |
//!
//! Upserts are always PUT: creating and replacing are not distinguished on
//! the wire.

use serde_json::{Map, Value};

use crate::client::NodePath;
use crate::protocol::{Method, WireRequest};

/// A primitive operation on a remote tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeOp {
    /// Read the subtree at `path`.
    Read {
        /// Node to read.
        path: NodePath,
    },
    /// Read the child container `name` of `path`.
    Child {
        /// Parent node.
        path: NodePath,
        /// Child name, optionally module-qualified.
        name: String,
    },
    /// Read one leaf of `path`.
    ReadField {
        /// Owning node.
        path: NodePath,
        /// Leaf name, optionally module-qualified.
        field: String,
    },
    /// Enumerate the entries of the list at `path`.
    ListEntries {
        /// List node.
        path: NodePath,
    },
    /// Write one leaf of `path`.
    WriteField {
        /// Owning node.
        path: NodePath,
        /// Leaf name, optionally module-qualified.
        field: String,
        /// New value.
        value: Value,
    },
    /// Create or replace the subtree at `path`.
    Upsert {
        /// Target node.
        path: NodePath,
        /// Complete subtree.
        subtree: Value,
    },
    /// Invoke action `name` on `path`.
    Action {
        /// Node owning the action.
        path: NodePath,
        /// Action name, optionally module-qualified.
        name: String,
        /// Action input.
        input: Option<Value>,
    },
    /// Remove the node at `path`.
    Delete {
        /// Node to remove.
        path: NodePath,
    },
}

impl TreeOp {
    /// Returns the verb this operation is sent with.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Read { .. }
            | Self::Child { .. }
            | Self::ReadField { .. }
            | Self::ListEntries { .. } => Method::Get,
            Self::WriteField { .. } | Self::Upsert { .. } => Method::Put,
            Self::Action { .. } => Method::Post,
            Self::Delete { .. } => Method::Delete,
        }
    }

    /// Returns the path the request addresses.
    #[must_use]
    pub fn target(&self) -> NodePath {
        match self {
            Self::Read { path }
            | Self::ListEntries { path }
            | Self::WriteField { path, .. }
            | Self::Upsert { path, .. }
            | Self::Delete { path } => path.clone(),
            Self::Child { path, name } | Self::Action { path, name, .. } => path.join(name.as_str()),
            Self::ReadField { path, field } => path.join(field.as_str()),
        }
    }

    /// Returns the serialized request body.
    ///
    /// Bodies are the compact JSON encoding of the caller's value with member
    /// order preserved.
    #[must_use]
    pub fn body(&self) -> Option<String> {
        match self {
            Self::WriteField { field, value, .. } => {
                let mut wrapper = Map::new();
                wrapper.insert(local_name(field).to_string(), value.clone());
                Some(Value::Object(wrapper).to_string())
            }
            Self::Upsert { subtree, .. } => Some(subtree.to_string()),
            Self::Action { input, .. } => input.as_ref().map(Value::to_string),
            Self::Read { .. }
            | Self::Child { .. }
            | Self::ReadField { .. }
            | Self::ListEntries { .. }
            | Self::Delete { .. } => None,
        }
    }

    /// Translates the operation into a wire request for `module`.
    #[must_use]
    pub fn to_request(&self, module: &str) -> WireRequest {
        WireRequest {
            method: self.method(),
            module: module.to_string(),
            path: self.target().wire_path(),
            body: self.body(),
        }
    }
}

pub(crate) fn local_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}
