// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module-qualified node paths.
//!
//! Paths are written the RESTCONF way: segments separated by `/`, any
//! segment optionally qualified with a `module:` prefix, list entries
//! addressed with `name=key[,key...]`.
//!
//! ```
//! use restconf_callhome::client::NodePath;
//!
//! let path: NodePath = "car:car/mileage".parse().unwrap();
//! assert_eq!(path.module(), Some("car"));
//! assert_eq!(path.wire_path(), "car/mileage");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A path to a node in a data tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Returns the path of the tree root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a path string.
    ///
    /// Leading and trailing slashes are ignored; `""` and `"/"` are the root.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPath`] for empty segments (`a//b`) or
    /// segments with an empty name (`:car`, `=key`).
    pub fn parse(path: &str) -> Result<Self, ParseError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            let name = unqualified(segment_name(segment));
            if segment.is_empty() || name.is_empty() {
                return Err(ParseError::InvalidPath {
                    path: path.to_string(),
                    message: format!("empty segment name in '{segment}'"),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Returns a new path with `segment` appended.
    ///
    /// The segment is taken verbatim; it may carry a module prefix or list
    /// keys.
    #[must_use]
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns the raw segments, qualifications included.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the module prefix of the first segment, if any.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        let first = self.segments.first()?;
        segment_name(first).split_once(':').map(|(module, _)| module)
    }

    /// Returns the last segment's name without module prefix or keys.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.segments
            .last()
            .map(|segment| unqualified(segment_name(segment)))
    }

    /// Returns the path as sent on the wire.
    ///
    /// Module prefixes are stripped from every segment and names and keys
    /// are percent-encoded. The `=` and `,` list-key separators are kept.
    #[must_use]
    pub fn wire_path(&self) -> String {
        self.segments
            .iter()
            .map(|segment| wire_segment(segment))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// The part of a segment before the list keys.
fn segment_name(segment: &str) -> &str {
    segment.split_once('=').map_or(segment, |(name, _)| name)
}

fn unqualified(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

fn wire_segment(segment: &str) -> String {
    match segment.split_once('=') {
        Some((name, keys)) => {
            let keys = keys
                .split(',')
                .map(|key| urlencoding::encode(key).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            format!("{}={keys}", urlencoding::encode(unqualified(name)))
        }
        None => urlencoding::encode(unqualified(segment)).into_owned(),
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for NodePath {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_root() {
        assert!(NodePath::parse("").unwrap().is_root());
        assert!(NodePath::parse("/").unwrap().is_root());
        assert_eq!(NodePath::root().wire_path(), "");
    }

    #[test]
    fn parse_trims_slashes() {
        let path = NodePath::parse("/car/mileage/").unwrap();
        assert_eq!(path.segments(), ["car", "mileage"]);
    }

    #[test]
    fn parse_rejects_empty_segment() {
        assert!(NodePath::parse("car//mileage").is_err());
        assert!(NodePath::parse("x:/car").is_err());
        assert!(NodePath::parse("bird/=robin").is_err());
    }

    #[test]
    fn module_prefix() {
        let path = NodePath::parse("registrar:register").unwrap();
        assert_eq!(path.module(), Some("registrar"));
        assert_eq!(NodePath::parse("car").unwrap().module(), None);
    }

    #[test]
    fn wire_path_strips_every_prefix() {
        let path = NodePath::parse("x:car/y:mileage/odometer").unwrap();
        assert_eq!(path.wire_path(), "car/mileage/odometer");
    }

    #[test]
    fn wire_path_keeps_list_keys() {
        let path = NodePath::parse("bird:bird=blue jay,2/species").unwrap();
        assert_eq!(path.wire_path(), "bird=blue%20jay,2/species");
    }

    #[test]
    fn key_with_colon_is_not_a_prefix() {
        let path = NodePath::parse("device=a:b").unwrap();
        assert_eq!(path.wire_path(), "device=a%3Ab");
        assert_eq!(path.module(), None);
    }

    #[test]
    fn join_and_last_name() {
        let path = NodePath::parse("car").unwrap().join("x:make");
        assert_eq!(path.to_string(), "car/x:make");
        assert_eq!(path.last_name(), Some("make"));
    }

    #[test]
    fn from_str_round_trips_display() {
        let path: NodePath = "x:car/bird=robin".parse().unwrap();
        assert_eq!(path.to_string(), "x:car/bird=robin");
    }
}
