// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tree adapter tests against an in-memory recording transport.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use restconf_callhome::client::{Node, NodePath, RemoteDevice, TreeAdapter, merge_patch};
use restconf_callhome::error::{NodeError, ProtocolError};
use restconf_callhome::protocol::{
    EventStream, Method, StreamRequest, Transport, WireRequest, WireResponse,
};
use serde_json::json;

/// Answers from canned responses and records every request.
#[derive(Default)]
struct RecordingTransport {
    responses: Mutex<HashMap<(Method, String), WireResponse>>,
    requests: Mutex<Vec<WireRequest>>,
    offline: Mutex<bool>,
}

impl RecordingTransport {
    fn respond(&self, method: Method, qualified_path: &str, response: WireResponse) {
        self.responses
            .lock()
            .insert((method, qualified_path.to_string()), response);
    }

    fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().clone()
    }

    fn last(&self) -> WireRequest {
        self.requests.lock().last().cloned().unwrap()
    }
}

impl Transport for RecordingTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, ProtocolError> {
        self.requests.lock().push(request.clone());
        if *self.offline.lock() {
            return Err(ProtocolError::ConnectionFailed("connection refused".to_string()));
        }
        let key = (request.method, request.qualified_path());
        Ok(self
            .responses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| match request.method {
                Method::Get => WireResponse::new(404, ""),
                _ => WireResponse::no_content(),
            }))
    }

    async fn open_stream(&self, _request: StreamRequest) -> Result<EventStream, ProtocolError> {
        Err(ProtocolError::ConnectionFailed("streams not supported".to_string()))
    }
}

fn car() -> (Arc<RecordingTransport>, TreeAdapter<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let device = RemoteDevice::with_shared("memory", Arc::clone(&transport));
    (transport, device.browser("x"))
}

fn path(p: &str) -> NodePath {
    NodePath::parse(p).unwrap()
}

// ============================================================================
// Reads
// ============================================================================

mod reads {
    use super::*;

    #[tokio::test]
    async fn subtree_round_trips_exactly() {
        let (transport, car) = car();
        let expected = r#"{"mileage":{"odometer":1000}}"#;
        transport.respond(Method::Get, "x:car", WireResponse::ok(expected));

        let node = car.read(&path("car")).await;

        assert_eq!(node.to_json().unwrap(), expected);
        let request = transport.last();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "car");
        assert_eq!(request.body, None);
    }

    #[tokio::test]
    async fn member_order_is_preserved() {
        let (transport, car) = car();
        let expected = r#"{"trip":12,"odometer":1000}"#;
        transport.respond(Method::Get, "x:car/mileage", WireResponse::ok(expected));

        let node = car.read(&path("x:car/mileage")).await;
        assert_eq!(node.to_json().unwrap(), expected);
    }

    #[tokio::test]
    async fn field_read_unwraps_leaf() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:car/mileage/odometer",
            WireResponse::ok(r#"{"x:odometer":1000}"#),
        );

        let node = car.read_field(&path("car/mileage"), "odometer").await;
        assert_eq!(node, Node::Data(json!(1000)));
    }

    #[tokio::test]
    async fn local_navigation_after_read() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:car",
            WireResponse::ok(r#"{"mileage":{"odometer":1000,"trip":3},"make":{"model":"T"}}"#),
        );

        let tree = car.read(&path("car")).await;
        assert_eq!(tree.child("mileage").field("trip"), Node::Data(json!(3)));
        assert_eq!(tree.child("x:make").field("model"), Node::Data(json!("T")));
        assert!(tree.child("engine").is_error());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn child_is_its_own_request() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:car/make",
            WireResponse::ok(r#"{"model":"T"}"#),
        );

        let node = car.child(&path("car"), "make").await;
        assert_eq!(node, Node::Data(json!({"model": "T"})));
        assert_eq!(transport.last().path, "car/make");
    }

    #[tokio::test]
    async fn missing_resource_is_error_node() {
        let (_, car) = car();

        let node = car.read(&path("car/engine")).await;

        assert_eq!(
            node,
            Node::Error(NodeError::NoSuchResource {
                path: "car/engine".to_string()
            })
        );
    }

    #[tokio::test]
    async fn sibling_failure_is_isolated() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:car/mileage",
            WireResponse::ok(r#"{"odometer":1000}"#),
        );
        transport.respond(Method::Get, "x:car/make", WireResponse::new(500, ""));

        let nodes = car
            .read_all(&[path("car/mileage"), path("car/make"), path("car/engine")])
            .await;

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Data(json!({"odometer": 1000})));
        assert!(matches!(
            nodes[1].error(),
            Some(NodeError::Status { status: 500, .. })
        ));
        assert!(matches!(
            nodes[2].error(),
            Some(NodeError::NoSuchResource { .. })
        ));
    }

    #[tokio::test]
    async fn list_entries() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:bird",
            WireResponse::ok(r#"{"bird":[{"name":"robin","wingspan":10},{"name":"owl","wingspan":40}]}"#),
        );

        let birds = car.list_entries(&path("bird")).await;

        assert_eq!(birds.len(), 2);
        assert_eq!(birds[1].field("name"), Node::Data(json!("owl")));
    }

    #[tokio::test]
    async fn list_key_is_encoded() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:bird=blue%20jay",
            WireResponse::ok(r#"{"name":"blue jay"}"#),
        );

        let node = car.read(&path("bird=blue jay")).await;
        assert_eq!(node.field("name"), Node::Data(json!("blue jay")));
    }

    #[tokio::test]
    async fn transport_failure_is_error_node() {
        let (transport, car) = car();
        *transport.offline.lock() = true;

        let node = car.read(&path("car")).await;

        let err = node.error().unwrap();
        assert!(err.is_transport());
        assert_eq!(err.path(), "car");
        // no retry at this level
        assert_eq!(transport.requests().len(), 1);
    }
}

// ============================================================================
// Writes and actions
// ============================================================================

mod writes {
    use super::*;

    #[tokio::test]
    async fn upsert_puts_exact_subtree() {
        let (transport, car) = car();
        transport.respond(Method::Get, "x:car", WireResponse::ok("{}"));

        let node = car
            .upsert(&path("car"), json!({"mileage": {"odometer": 1001}}))
            .await;

        assert_eq!(node, Node::Empty);
        let request = transport.last();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "car");
        assert_eq!(
            request.body.as_deref(),
            Some(r#"{"mileage":{"odometer":1001}}"#)
        );
    }

    #[tokio::test]
    async fn write_field_puts_wrapped_leaf() {
        let (transport, car) = car();

        car.write_field(&path("car/mileage"), "trip", json!(0))
            .await
            .into_result()
            .unwrap();

        let request = transport.last();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.qualified_path(), "x:car/mileage");
        assert_eq!(request.body.as_deref(), Some(r#"{"trip":0}"#));
    }

    #[tokio::test]
    async fn action_posts_input_and_returns_output() {
        let (transport, car) = car();
        transport.respond(
            Method::Post,
            "x:car/rotate-tires",
            WireResponse::ok(r#"{"x:output":{"rotated":4}}"#),
        );

        let node = car
            .action(&path("car"), "rotate-tires", Some(json!({"pattern": "cross"})))
            .await;

        assert_eq!(node.child("output").field("rotated"), Node::Data(json!(4)));
        assert_eq!(
            transport.last().body.as_deref(),
            Some(r#"{"pattern":"cross"}"#)
        );
    }

    #[tokio::test]
    async fn rejected_write_carries_remote_message() {
        let (transport, car) = car();
        transport.respond(
            Method::Put,
            "x:car/mileage",
            WireResponse::new(
                400,
                r#"{"ietf-restconf:errors":{"error":[{"error-message":"odometer cannot decrease"}]}}"#,
            ),
        );

        let err = car
            .write_field(&path("car/mileage"), "odometer", json!(1))
            .await
            .into_result()
            .unwrap_err();

        assert_eq!(
            err,
            NodeError::Status {
                path: "car/mileage".to_string(),
                status: 400,
                message: "odometer cannot decrease".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn delete() {
        let (transport, car) = car();

        let node = car.delete(&path("bird=robin")).await;

        assert_eq!(node, Node::Empty);
        let request = transport.last();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "bird=robin");
    }

    #[tokio::test]
    async fn read_modify_write_with_merge_patch() {
        let (transport, car) = car();
        transport.respond(
            Method::Get,
            "x:car",
            WireResponse::ok(r#"{"mileage":{"odometer":1000,"trip":5}}"#),
        );

        let mut tree = car.read(&path("car")).await.into_result().unwrap().unwrap();
        merge_patch(&mut tree, &json!({"mileage": {"odometer": 1001, "trip": null}}));
        car.upsert(&path("car"), tree).await.into_result().unwrap();

        assert_eq!(
            transport.last().body.as_deref(),
            Some(r#"{"mileage":{"odometer":1001}}"#)
        );
    }
}
