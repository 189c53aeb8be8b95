// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push subscriptions keyed by path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::client::NodePath;
use crate::error::{NodeError, ProtocolError};
use crate::protocol::{EventStream, StreamRequest, Transport};
use crate::subscription::{CallbackList, SubscriptionId};

/// What a subscription handler receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A decoded event payload.
    Event(Value),
    /// An event that could not be decoded, or a stream failure.
    Error(NodeError),
    /// The stream ended without being unsubscribed. Delivered once; no
    /// further notifications follow.
    Closed,
}

/// Callback invoked for each notification on a subscribed path.
pub type NotificationHandler = dyn Fn(&Notification) + Send + Sync;

/// One active subscription, returned by
/// [`SubscriptionManager::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: SubscriptionId,
    path: NodePath,
}

impl Subscription {
    /// Returns the subscription ID.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the subscribed path.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }
}

/// Counters exposed to management trees.
pub trait SubscriptionStats: Send + Sync {
    /// Number of open notification streams.
    fn stream_count(&self) -> usize;

    /// Number of registered subscription handlers across all streams.
    fn subscription_count(&self) -> usize;
}

struct StreamEntry {
    stream_id: u64,
    handlers: Arc<CallbackList<NotificationHandler>>,
    task: JoinHandle<()>,
}

type StreamMap = RwLock<HashMap<String, StreamEntry>>;

/// Maintains push streams and the handlers attached to them.
///
/// All subscriptions to the same path share one stream; the stream is
/// opened by the first subscription and closed when the last one goes away.
/// When the remote ends a stream, every handler receives
/// [`Notification::Closed`] once and the bookkeeping is dropped. Nothing is
/// reconnected at this level. Dropping the manager closes its streams the
/// same way.
pub struct SubscriptionManager<T> {
    transport: Arc<T>,
    module: String,
    streams: Arc<StreamMap>,
    next_id: AtomicU64,
}

impl<T: Transport> SubscriptionManager<T> {
    /// Creates a manager opening streams through `transport` for `module`.
    #[must_use]
    pub fn new(transport: Arc<T>, module: impl Into<String>) -> Self {
        Self {
            transport,
            module: module.into(),
            streams: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribes `handler` to push events for `path`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if a new stream had to be opened and the
    /// transport failed to open it.
    pub async fn subscribe<F>(
        &self,
        path: &NodePath,
        handler: F,
    ) -> Result<Subscription, ProtocolError>
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let key = path.wire_path();
        let id = SubscriptionId::new(self.next_id());
        let handler: Arc<NotificationHandler> = Arc::new(handler);
        let subscription = Subscription {
            id,
            path: path.clone(),
        };

        {
            let streams = self.streams.read();
            if let Some(entry) = streams.get(&key) {
                entry.handlers.push(id, handler);
                tracing::debug!(path = %key, subscription = %id, "Joined existing stream");
                return Ok(subscription);
            }
        }

        let stream = self
            .transport
            .open_stream(StreamRequest {
                module: self.module.clone(),
                path: key.clone(),
            })
            .await?;

        let mut streams = self.streams.write();
        if let Some(entry) = streams.get(&key) {
            // another subscriber opened the same path while we were connecting
            entry.handlers.push(id, handler);
            return Ok(subscription);
        }

        let handlers = Arc::new(CallbackList::new());
        handlers.push(id, handler);

        let stream_id = self.next_id();
        let task = tokio::spawn(run_stream(
            stream,
            key.clone(),
            stream_id,
            Arc::clone(&handlers),
            Arc::downgrade(&self.streams),
        ));

        tracing::debug!(path = %key, subscription = %id, "Opened notification stream");
        streams.insert(
            key,
            StreamEntry {
                stream_id,
                handlers,
                task,
            },
        );
        Ok(subscription)
    }

    /// Removes a subscription, closing its stream if it was the last one.
    ///
    /// Idempotent; safe to call from inside a handler. Returns `true` if this
    /// call removed the subscription.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let key = subscription.path.wire_path();
        let mut streams = self.streams.write();

        let Some(entry) = streams.get(&key) else {
            return false;
        };
        if !entry.handlers.remove(subscription.id) {
            return false;
        }

        let last = entry.handlers.is_empty();
        if last && let Some(entry) = streams.remove(&key) {
            entry.task.abort();
            tracing::debug!(path = %key, "Closed notification stream");
        }
        true
    }

    /// Returns `true` if a stream is open for `path`.
    #[must_use]
    pub fn is_streaming(&self, path: &NodePath) -> bool {
        self.streams.read().contains_key(&path.wire_path())
    }
}

impl<T> SubscriptionStats for SubscriptionManager<T>
where
    T: Send + Sync,
{
    fn stream_count(&self) -> usize {
        self.streams.read().len()
    }

    fn subscription_count(&self) -> usize {
        self.streams
            .read()
            .values()
            .map(|entry| entry.handlers.len())
            .sum()
    }
}

impl<T> Drop for SubscriptionManager<T> {
    fn drop(&mut self) {
        let entries: Vec<_> = self.streams.write().drain().collect();
        for (path, entry) in entries {
            entry.task.abort();
            tracing::debug!(path = %path, "Closed notification stream with its manager");
            dispatch(&entry.handlers, &Notification::Closed);
        }
    }
}

impl<T> std::fmt::Debug for SubscriptionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let streams = self.streams.read();
        f.debug_struct("SubscriptionManager")
            .field("module", &self.module)
            .field("streams", &streams.len())
            .finish_non_exhaustive()
    }
}

fn dispatch(handlers: &CallbackList<NotificationHandler>, notification: &Notification) {
    for handler in handlers.snapshot() {
        handler(notification);
    }
}

async fn run_stream(
    mut stream: EventStream,
    path: String,
    stream_id: u64,
    handlers: Arc<CallbackList<NotificationHandler>>,
    streams: Weak<StreamMap>,
) {
    while let Some(item) = stream.recv().await {
        let notification = match item {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(value) => Notification::Event(value),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Dropping undecodable event");
                    Notification::Error(NodeError::Decode {
                        path: path.clone(),
                        message: e.to_string(),
                    })
                }
            },
            Err(e) => Notification::Error(NodeError::Transport {
                path: path.clone(),
                message: e.to_string(),
            }),
        };
        dispatch(&handlers, &notification);
    }

    let still_registered = streams.upgrade().is_some_and(|streams| {
        let mut streams = streams.write();
        let ours = streams
            .get(&path)
            .is_some_and(|entry| entry.stream_id == stream_id);
        if ours {
            streams.remove(&path);
        }
        ours
    });

    if still_registered {
        tracing::debug!(path = %path, "Notification stream closed by remote");
        dispatch(&handlers, &Notification::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{WireRequest, WireResponse};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc;

    type Feed = mpsc::Sender<Result<String, ProtocolError>>;

    /// Transport whose streams are fed by the test.
    #[derive(Default)]
    struct FeedTransport {
        feeds: Mutex<Vec<(String, Feed)>>,
    }

    impl FeedTransport {
        fn feed(&self, path: &str) -> Feed {
            self.feeds
                .lock()
                .iter()
                .rev()
                .find(|(p, _)| p == path)
                .map(|(_, tx)| tx.clone())
                .unwrap()
        }

        fn opened(&self) -> usize {
            self.feeds.lock().len()
        }
    }

    impl Transport for FeedTransport {
        async fn execute(&self, _request: WireRequest) -> Result<WireResponse, ProtocolError> {
            Ok(WireResponse::no_content())
        }

        async fn open_stream(&self, request: StreamRequest) -> Result<EventStream, ProtocolError> {
            let (tx, stream) = EventStream::channel(8);
            self.feeds.lock().push((request.path, tx));
            Ok(stream)
        }
    }

    fn recorder() -> (
        Arc<Mutex<Vec<Notification>>>,
        impl Fn(&Notification) + Send + Sync + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |n: &Notification| sink.lock().push(n.clone()))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn events_are_decoded_and_delivered() {
        let transport = Arc::new(FeedTransport::default());
        let manager = SubscriptionManager::new(Arc::clone(&transport), "car");
        let (seen, handler) = recorder();

        let path = NodePath::parse("car").unwrap();
        manager.subscribe(&path, handler).await.unwrap();

        let feed = transport.feed("car");
        feed.send(Ok(r#"{"odometer":1001}"#.to_string()))
            .await
            .unwrap();
        feed.send(Ok("not json".to_string())).await.unwrap();
        settle().await;

        let seen = seen.lock();
        assert_eq!(seen[0], Notification::Event(json!({"odometer": 1001})));
        assert!(matches!(seen[1], Notification::Error(NodeError::Decode { .. })));
    }

    #[tokio::test]
    async fn same_path_shares_one_stream() {
        let transport = Arc::new(FeedTransport::default());
        let manager = SubscriptionManager::new(Arc::clone(&transport), "car");
        let path = NodePath::parse("x:car").unwrap();

        let first = manager.subscribe(&path, |_| {}).await.unwrap();
        let second = manager.subscribe(&path, |_| {}).await.unwrap();

        assert_eq!(transport.opened(), 1);
        assert_eq!(manager.stream_count(), 1);
        assert_eq!(manager.subscription_count(), 2);

        assert!(manager.unsubscribe(&first));
        assert!(manager.is_streaming(&path));
        assert!(manager.unsubscribe(&second));
        assert!(!manager.is_streaming(&path));
        assert_eq!(manager.subscription_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let transport = Arc::new(FeedTransport::default());
        let manager = SubscriptionManager::new(transport, "car");
        let sub = manager
            .subscribe(&NodePath::parse("car").unwrap(), |_| {})
            .await
            .unwrap();

        assert!(manager.unsubscribe(&sub));
        assert!(!manager.unsubscribe(&sub));
    }

    #[tokio::test]
    async fn remote_close_delivers_closed_once() {
        let transport = Arc::new(FeedTransport::default());
        let manager = SubscriptionManager::new(Arc::clone(&transport), "car");
        let (seen, handler) = recorder();
        let path = NodePath::parse("car").unwrap();
        let sub = manager.subscribe(&path, handler).await.unwrap();

        // dropping every sender ends the stream
        transport.feeds.lock().clear();
        settle().await;

        assert_eq!(*seen.lock(), vec![Notification::Closed]);
        assert_eq!(manager.stream_count(), 0);
        assert!(!manager.unsubscribe(&sub));
    }

    #[tokio::test]
    async fn dropping_manager_closes_streams() {
        let transport = Arc::new(FeedTransport::default());
        let manager = SubscriptionManager::new(Arc::clone(&transport), "car");
        let (seen, handler) = recorder();
        manager
            .subscribe(&NodePath::parse("car").unwrap(), handler)
            .await
            .unwrap();

        drop(manager);
        settle().await;

        assert_eq!(*seen.lock(), vec![Notification::Closed]);
        assert!(transport.feed("car").is_closed());
    }

    #[tokio::test]
    async fn handler_may_unsubscribe_itself() {
        let transport = Arc::new(FeedTransport::default());
        let manager = Arc::new(SubscriptionManager::new(Arc::clone(&transport), "car"));
        let path = NodePath::parse("car").unwrap();

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (seen, recorder_handler) = recorder();
        let weak = Arc::downgrade(&manager);
        let own = Arc::clone(&slot);
        let sub = manager
            .subscribe(&path, move |_| {
                if let (Some(manager), Some(sub)) = (weak.upgrade(), own.lock().clone()) {
                    manager.unsubscribe(&sub);
                }
            })
            .await
            .unwrap();
        *slot.lock() = Some(sub);
        manager.subscribe(&path, recorder_handler).await.unwrap();

        let feed = transport.feed("car");
        feed.send(Ok("1".to_string())).await.unwrap();
        feed.send(Ok("2".to_string())).await.unwrap();
        settle().await;

        assert_eq!(manager.subscription_count(), 1);
        assert_eq!(
            *seen.lock(),
            vec![Notification::Event(json!(1)), Notification::Event(json!(2))]
        );
    }
}
