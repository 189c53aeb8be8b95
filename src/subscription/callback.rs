// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered callback storage shared by registration listeners and push
//! subscriptions.
//!
//! - [`SubscriptionId`] - Unique identifier of one registered callback
//! - [`CallbackList`] - Insertion-ordered callbacks with snapshot dispatch
//! - [`CancelToken`] - Removes a callback without owning its list

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Unique identifier for a subscription.
///
/// IDs are unique within the list (or manager) that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Insertion-ordered list of callbacks.
///
/// Dispatch works on a snapshot: callbacks are cloned out under the read
/// lock and invoked after it is released. A callback may therefore add or
/// remove entries, itself included, while a dispatch is running without
/// other callbacks being skipped or called twice.
pub struct CallbackList<C: ?Sized> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Arc<C>)>>,
}

impl<C: ?Sized> CallbackList<C> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Appends a callback and returns its ID.
    pub fn insert(&self, callback: Arc<C>) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.push(id, callback);
        id
    }

    /// Appends a callback under an ID issued elsewhere.
    pub(crate) fn push(&self, id: SubscriptionId, callback: Arc<C>) {
        self.entries.write().push((id, callback));
    }

    /// Removes a callback. Returns `true` if it was present.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns the callbacks in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<C>> {
        self.entries
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    /// Returns the number of callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if there are no callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<C: ?Sized> Default for CallbackList<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for CallbackList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("callback_count", &self.len())
            .finish()
    }
}

/// Handle that removes one callback from a [`CallbackList`].
///
/// The token only holds a weak reference: it never keeps the list (or its
/// owner) alive, and cancelling after the owner is gone is a no-op.
pub struct CancelToken<C: ?Sized> {
    id: SubscriptionId,
    list: Weak<CallbackList<C>>,
}

impl<C: ?Sized> CancelToken<C> {
    pub(crate) fn new(id: SubscriptionId, list: &Arc<CallbackList<C>>) -> Self {
        Self {
            id,
            list: Arc::downgrade(list),
        }
    }

    /// Returns the ID of the callback this token removes.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the callback.
    ///
    /// Safe to call from inside the callback itself and more than once.
    /// Returns `true` if this call removed it.
    pub fn cancel(&self) -> bool {
        self.list.upgrade().is_some_and(|list| list.remove(self.id))
    }
}

impl<C: ?Sized> Clone for CancelToken<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            list: Weak::clone(&self.list),
        }
    }
}

impl<C: ?Sized> fmt::Debug for CancelToken<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Callback = dyn Fn(u32) + Send + Sync;

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn ids_are_unique() {
        let list: CallbackList<Callback> = CallbackList::new();
        let id1 = list.insert(Arc::new(|_| {}));
        let id2 = list.insert(Arc::new(|_| {}));
        assert_ne!(id1, id2);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let list: CallbackList<Callback> = CallbackList::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            list.insert(Arc::new(move |_| seen.lock().push(tag)));
        }

        for callback in list.snapshot() {
            callback(0);
        }
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn remove_nonexistent() {
        let list: CallbackList<Callback> = CallbackList::new();
        assert!(!list.remove(SubscriptionId::new(999)));
    }

    #[test]
    fn removal_during_dispatch_skips_nobody() {
        let list: Arc<CallbackList<Callback>> = Arc::new(CallbackList::new());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let token_slot: Arc<Mutex<Option<CancelToken<Callback>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&token_slot);
        let first_calls = Arc::clone(&calls);
        let first = list.insert(Arc::new(move |_| {
            first_calls.lock().push("first");
            if let Some(token) = slot.lock().as_ref() {
                token.cancel();
            }
        }));
        *token_slot.lock() = Some(CancelToken::new(first, &list));

        let second_calls = Arc::clone(&calls);
        list.insert(Arc::new(move |_| second_calls.lock().push("second")));

        for callback in list.snapshot() {
            callback(0);
        }
        assert_eq!(*calls.lock(), vec!["first", "second"]);
        assert_eq!(list.len(), 1);

        for callback in list.snapshot() {
            callback(0);
        }
        assert_eq!(*calls.lock(), vec!["first", "second", "second"]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let list: Arc<CallbackList<Callback>> = Arc::new(CallbackList::new());
        let id = list.insert(Arc::new(|_| {}));
        let token = CancelToken::new(id, &list);

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(list.is_empty());
    }

    #[test]
    fn cancel_after_list_dropped() {
        let list: Arc<CallbackList<Callback>> = Arc::new(CallbackList::new());
        let token = CancelToken::new(list.insert(Arc::new(|_| {})), &list);
        drop(list);
        assert!(!token.cancel());
    }

    #[test]
    fn clear_and_debug() {
        let list: CallbackList<Callback> = CallbackList::new();
        list.insert(Arc::new(|_| {}));
        assert!(format!("{list:?}").contains("callback_count: 1"));
        list.clear();
        assert!(list.is_empty());
    }
}
