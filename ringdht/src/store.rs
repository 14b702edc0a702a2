//! Local key-value table and the requests waiting on it.
//!
//! The table does not distinguish owned entries from replicas. Pending gets
//! are a multimap: every local `get` for a key registers its own slot, and
//! one response for that key resolves all of them.

use std::fmt;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use hashbrown::HashMap;

use crate::packet::{Key, Value};

/// Outcome of a get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Value),
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

impl From<Option<Value>> for Lookup {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// Single-threaded completion slot. Peers are driven by one event loop, so
/// no real locking is needed.
type Slot = Rc<Signal<NoopRawMutex, Lookup>>;

/// Handle returned by a local `get`.
///
/// Resolved later by the event that delivers the matching `GetResponse`.
/// Never resolves if the request or its response is lost on the way.
#[derive(Clone)]
pub struct GetHandle {
    key: Key,
    slot: Slot,
}

impl GetHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True once a response arrived and has not been taken yet.
    pub fn is_resolved(&self) -> bool {
        self.slot.signaled()
    }

    /// Take the result if it has arrived. The result can be taken once.
    pub fn try_take(&self) -> Option<Lookup> {
        self.slot.try_take()
    }

    /// Wait for the result.
    ///
    /// Must not be awaited from inside a peer's event handler: the response
    /// is delivered by the same event loop.
    pub async fn wait(&self) -> Lookup {
        self.slot.wait().await
    }
}

impl fmt::Debug for GetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetHandle")
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Per-peer storage.
#[derive(Default)]
pub struct Store {
    table: HashMap<Key, Value>,
    pending_gets: HashMap<Key, Vec<Slot>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an entry. Last writer wins.
    pub fn insert(&mut self, key: Key, value: Value) -> Option<Value> {
        self.table.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.table.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.table.iter()
    }

    /// Register a local request for `key`.
    pub fn register_get(&mut self, key: &str) -> GetHandle {
        let slot: Slot = Rc::new(Signal::new());
        self.pending_gets
            .entry(key.to_owned())
            .or_default()
            .push(Rc::clone(&slot));
        GetHandle {
            key: key.to_owned(),
            slot,
        }
    }

    /// Number of local requests still waiting on `key`.
    pub fn pending_gets(&self, key: &str) -> usize {
        self.pending_gets.get(key).map_or(0, Vec::len)
    }

    /// Resolve every request waiting on `key`. Returns how many were resolved.
    pub fn resolve_gets(&mut self, key: &str, value: Option<Value>) -> usize {
        let Some(slots) = self.pending_gets.remove(key) else {
            return 0;
        };
        let lookup = Lookup::from(value);
        for slot in &slots {
            slot.signal(lookup.clone());
        }
        slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_writer_wins() {
        let mut store = Store::new();
        assert_eq!(store.insert("k".into(), b"1".to_vec()), None);
        assert_eq!(store.insert("k".into(), b"2".to_vec()), Some(b"1".to_vec()));
        assert_eq!(store.get("k"), Some(&b"2".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_one_response_resolves_all_waiters() {
        let mut store = Store::new();
        let first = store.register_get("k");
        let second = store.register_get("k");
        let other = store.register_get("other");
        assert_eq!(store.pending_gets("k"), 2);

        let resolved = store.resolve_gets("k", Some(b"v".to_vec()));

        assert_eq!(resolved, 2);
        assert_eq!(store.pending_gets("k"), 0);
        assert_eq!(first.try_take(), Some(Lookup::Found(b"v".to_vec())));
        assert_eq!(second.try_take(), Some(Lookup::Found(b"v".to_vec())));
        assert!(!other.is_resolved());
        assert_eq!(store.pending_gets("other"), 1);
    }

    #[test]
    fn test_response_without_waiters_is_ignored() {
        let mut store = Store::new();
        assert_eq!(store.resolve_gets("k", None), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_not_found_resolution() {
        let mut store = Store::new();
        let handle = store.register_get("missing");
        store.resolve_gets("missing", None);
        assert!(handle.is_resolved());
        assert_eq!(handle.try_take(), Some(Lookup::NotFound));
        assert!(!handle.is_resolved());
    }

    #[test]
    fn test_wait_completes_after_resolution() {
        let mut store = Store::new();
        let handle = store.register_get("k");
        store.resolve_gets("k", Some(b"v".to_vec()));
        let lookup = embassy_futures::block_on(handle.wait());
        assert_eq!(lookup.into_value(), Some(b"v".to_vec()));
    }
}
