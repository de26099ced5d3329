//! Connected clients and their topic subscriptions.
//!
//! Everything sits behind one `parking_lot::Mutex` that is held only for the
//! map operation itself. Callers get `Arc` snapshots back and do their I/O
//! after the lock is released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::client::Deliverable;
use super::event::Topic;

#[derive(Default)]
struct Inner {
    clients: HashMap<String, Arc<dyn Deliverable>>,
    topics: HashMap<Topic, HashSet<String>>,
    /// Reverse index so removal can clean every topic set.
    subscriptions: HashMap<String, HashSet<Topic>>,
}

impl Inner {
    fn detach(&mut self, client_id: &str) -> Option<Arc<dyn Deliverable>> {
        let client = self.clients.remove(client_id)?;
        for topic in self.subscriptions.remove(client_id).unwrap_or_default() {
            if let Some(set) = self.topics.get_mut(&topic) {
                set.remove(client_id);
                if set.is_empty() {
                    self.topics.remove(&topic);
                }
            }
        }
        Some(client)
    }
}

#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client. Returns the client previously registered under the
    /// same id, already detached, for the caller to close.
    pub fn insert(&self, client: Arc<dyn Deliverable>) -> Option<Arc<dyn Deliverable>> {
        let mut inner = self.inner.lock();
        let previous = inner.detach(client.id());
        inner.clients.insert(client.id().to_string(), client);
        previous
    }

    /// Returns false when the client is not registered.
    pub fn subscribe(&self, client_id: &str, topic: Topic) -> bool {
        let mut inner = self.inner.lock();
        if !inner.clients.contains_key(client_id) {
            return false;
        }
        inner
            .topics
            .entry(topic.clone())
            .or_default()
            .insert(client_id.to_string());
        inner
            .subscriptions
            .entry(client_id.to_string())
            .or_default()
            .insert(topic);
        true
    }

    /// Returns whether the client was subscribed.
    pub fn unsubscribe(&self, client_id: &str, topic: &Topic) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner
            .subscriptions
            .get_mut(client_id)
            .is_some_and(|topics| topics.remove(topic));
        if let Some(set) = inner.topics.get_mut(topic) {
            set.remove(client_id);
            if set.is_empty() {
                inner.topics.remove(topic);
            }
        }
        removed
    }

    pub fn remove(&self, client_id: &str) -> Option<Arc<dyn Deliverable>> {
        self.inner.lock().detach(client_id)
    }

    /// Removes every listed client in one critical section.
    pub fn remove_many(&self, client_ids: &[String]) -> Vec<Arc<dyn Deliverable>> {
        let mut inner = self.inner.lock();
        client_ids
            .iter()
            .filter_map(|id| inner.detach(id))
            .collect()
    }

    /// Removes everyone; used at shutdown.
    pub fn drain(&self) -> Vec<Arc<dyn Deliverable>> {
        let mut inner = self.inner.lock();
        inner.topics.clear();
        inner.subscriptions.clear();
        inner.clients.drain().map(|(_, client)| client).collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn Deliverable>> {
        self.inner.lock().clients.values().cloned().collect()
    }

    pub fn subscribers(&self, topic: &Topic) -> Vec<Arc<dyn Deliverable>> {
        let inner = self.inner.lock();
        inner
            .topics
            .get(topic)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.clients.get(id).cloned())
            .collect()
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.inner.lock().clients.contains_key(client_id)
    }

    pub fn is_subscribed(&self, client_id: &str, topic: &Topic) -> bool {
        self.inner
            .lock()
            .subscriptions
            .get(client_id)
            .is_some_and(|topics| topics.contains(topic))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn topic_count(&self) -> usize {
        self.inner.lock().topics.len()
    }
}
