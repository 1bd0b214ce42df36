//! Live sessions held by the server.
//!
//! Every session in memory has exactly one handle. The LRU keeps recently
//! used handles alive; `handles` keeps a weak reference to each of them, so a
//! session evicted from the LRU while a request still holds it is found again
//! instead of being reloaded from the store as a second, diverging copy.

use docent_core::{ChatSession, LruCache, SessionId};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::debug;

/// A session plus its tombstone.
#[derive(Debug)]
pub(crate) struct LiveSession {
    pub session: ChatSession,
    /// Set by `DELETE` while holding the lock. Holders must not save.
    pub deleted: bool,
}

impl LiveSession {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            deleted: false,
        }
    }
}

pub(crate) type SessionHandle = Arc<Mutex<LiveSession>>;

pub(crate) struct LiveSessions {
    cache: LruCache<SessionId, SessionHandle>,
    handles: BTreeMap<SessionId, Weak<Mutex<LiveSession>>>,
}

impl LiveSessions {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            handles: BTreeMap::new(),
        }
    }

    /// The handle for `id` if the session is in memory.
    pub fn get(&mut self, id: SessionId) -> Option<SessionHandle> {
        if let Some(handle) = self.cache.get(&id) {
            return Some(Arc::clone(handle));
        }
        match self.handles.get(&id).map(Weak::upgrade) {
            Some(Some(handle)) => {
                debug!(session = %id, "revived evicted session still in use");
                self.insert(id, Arc::clone(&handle));
                Some(handle)
            }
            Some(None) => {
                self.handles.remove(&id);
                None
            }
            None => None,
        }
    }

    /// Register a handle and make it the most recently used.
    pub fn insert(&mut self, id: SessionId, handle: SessionHandle) {
        self.handles.insert(id, Arc::downgrade(&handle));
        if let Some((evicted, old)) = self.cache.insert(id, handle) {
            drop(old);
            let dead = self
                .handles
                .get(&evicted)
                .is_none_or(|w| w.strong_count() == 0);
            if dead {
                self.handles.remove(&evicted);
            }
            debug!(session = %evicted, in_use = !dead, "evicted from live cache");
        }
    }

    /// Drop every trace of `id`.
    pub fn forget(&mut self, id: SessionId) {
        self.cache.remove(&id);
        self.handles.remove(&id);
    }
}
