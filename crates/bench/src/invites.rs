//! Run-wide pool of invite codes shared between VUs.
//!
//! Active users publish the invites they create here; other VUs sample a
//! few at random and try to join those guilds, which is what produces
//! cross-guild fan-out on the WebSocket side.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::IndexedRandom as _;

#[derive(Debug, Default)]
struct Inner {
    codes: Vec<String>,
    seen: HashSet<String>,
}

/// Clone-shared invite pool.
#[derive(Debug, Clone, Default)]
pub struct InviteStore {
    inner: Arc<RwLock<Inner>>,
}

impl InviteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a code. Duplicates are ignored.
    pub fn add(&self, code: impl Into<String>) {
        let code = code.into();
        let mut inner = self.inner.write();
        if inner.seen.insert(code.clone()) {
            inner.codes.push(code);
        }
    }

    /// Up to `n` distinct codes, chosen uniformly at random. Returns fewer
    /// when the pool is small, and nothing when it is empty.
    pub fn sample(&self, n: usize) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .codes
            .choose_multiple(&mut rand::rng(), n)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_ignored() {
        let store = InviteStore::new();
        store.add("abc");
        store.add("abc");
        store.add("def");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn sample_is_distinct_and_bounded() {
        let store = InviteStore::new();
        for i in 0..10 {
            store.add(format!("code-{i}"));
        }

        let picked = store.sample(3);
        assert_eq!(picked.len(), 3);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 3);

        assert_eq!(store.sample(100).len(), 10);
        assert!(InviteStore::new().sample(3).is_empty());
    }
}
