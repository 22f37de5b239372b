//! In-memory conversation store for the multi-user relay.
//!
//! Conversations are keyed by the caller supplied user id and held in
//! a bounded LRU cache so memory stays flat no matter how many
//! distinct ids show up. Nothing is persisted.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use super::models::{Conversation, Turn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the store knows about one user.
///
/// `turn_gate` is held for the whole request/response cycle of a chat
/// submission so requests for the same user run one at a time.
/// `conversation` is only ever locked briefly, which keeps history
/// reads and health checks from waiting on an in-flight model call.
pub struct UserSlot {
    turn_gate: tokio::sync::Mutex<()>,
    conversation: Mutex<Conversation>,
}

impl UserSlot {
    fn new(history_limit: usize) -> Self {
        Self {
            turn_gate: tokio::sync::Mutex::new(()),
            conversation: Mutex::new(Conversation::with_limit(history_limit)),
        }
    }

    /// Wait for any other submission for this user to finish.
    pub async fn begin_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn_gate.lock().await
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        lock(&self.conversation).turns().to_vec()
    }

    /// Append the turns of a completed exchange and return the number
    /// of stored turns after truncation.
    pub fn commit(&self, turns: impl IntoIterator<Item = Turn>) -> usize {
        let mut conversation = lock(&self.conversation);
        conversation.extend(turns);
        conversation.len()
    }

    pub fn clear(&self) {
        lock(&self.conversation).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.conversation).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub active_users: usize,
    pub total_messages: usize,
}

pub struct ConversationStore {
    users: Mutex<LruCache<String, Arc<UserSlot>>>,
    history_limit: usize,
}

impl ConversationStore {
    pub fn new(max_users: usize, history_limit: usize) -> Self {
        let capacity = NonZeroUsize::new(max_users).unwrap_or(NonZeroUsize::MIN);
        Self {
            users: Mutex::new(LruCache::new(capacity)),
            history_limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Look up the user's slot, creating an empty one on first
    /// contact. Marks the user as most recently used.
    pub fn get_or_create(&self, user_id: &str) -> Arc<UserSlot> {
        let mut users = lock(&self.users);
        if let Some(slot) = users.get(user_id) {
            return Arc::clone(slot);
        }

        let slot = Arc::new(UserSlot::new(self.history_limit));
        if let Some((evicted, _)) = users.push(user_id.to_string(), Arc::clone(&slot)) {
            tracing::debug!("Evicted conversation for least recently used user {}", evicted);
        }
        slot
    }

    /// Look up without creating and without touching recency.
    pub fn get(&self, user_id: &str) -> Option<Arc<UserSlot>> {
        lock(&self.users).peek(user_id).cloned()
    }

    pub fn history(&self, user_id: &str) -> Vec<Turn> {
        self.get(user_id)
            .map(|slot| slot.snapshot())
            .unwrap_or_default()
    }

    /// Empty the user's conversation. Unknown users are left unknown.
    /// Returns whether there was a conversation to clear.
    pub fn clear(&self, user_id: &str) -> bool {
        match self.get(user_id) {
            Some(slot) => {
                slot.clear();
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> StoreStats {
        let slots: Vec<Arc<UserSlot>> = lock(&self.users)
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        StoreStats {
            active_users: slots.len(),
            total_messages: slots.iter().map(|slot| slot.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_reuses_slot() {
        let store = ConversationStore::new(10, 20);
        let a = store.get_or_create("u1");
        a.commit(vec![Turn::user("hello")]);
        let b = store.get_or_create("u1");
        assert_eq!(b.snapshot(), vec![Turn::user("hello")]);
    }

    #[test]
    fn test_history_for_unknown_user_is_empty() {
        let store = ConversationStore::new(10, 20);
        assert!(store.history("nobody").is_empty());
        assert!(store.get("nobody").is_none());
    }

    #[test]
    fn test_clear_is_idempotent_and_does_not_create() {
        let store = ConversationStore::new(10, 20);
        assert!(!store.clear("ghost"));
        assert!(!store.clear("ghost"));
        assert_eq!(store.stats().active_users, 0);

        store
            .get_or_create("u1")
            .commit(vec![Turn::user("a"), Turn::assistant("b")]);
        assert!(store.clear("u1"));
        assert!(store.clear("u1"));
        assert!(store.history("u1").is_empty());
    }

    #[test]
    fn test_commit_applies_history_limit() {
        let store = ConversationStore::new(10, 4);
        let slot = store.get_or_create("u1");
        for i in 0..3 {
            let count = slot.commit(vec![
                Turn::user(&format!("q{i}")),
                Turn::assistant(&format!("a{i}")),
            ]);
            assert_eq!(count, usize::min(2 * (i + 1), 4));
        }
        assert_eq!(slot.snapshot()[0], Turn::user("q1"));
    }

    #[test]
    fn test_least_recently_used_user_is_evicted() {
        let store = ConversationStore::new(2, 20);
        store.get_or_create("a").commit(vec![Turn::user("1")]);
        store.get_or_create("b").commit(vec![Turn::user("2")]);
        // Touch "a" so "b" becomes the eviction candidate
        store.get_or_create("a");
        store.get_or_create("c");

        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_stats() {
        let store = ConversationStore::new(10, 20);
        store
            .get_or_create("a")
            .commit(vec![Turn::user("1"), Turn::assistant("2")]);
        store.get_or_create("b").commit(vec![Turn::user("3")]);
        store.get_or_create("c");
        assert_eq!(
            store.stats(),
            StoreStats {
                active_users: 3,
                total_messages: 3
            }
        );
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = ConversationStore::new(0, 20);
        store.get_or_create("a");
        assert_eq!(store.stats().active_users, 1);
    }

    #[tokio::test]
    async fn test_turn_gate_serializes_same_user() {
        let store = ConversationStore::new(10, 20);
        let slot = store.get_or_create("u1");
        let guard = slot.begin_turn().await;
        let other = Arc::clone(&slot);
        let waiter = tokio::spawn(async move {
            let _g = other.begin_turn().await;
            other.len()
        });
        slot.commit(vec![Turn::user("q"), Turn::assistant("a")]);
        drop(guard);
        assert_eq!(waiter.await.unwrap(), 2);
    }
}
