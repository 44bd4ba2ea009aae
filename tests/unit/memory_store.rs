use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use jwt_sessions::storage::{self, StoreConfig};
use jwt_sessions::{Error, ManualClock, MemoryStore, Result, SessionStore, StoreStats};

fn memory(limit: usize) -> (Arc<ManualClock>, MemoryStore) {
    let clock = Arc::new(ManualClock::new(100));
    let store = MemoryStore::new(
        StoreConfig {
            prefix: "jwt:".into(),
            limit,
        },
        clock.clone(),
    );
    (clock, store)
}

#[tokio::test(flavor = "current_thread")]
async fn ttl_entry_is_gone_strictly_after_ttl_without_sweep() {
    let (clock, store) = memory(100);
    store.set("token:a", json!({"x": 1}), 10).await.unwrap();
    clock.advance(10);
    assert!(store.has("token:a").await.unwrap());
    clock.advance(1);
    assert!(!store.has("token:a").await.unwrap());
    assert_eq!(store.get("token:a").await.unwrap(), None);
}

#[tokio::test(flavor = "current_thread")]
async fn fifo_eviction_drops_oldest_first() {
    let (_clock, store) = memory(3);
    for key in ["a", "b", "c", "d", "e"] {
        store.set(key, json!(key), 0).await.unwrap();
    }
    let found = store
        .get_multiple(&["a", "b", "c", "d", "e"].map(String::from))
        .await
        .unwrap();
    let mut keys: Vec<_> = found.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["c", "d", "e"]);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.backend, "memory");
    assert_eq!(stats.counter("evictions"), Some(2));
    assert_eq!(stats.counter("entries"), Some(3));
}

#[tokio::test(flavor = "current_thread")]
async fn batch_operations_apply_every_key() {
    let (_clock, store) = memory(10);
    let entries = vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))];
    assert!(store.set_multiple(entries, 0).await.unwrap());
    assert_eq!(
        store
            .get_multiple(&["a".into(), "b".into(), "z".into()])
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(
        store
            .delete_multiple(&["a".into(), "z".into()])
            .await
            .unwrap()
    );
    assert!(!store.has("a").await.unwrap());
    assert!(store.has("b").await.unwrap());
}

/// Fails every write after the first `budget`.
struct FlakyStore {
    inner: MemoryStore,
    budget: AtomicUsize,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn set(&self, key: &str, value: Value, ttl_secs: u64) -> Result<bool> {
        if self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(1))
            .is_err()
        {
            return Err(Error::Storage("write budget exhausted".into()));
        }
        self.inner.set(key, value, ttl_secs).await
    }
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key).await
    }
    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }
    async fn has(&self, key: &str) -> Result<bool> {
        self.inner.has(key).await
    }
    async fn blacklist(&self, jti: &str, ttl_secs: u64) -> Result<bool> {
        self.inner.blacklist(jti, ttl_secs).await
    }
    async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        self.inner.is_blacklisted(jti).await
    }
    async fn clean_expired(&self) -> Result<usize> {
        self.inner.clean_expired().await
    }
    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }
}

#[tokio::test(flavor = "current_thread")]
async fn partial_batch_failure_keeps_earlier_writes() {
    let (_clock, inner) = memory(10);
    let store = FlakyStore {
        inner,
        budget: AtomicUsize::new(2),
    };
    let entries = ["a", "b", "c"]
        .into_iter()
        .map(|k| (k.to_string(), json!(k)))
        .collect();
    let err = store.set_multiple(entries, 0).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(store.has("a").await.unwrap());
    assert!(store.has("b").await.unwrap());
    assert!(!store.has("c").await.unwrap());
}

#[tokio::test(flavor = "current_thread")]
async fn factory_shares_clock_with_memory_backend() {
    let clock = Arc::new(ManualClock::new(0));
    let store = storage::build("memory", &StoreConfig::default(), clock.clone()).unwrap();
    store.blacklist("j", 5).await.unwrap();
    clock.advance(6);
    assert!(!store.is_blacklisted("j").await.unwrap());
    assert_eq!(store.clean_expired().await.unwrap(), 1);
}
