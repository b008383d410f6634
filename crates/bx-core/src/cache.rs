//! # Local Cache Store
//!
//! Last-known-good snapshot of each seller's postings. A fallback for reads
//! when the backend is down, and a merge source so partial server responses
//! never make known postings disappear. No expiry.

use std::sync::Arc;

use crate::models::{Posting, SellerId};
use crate::traits::KeyValueStore;

const KEY_PREFIX: &str = "bx.postings.seller.";

pub fn cache_key(seller_id: SellerId) -> String {
    format!("{KEY_PREFIX}{seller_id}")
}

pub struct LocalCacheStore<S> {
    store: Arc<S>,
}

impl<S> Clone for LocalCacheStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> LocalCacheStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Overwrites the snapshot. An empty list removes the entry instead of
    /// storing `[]`, so "known empty" never shadows a later fetch.
    pub async fn save(&self, seller_id: SellerId, postings: &[Posting]) {
        let key = cache_key(seller_id);
        let outcome = if postings.is_empty() {
            self.store.remove(&key).await
        } else {
            match serde_json::to_string(postings) {
                Ok(json) => self.store.set(&key, json).await,
                Err(err) => Err(err.into()),
            }
        };
        if let Err(err) = outcome {
            tracing::warn!(%seller_id, error = %err, "Failed to write posting cache");
        }
    }

    /// Returns the snapshot; missing or corrupt entries read as empty.
    pub async fn load(&self, seller_id: SellerId) -> Vec<Posting> {
        let key = cache_key(seller_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(%seller_id, error = %err, "Failed to read posting cache");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(%seller_id, error = %err, "Discarding corrupt posting cache");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_posting, BuildContext, PostingInput};
    use crate::error::AppError;
    use crate::models::PostingDraft;
    use crate::storage::MemoryStore;
    use crate::traits::MockKeyValueStore;

    fn posting(name: &str) -> Posting {
        let draft = PostingDraft {
            name: Some(name.to_string()),
            ..Default::default()
        };
        build_posting(
            PostingInput::Form(draft),
            &BuildContext::new(chrono::Utc::now()).with_seller(Some(SellerId(42))),
        )
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = Arc::new(MemoryStore::new());
        let cache = LocalCacheStore::new(Arc::clone(&store));
        let postings = vec![posting("Trek"), posting("Giant")];

        cache.save(SellerId(42), &postings).await;

        assert_eq!(cache.load(SellerId(42)).await, postings);
        assert!(cache.load(SellerId(7)).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_save_clears_entry() {
        let store = Arc::new(MemoryStore::new());
        let cache = LocalCacheStore::new(Arc::clone(&store));
        cache.save(SellerId(42), &[posting("Trek")]).await;
        assert!(store.contains(&cache_key(SellerId(42))));

        cache.save(SellerId(42), &[]).await;

        assert!(!store.contains(&cache_key(SellerId(42))));
        assert!(cache.load(SellerId(42)).await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&cache_key(SellerId(42)), "{not json".to_string())
            .await
            .unwrap();
        let cache = LocalCacheStore::new(store);
        assert!(cache.load(SellerId(42)).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_are_absorbed() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Err(AppError::Internal("disk gone".into())));
        store
            .expect_set()
            .returning(|_, _| Err(AppError::Internal("disk gone".into())));
        let cache = LocalCacheStore::new(Arc::new(store));

        cache.save(SellerId(1), &[posting("Trek")]).await;
        assert!(cache.load(SellerId(1)).await.is_empty());
    }
}
