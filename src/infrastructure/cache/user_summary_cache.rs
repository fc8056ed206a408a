use crate::application::ports::cache::UserSummaryCache;
use crate::domain::entities::UserSummary;
use crate::domain::value_objects::UserId;
use crate::shared::config::CacheConfig;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
struct CacheEntry {
    data: UserSummary,
    /// `None` は期限なし（TTL が大きすぎて時刻を表せない）
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// ユーザー概要のメモリキャッシュ（容量上限つき LRU + TTL）
#[derive(Clone)]
pub struct LruUserSummaryCache {
    cache: Arc<RwLock<LruCache<UserId, CacheEntry>>>,
    ttl: Duration,
}

impl LruUserSummaryCache {
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.user_capacity, config.user_ttl_secs)
    }

    /// 指定したTTLで保存
    pub async fn put_with_ttl(&self, summary: UserSummary, ttl: Duration) {
        let entry = CacheEntry {
            expires_at: Instant::now().checked_add(ttl),
            data: summary,
        };
        let mut cache = self.cache.write().await;
        cache.put(entry.data.id.clone(), entry);
    }

    /// 期限切れのエントリを削除
    pub async fn cleanup_expired(&self) {
        let mut cache = self.cache.write().await;
        let now = Instant::now();
        let expired: Vec<UserId> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            cache.pop(&id);
        }
    }

    pub async fn size(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

#[async_trait]
impl UserSummaryCache for LruUserSummaryCache {
    async fn put(&self, summary: UserSummary) {
        self.put_with_ttl(summary, self.ttl).await;
    }

    async fn get(&self, id: &UserId) -> Option<UserSummary> {
        // LRU の参照順を更新するため書き込みロックを取る
        let mut cache = self.cache.write().await;
        let expired = match cache.get(id) {
            Some(entry) if !entry.is_expired(Instant::now()) => return Some(entry.data.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(id);
        }
        None
    }

    async fn invalidate(&self, id: &UserId) {
        let mut cache = self.cache.write().await;
        cache.pop(id);
    }

    async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }
}
