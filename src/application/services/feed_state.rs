use crate::domain::feed::{FeedCommand, FeedSnapshot, FeedStore, MergeOutcome};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// 1つのビューが持つストアへの共有ハンドル。書き込みは常にロック下で1件ずつ適用する
#[derive(Clone, Default)]
pub struct FeedState {
    inner: Arc<RwLock<Option<FeedStore>>>,
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(FeedStore::new()))),
        }
    }

    /// 破棄済みなら `None` を返し、結果は捨てられる
    pub async fn apply(&self, command: FeedCommand) -> Option<MergeOutcome> {
        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(store) => Some(store.apply(command)),
            None => {
                debug!("feed torn down; dropping command");
                None
            }
        }
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let guard = self.inner.read().await;
        guard.as_ref().map(FeedStore::snapshot).unwrap_or_default()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&FeedStore) -> R) -> Option<R> {
        let guard = self.inner.read().await;
        guard.as_ref().map(f)
    }

    pub async fn len(&self) -> usize {
        self.read(FeedStore::len).await.unwrap_or(0)
    }

    pub async fn teardown(&self) {
        let mut guard = self.inner.write().await;
        guard.take();
    }

    pub async fn is_active(&self) -> bool {
        self.inner.read().await.is_some()
    }
}
