use crate::application::ports::change_feed::{ChangeFeed, ChangeSubscription, SubscriptionHandle};
use crate::domain::entities::{ChangeRecord, ChangeScope};
use crate::shared::error::AppError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

const DEFAULT_SUBSCRIBER_BUFFER: usize = 128;

struct Subscriber {
    scope: ChangeScope,
    sender: mpsc::Sender<ChangeRecord>,
}

/// プロセス内の変更チャネル。スコープごとに購読者へ配信する
#[derive(Clone)]
pub struct InMemoryChangeFeed {
    subscribers: Arc<RwLock<HashMap<u64, Subscriber>>>,
    next_subscription_id: Arc<AtomicU64>,
    buffer: usize,
}

impl Default for InMemoryChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl InMemoryChangeFeed {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_subscription_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
        }
    }

    /// スコープに一致する購読者へ配信し、配信できた数を返す
    pub async fn publish(&self, record: ChangeRecord) -> usize {
        let senders: Vec<(u64, mpsc::Sender<ChangeRecord>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .filter(|(_, subscriber)| subscriber.scope.matches(&record))
                .map(|(&id, subscriber)| (id, subscriber.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut closed_ids = Vec::new();
        for (id, sender) in senders {
            match sender.try_send(record.clone()) {
                Ok(_) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(pending)) => {
                    if sender.send(pending).await.is_ok() {
                        delivered += 1;
                    } else {
                        closed_ids.push(id);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed_ids.push(id),
            }
        }

        if !closed_ids.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed_ids {
                subscribers.remove(&id);
            }
        }

        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.len()
    }
}

#[async_trait]
impl ChangeFeed for InMemoryChangeFeed {
    async fn subscribe(&self, scope: ChangeScope) -> Result<ChangeSubscription, AppError> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(
                id,
                Subscriber {
                    scope: scope.clone(),
                    sender: tx,
                },
            );
        }
        debug!(subscription_id = id, scope = %scope, "change feed subscribed");

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|record| (record, rx))
        })
        .boxed();

        Ok(ChangeSubscription {
            handle: SubscriptionHandle { id, scope },
            events,
        })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), AppError> {
        // 送信側を破棄するとストリームが終端する
        let removed = {
            let mut subscribers = self.subscribers.write().await;
            subscribers.remove(&handle.id).is_some()
        };
        if !removed {
            debug!(subscription = %handle, "unsubscribe for unknown subscription");
        }
        Ok(())
    }
}
