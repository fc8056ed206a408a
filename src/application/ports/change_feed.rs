use crate::domain::entities::{ChangeRecord, ChangeScope};
use crate::shared::error::AppError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// 購読ハンドル。解除時にのみ使う
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub scope: ChangeScope,
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scope, self.id)
    }
}

/// 到着順に並んだ変更レコードのストリームとそのハンドル
pub struct ChangeSubscription {
    pub handle: SubscriptionHandle,
    pub events: BoxStream<'static, ChangeRecord>,
}

impl fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSubscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// ライブ変更チャネル。配送は信頼性があり順序付きであることを前提とする
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, scope: ChangeScope) -> Result<ChangeSubscription, AppError>;

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), AppError>;
}
