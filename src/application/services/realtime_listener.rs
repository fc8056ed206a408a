use super::feed_state::FeedState;
use super::user_summary_service::UserSummaryService;
use crate::application::ports::change_feed::{ChangeFeed, SubscriptionHandle};
use crate::application::shared::mappers::decode_change;
use crate::domain::entities::{
    ChangeEvent, ChangeRecord, ChangeScope, Comment, CommentRecord, MediaRef, Post, PostRecord,
};
use crate::domain::feed::FeedCommand;
use crate::shared::error::AppError;
use chrono::Utc;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 変更レコード1件をストアへの変更に変換して適用する
#[derive(Clone)]
pub struct ChangeApplier {
    users: Arc<UserSummaryService>,
    state: FeedState,
}

impl ChangeApplier {
    pub fn new(users: Arc<UserSummaryService>, state: FeedState) -> Self {
        Self { users, state }
    }

    pub async fn handle(&self, record: ChangeRecord) {
        let event = match decode_change(&record) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(kind = %record.kind, table = %record.table, "ignoring unsupported change");
                return;
            }
            Err(e) => {
                warn!(kind = %record.kind, table = %record.table, error = %e, "malformed change record");
                return;
            }
        };

        let command = self.to_command(event).await;
        match self.state.apply(command).await {
            Some(outcome) => debug!(?outcome, "realtime change applied"),
            None => debug!("feed torn down; realtime change dropped"),
        }
    }

    async fn to_command(&self, event: ChangeEvent) -> FeedCommand {
        match event {
            ChangeEvent::PostCreated(record) => FeedCommand::Prepend(self.post_from(record).await),
            ChangeEvent::PostUpdated(record) => {
                FeedCommand::PatchPost(self.post_from(record).await)
            }
            ChangeEvent::PostDeleted { post_id } => FeedCommand::RemovePost(post_id),
            ChangeEvent::CommentCreated(record) => {
                let post_id = record.post_id.clone();
                FeedCommand::MergeComment {
                    post_id,
                    comment: self.comment_from(record).await,
                }
            }
            ChangeEvent::CommentDeleted {
                post_id,
                comment_id,
            } => FeedCommand::RemoveComment {
                post_id,
                comment_id,
            },
            ChangeEvent::LikeAdded(like) => FeedCommand::ToggleLike { like, add: true },
            ChangeEvent::LikeRemoved(like) => FeedCommand::ToggleLike { like, add: false },
        }
    }

    async fn post_from(&self, record: PostRecord) -> Post {
        let author = self.users.resolve(&record.user_id).await;
        let mut post = Post::new(
            record.id,
            author,
            record.body,
            record.created_at.unwrap_or_else(Utc::now),
        );
        if let Some(file) = record.file {
            post = post.with_media(MediaRef::new(file));
        }
        post
    }

    async fn comment_from(&self, record: CommentRecord) -> Comment {
        let author = self.users.resolve(&record.user_id).await;
        Comment::new(
            record.id,
            record.post_id,
            author,
            record.text,
            record.created_at.unwrap_or_else(Utc::now),
        )
    }
}

struct ActiveSubscription {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

/// ライブ変更チャネルの購読を管理する。購読ごとに1タスクで到着順に処理する
pub struct RealtimeListener {
    change_feed: Arc<dyn ChangeFeed>,
    applier: ChangeApplier,
    subscriptions: Arc<Mutex<Vec<ActiveSubscription>>>,
}

impl RealtimeListener {
    pub fn new(
        change_feed: Arc<dyn ChangeFeed>,
        users: Arc<UserSummaryService>,
        state: FeedState,
    ) -> Self {
        Self {
            change_feed,
            applier: ChangeApplier::new(users, state),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn subscribe(&self, scope: ChangeScope) -> Result<SubscriptionHandle, AppError> {
        let subscription = self.change_feed.subscribe(scope.clone()).await?;
        let handle = subscription.handle.clone();
        let mut events = subscription.events;
        let applier = self.applier.clone();

        let task = tokio::spawn(async move {
            while let Some(record) = events.next().await {
                // 購読側でスコープを絞れないチャネルもあるため再確認する
                if !scope.matches(&record) {
                    continue;
                }
                applier.handle(record).await;
            }
            debug!(scope = %scope, "change stream ended");
        });

        info!(subscription = %handle, "realtime subscription started");
        self.lock_subscriptions().push(ActiveSubscription {
            handle: handle.clone(),
            task,
        });
        Ok(handle)
    }

    pub fn active_handles(&self) -> Vec<SubscriptionHandle> {
        self.lock_subscriptions()
            .iter()
            .map(|subscription| subscription.handle.clone())
            .collect()
    }

    /// 失敗しても残りの購読の解除を続ける
    pub async fn unsubscribe_all(&self) {
        let subscriptions = std::mem::take(&mut *self.lock_subscriptions());
        for subscription in subscriptions {
            subscription.task.abort();
            match self.change_feed.unsubscribe(&subscription.handle).await {
                Ok(()) => info!(subscription = %subscription.handle, "realtime subscription closed"),
                Err(e) => {
                    warn!(subscription = %subscription.handle, error = %e, "unsubscribe failed")
                }
            }
        }
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<ActiveSubscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for RealtimeListener {
    fn drop(&mut self) {
        let subscriptions = std::mem::take(&mut *self.lock_subscriptions());
        if subscriptions.is_empty() {
            return;
        }
        for subscription in &subscriptions {
            subscription.task.abort();
        }

        // ランタイム外で破棄された場合はタスク停止のみ
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                count = subscriptions.len(),
                "listener dropped outside runtime; remote unsubscribe skipped"
            );
            return;
        };
        let change_feed = Arc::clone(&self.change_feed);
        runtime.spawn(async move {
            for subscription in subscriptions {
                if let Err(e) = change_feed.unsubscribe(&subscription.handle).await {
                    warn!(subscription = %subscription.handle, error = %e, "unsubscribe on drop failed");
                }
            }
        });
    }
}
