use super::feed_session::SessionContext;
use super::feed_state::FeedState;
use crate::application::ports::mutation_gateway::MutationGateway;
use crate::application::ports::notification_gateway::NotificationGateway;
use crate::domain::entities::{
    Comment, Like, MediaRef, NewComment, NewPost, NotificationDraft, Post,
};
use crate::domain::feed::{FeedCommand, MergeOutcome};
use crate::domain::value_objects::{CommentId, MutationId, PostId, UserId};
use crate::shared::config::MutationConfig;
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const COMMENT_NOTIFICATION_TITLE: &str = "commented on your post";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    PostCreate,
    LikeAdd,
    LikeRemove,
    CommentAdd,
    CommentRemove,
    PostDelete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::PostCreate => "post-create",
            MutationKind::LikeAdd => "like-add",
            MutationKind::LikeRemove => "like-remove",
            MutationKind::CommentAdd => "comment-add",
            MutationKind::CommentRemove => "comment-remove",
            MutationKind::PostDelete => "post-delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    InFlight,
    Confirmed,
    Failed,
}

/// 直列化の単位。同じキーの変更は同時に1つまで
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Post(PostId),
    /// 投稿ごとの自分のいいね
    Like(PostId),
    Comment(CommentId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Post(id) => write!(f, "post:{id}"),
            EntityKey::Like(id) => write!(f, "like:{id}"),
            EntityKey::Comment(id) => write!(f, "comment:{id}"),
        }
    }
}

/// 適用済みの楽観的変更。`inverse` はその正確な逆操作
#[derive(Debug, Clone, PartialEq)]
pub enum OptimisticPatch {
    InsertPost { post_id: PostId },
    AddLike { like: Like },
    RemoveLike { like: Like, index: usize },
    AddComment { post_id: PostId, comment_id: CommentId },
    RemoveComment {
        post_id: PostId,
        index: usize,
        comment: Comment,
    },
    RemovePost { index: usize, post: Post },
    /// ストアが既に目的の状態だった
    Noop,
}

impl OptimisticPatch {
    pub fn inverse(&self) -> Option<FeedCommand> {
        let command = match self {
            OptimisticPatch::InsertPost { post_id } => FeedCommand::RemovePost(post_id.clone()),
            OptimisticPatch::AddLike { like } => FeedCommand::ToggleLike {
                like: like.clone(),
                add: false,
            },
            OptimisticPatch::RemoveLike { like, index } => FeedCommand::RestoreLike {
                like: like.clone(),
                index: *index,
            },
            OptimisticPatch::AddComment {
                post_id,
                comment_id,
            } => FeedCommand::RemoveComment {
                post_id: Some(post_id.clone()),
                comment_id: comment_id.clone(),
            },
            OptimisticPatch::RemoveComment {
                post_id,
                index,
                comment,
            } => FeedCommand::RestoreComment {
                post_id: post_id.clone(),
                index: *index,
                comment: comment.clone(),
            },
            OptimisticPatch::RemovePost { index, post } => FeedCommand::RestorePost {
                index: *index,
                post: post.clone(),
            },
            OptimisticPatch::Noop => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub target: EntityKey,
    pub patch: OptimisticPatch,
    pub status: MutationStatus,
}

/// 画面に一度だけ表示する通知
#[derive(Debug, Clone, PartialEq)]
pub enum FeedNotice {
    MutationReverted { kind: MutationKind, message: String },
}

type Registry = Arc<Mutex<HashMap<EntityKey, PendingMutation>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<EntityKey, PendingMutation>> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 実行中の登録。破棄時に必ず解除する
struct InFlight {
    registry: Registry,
    pending: PendingMutation,
}

impl InFlight {
    fn acquire(registry: &Registry, kind: MutationKind, key: EntityKey) -> Result<Self, AppError> {
        let mut entries = lock(registry);
        if let Some(existing) = entries.get(&key) {
            debug!(target_key = %key, in_flight = %existing.kind, "rejecting concurrent mutation");
            return Err(AppError::Conflict(format!(
                "{} already in flight for {key}",
                existing.kind
            )));
        }
        let pending = PendingMutation {
            id: MutationId::generate(),
            kind,
            target: key.clone(),
            patch: OptimisticPatch::Noop,
            status: MutationStatus::InFlight,
        };
        entries.insert(key, pending.clone());
        Ok(Self {
            registry: Arc::clone(registry),
            pending,
        })
    }

    fn record_patch(&mut self, patch: OptimisticPatch) {
        self.pending.patch = patch;
        if let Some(entry) = lock(&self.registry).get_mut(&self.pending.target) {
            entry.patch = self.pending.patch.clone();
        }
    }

    /// 登録を解除し、最終状態を返す
    fn finish(mut self, status: MutationStatus) -> PendingMutation {
        self.pending.status = status;
        self.pending.clone()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.pending.target);
    }
}

/// 楽観的更新を適用し、サーバー応答で確定または正確に巻き戻す
#[derive(Clone)]
pub struct MutationCoordinator {
    gateway: Arc<dyn MutationGateway>,
    notifications: Option<Arc<dyn NotificationGateway>>,
    state: FeedState,
    context: SessionContext,
    config: MutationConfig,
    in_flight: Registry,
    /// いいね変更が完了するたびに進む
    like_epoch: Arc<AtomicU64>,
    notices: broadcast::Sender<FeedNotice>,
}

impl MutationCoordinator {
    pub fn new(
        gateway: Arc<dyn MutationGateway>,
        state: FeedState,
        context: SessionContext,
        config: MutationConfig,
        notice_capacity: usize,
    ) -> Self {
        let (notices, _) = broadcast::channel(notice_capacity.max(1));
        Self {
            gateway,
            notifications: None,
            state,
            context,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            like_epoch: Arc::new(AtomicU64::new(0)),
            notices,
        }
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationGateway>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<FeedNotice> {
        self.notices.subscribe()
    }

    /// 実行中の変更一覧
    pub fn pending(&self) -> Vec<PendingMutation> {
        lock(&self.in_flight).values().cloned().collect()
    }

    pub fn like_epoch(&self) -> u64 {
        self.like_epoch.load(Ordering::SeqCst)
    }

    /// `epoch` を取得してから自分のいいねが変わった、または変更中か
    pub fn like_changed_since(&self, post_id: &PostId, epoch: u64) -> bool {
        self.like_epoch() != epoch
            || lock(&self.in_flight).contains_key(&EntityKey::Like(post_id.clone()))
    }

    /// 現在の状態に応じていいねを付け外しし、変更後に「いいね済み」かを返す
    pub async fn toggle_like(&self, post_id: &PostId) -> Result<bool, AppError> {
        let me = self.context.user_id().clone();
        let liked = self
            .state
            .read(|store| store.post(post_id).map(|post| post.is_liked_by(&me)))
            .await
            .flatten()
            .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;

        if liked {
            self.remove_like(post_id).await.map(|_| false)
        } else {
            self.add_like(post_id).await.map(|_| true)
        }
    }

    pub async fn add_like(&self, post_id: &PostId) -> Result<(), AppError> {
        self.ensure_post(post_id).await?;
        let mut guard = InFlight::acquire(
            &self.in_flight,
            MutationKind::LikeAdd,
            EntityKey::Like(post_id.clone()),
        )?;

        let like = Like::new(post_id.clone(), self.context.user_id().clone());
        let patch = match self
            .apply_patch(FeedCommand::ToggleLike {
                like: like.clone(),
                add: true,
            })
            .await?
        {
            MergeOutcome::Added(_) => OptimisticPatch::AddLike { like: like.clone() },
            _ => OptimisticPatch::Noop,
        };
        guard.record_patch(patch);

        let result = self.gateway.create_like(&like).await;
        let settled = self.settle(guard, result).await;
        self.like_epoch.fetch_add(1, Ordering::SeqCst);
        settled
    }

    pub async fn remove_like(&self, post_id: &PostId) -> Result<(), AppError> {
        self.ensure_post(post_id).await?;
        let mut guard = InFlight::acquire(
            &self.in_flight,
            MutationKind::LikeRemove,
            EntityKey::Like(post_id.clone()),
        )?;

        let like = Like::new(post_id.clone(), self.context.user_id().clone());
        let patch = match self
            .apply_patch(FeedCommand::ToggleLike {
                like: like.clone(),
                add: false,
            })
            .await?
        {
            MergeOutcome::Removed(index) => OptimisticPatch::RemoveLike {
                like: like.clone(),
                index,
            },
            _ => OptimisticPatch::Noop,
        };
        guard.record_patch(patch);

        let result = self
            .gateway
            .remove_like(&like.post_id, &like.user_id)
            .await;
        let settled = self.settle(guard, result).await;
        self.like_epoch.fetch_add(1, Ordering::SeqCst);
        settled
    }

    /// 一時IDで先頭に挿入し、成功時に確定IDへ置き換えたコメントを返す
    pub async fn add_comment(&self, post_id: &PostId, text: &str) -> Result<Comment, AppError> {
        let text = self.validate_comment(text)?;
        ensure_published(post_id)?;
        let post_author = self
            .state
            .read(|store| store.post(post_id).map(|post| post.author.id.clone()))
            .await
            .flatten()
            .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;

        let local = Comment::new_local(post_id.clone(), self.context.user.clone(), text.clone());
        let local_id = local.id.clone();
        let mut guard = InFlight::acquire(
            &self.in_flight,
            MutationKind::CommentAdd,
            EntityKey::Comment(local_id.clone()),
        )?;

        let patch = match self
            .apply_patch(FeedCommand::MergeComment {
                post_id: post_id.clone(),
                comment: local,
            })
            .await?
        {
            MergeOutcome::Added(_) => OptimisticPatch::AddComment {
                post_id: post_id.clone(),
                comment_id: local_id.clone(),
            },
            _ => OptimisticPatch::Noop,
        };
        guard.record_patch(patch);

        let request = NewComment {
            post_id: post_id.clone(),
            user_id: self.context.user_id().clone(),
            text,
        };
        let canonical = match self.gateway.create_comment(&request).await {
            Ok(comment) => comment,
            Err(e) => return Err(self.revert(guard, e).await),
        };

        self.state
            .apply(FeedCommand::ReconcileComment {
                post_id: post_id.clone(),
                local_id,
                canonical: canonical.clone(),
            })
            .await;
        let done = guard.finish(MutationStatus::Confirmed);
        info!(mutation_id = %done.id, post_id = %post_id, comment_id = %canonical.id, "comment confirmed");

        if &post_author != self.context.user_id() {
            self.notify_post_author(post_author, &canonical).await;
        }
        Ok(canonical)
    }

    pub async fn remove_comment(
        &self,
        post_id: &PostId,
        comment_id: &CommentId,
    ) -> Result<(), AppError> {
        if comment_id.is_local() {
            return Err(AppError::Conflict(format!(
                "comment {comment_id} is not confirmed yet"
            )));
        }
        let mut guard = InFlight::acquire(
            &self.in_flight,
            MutationKind::CommentRemove,
            EntityKey::Comment(comment_id.clone()),
        )?;

        let comment = self
            .state
            .read(|store| {
                store
                    .post(post_id)
                    .and_then(|post| post.comment(comment_id).cloned())
            })
            .await
            .flatten()
            .ok_or_else(|| AppError::NotFound(format!("comment {comment_id}")))?;

        let patch = match self
            .apply_patch(FeedCommand::RemoveComment {
                post_id: Some(post_id.clone()),
                comment_id: comment_id.clone(),
            })
            .await?
        {
            MergeOutcome::Removed(index) => OptimisticPatch::RemoveComment {
                post_id: post_id.clone(),
                index,
                comment,
            },
            _ => OptimisticPatch::Noop,
        };
        guard.record_patch(patch);

        let result = self.gateway.remove_comment(comment_id).await;
        self.settle(guard, result).await
    }

    pub async fn delete_post(&self, post_id: &PostId) -> Result<(), AppError> {
        if post_id.is_local() {
            return Err(AppError::Conflict(format!(
                "post {post_id} is not confirmed yet"
            )));
        }
        let mut guard = InFlight::acquire(
            &self.in_flight,
            MutationKind::PostDelete,
            EntityKey::Post(post_id.clone()),
        )?;

        let post = self
            .state
            .read(|store| store.post(post_id).cloned())
            .await
            .flatten()
            .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;

        let patch = match self
            .apply_patch(FeedCommand::RemovePost(post_id.clone()))
            .await?
        {
            MergeOutcome::Removed(index) => OptimisticPatch::RemovePost { index, post },
            _ => OptimisticPatch::Noop,
        };
        guard.record_patch(patch);

        let result = self.gateway.delete_post(post_id).await;
        self.settle(guard, result).await
    }

    /// 未確定投稿を先頭に表示し、成功時に確定投稿へ置き換える
    pub async fn create_post(&self, body: &str, file: Option<String>) -> Result<Post, AppError> {
        let body = body.trim();
        if body.is_empty() && file.is_none() {
            return Err(AppError::validation(
                ValidationFailureKind::EmptyContent,
                "Please choose an image or add post body",
            ));
        }

        let local = Post::new_local(
            self.context.user.clone(),
            body.to_string(),
            file.clone().map(MediaRef::new),
        );
        let local_id = local.id.clone();
        let mut guard = InFlight::acquire(
            &self.in_flight,
            MutationKind::PostCreate,
            EntityKey::Post(local_id.clone()),
        )?;

        let patch = match self.apply_patch(FeedCommand::Prepend(local)).await? {
            MergeOutcome::Added(_) => OptimisticPatch::InsertPost {
                post_id: local_id.clone(),
            },
            _ => OptimisticPatch::Noop,
        };
        guard.record_patch(patch);

        let request = NewPost {
            user_id: self.context.user_id().clone(),
            body: body.to_string(),
            file,
        };
        let canonical = match self.gateway.create_post(&request).await {
            Ok(post) => post,
            Err(e) => return Err(self.revert(guard, e).await),
        };

        self.state
            .apply(FeedCommand::ReconcilePost {
                local_id,
                canonical: canonical.clone(),
            })
            .await;
        let done = guard.finish(MutationStatus::Confirmed);
        info!(mutation_id = %done.id, post_id = %canonical.id, "post confirmed");
        Ok(canonical)
    }

    async fn ensure_post(&self, post_id: &PostId) -> Result<(), AppError> {
        ensure_published(post_id)?;
        match self.state.read(|store| store.contains(post_id)).await {
            Some(true) => Ok(()),
            _ => Err(AppError::NotFound(format!("post {post_id}"))),
        }
    }

    fn validate_comment(&self, text: &str) -> Result<String, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation(
                ValidationFailureKind::EmptyContent,
                "Comment cannot be empty",
            ));
        }
        if text.chars().count() > self.config.max_comment_length {
            return Err(AppError::validation(
                ValidationFailureKind::ContentTooLarge,
                format!(
                    "Comment must be at most {} characters",
                    self.config.max_comment_length
                ),
            ));
        }
        Ok(text.to_string())
    }

    async fn apply_patch(&self, command: FeedCommand) -> Result<MergeOutcome, AppError> {
        self.state
            .apply(command)
            .await
            .ok_or_else(|| AppError::NotFound("feed is no longer active".to_string()))
    }

    /// サーバー応答に応じて確定または巻き戻す
    async fn settle(&self, guard: InFlight, result: Result<(), AppError>) -> Result<(), AppError> {
        match result {
            Ok(()) => {
                let done = guard.finish(MutationStatus::Confirmed);
                debug!(mutation_id = %done.id, kind = %done.kind, target_key = %done.target, "mutation confirmed");
                Ok(())
            }
            Err(e) if e.is_benign() && is_removal(guard.pending.kind) => {
                // 相手側で既に消えている
                let done = guard.finish(MutationStatus::Confirmed);
                debug!(mutation_id = %done.id, kind = %done.kind, "target already gone; keeping removal");
                Ok(())
            }
            Err(e) => Err(self.revert(guard, e).await),
        }
    }

    /// 適用済みの変更を逆操作で戻し、一度だけ通知する
    async fn revert(&self, guard: InFlight, error: AppError) -> AppError {
        if let Some(inverse) = guard.pending.patch.inverse() {
            self.state.apply(inverse).await;
        }
        let failed = guard.finish(MutationStatus::Failed);
        warn!(
            mutation_id = %failed.id,
            kind = %failed.kind,
            target_key = %failed.target,
            error = %error,
            "mutation failed; reverted"
        );
        // 受信者がいなければ送信エラーになるが問題ない
        let _ = self.notices.send(FeedNotice::MutationReverted {
            kind: failed.kind,
            message: error.user_message(),
        });
        error
    }

    async fn notify_post_author(&self, receiver: UserId, comment: &Comment) {
        if !self.config.notify_post_author {
            return;
        }
        let Some(notifications) = &self.notifications else {
            return;
        };
        let draft = NotificationDraft {
            sender_id: self.context.user_id().clone(),
            receiver_id: receiver,
            title: COMMENT_NOTIFICATION_TITLE.to_string(),
            data: json!({
                "postId": comment.post_id.as_str(),
                "commentId": comment.id.as_str(),
            }),
        };
        if let Err(e) = notifications.create_notification(&draft).await {
            warn!(error = %e, "failed to create comment notification");
        }
    }
}

/// 一時IDの投稿はまだサーバーに無いので、いいね・コメントの対象にできない
fn ensure_published(post_id: &PostId) -> Result<(), AppError> {
    if post_id.is_local() {
        return Err(AppError::validation(
            ValidationFailureKind::MissingTarget,
            "Post is not published yet",
        ));
    }
    Ok(())
}

fn is_removal(kind: MutationKind) -> bool {
    matches!(
        kind,
        MutationKind::LikeRemove | MutationKind::CommentRemove | MutationKind::PostDelete
    )
}
