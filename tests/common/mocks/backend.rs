use async_trait::async_trait;
use chrono::Utc;
use linkup_feed::application::ports::{
    MutationGateway, NotificationGateway, PostGateway, UserDirectory,
};
use linkup_feed::domain::entities::{
    ChangeRecord, Comment, EntityTable, Like, MediaRef, NewComment, NewPost, NotificationDraft,
    Post, UserSummary,
};
use linkup_feed::domain::value_objects::{CommentId, PostId, UserId};
use linkup_feed::infrastructure::InMemoryChangeFeed;
use linkup_feed::shared::error::AppError;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};

/// サーバー側の状態を持つインメモリのバックエンド。
/// 書き込みが成功すると変更レコードをチャネルへ流す（エコー）
pub struct InMemoryBackend {
    posts: Mutex<Vec<Post>>,
    users: Mutex<HashMap<UserId, UserSummary>>,
    notifications: Mutex<Vec<NotificationDraft>>,
    fail_next: Mutex<Option<AppError>>,
    like_gate: Mutex<Option<Arc<Notify>>>,
    next_id: AtomicU64,
    fetch_calls: AtomicUsize,
    like_calls: AtomicUsize,
    echo: bool,
    pub feed: InMemoryChangeFeed,
}

impl InMemoryBackend {
    pub fn new(feed: InMemoryChangeFeed) -> Arc<Self> {
        Arc::new(Self::build(feed, true))
    }

    pub fn without_echo(feed: InMemoryChangeFeed) -> Arc<Self> {
        Arc::new(Self::build(feed, false))
    }

    fn build(feed: InMemoryChangeFeed, echo: bool) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            users: Mutex::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            like_gate: Mutex::new(None),
            next_id: AtomicU64::new(1000),
            fetch_calls: AtomicUsize::new(0),
            like_calls: AtomicUsize::new(0),
            echo,
            feed,
        }
    }

    pub async fn add_user(&self, summary: UserSummary) {
        self.users.lock().await.insert(summary.id.clone(), summary);
    }

    /// 新しい順に並ぶよう先頭へ追加する
    pub async fn seed_post(&self, post: Post) {
        self.add_user(post.author.clone()).await;
        let mut posts = self.posts.lock().await;
        posts.push(post);
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// 別ユーザーの投稿をサーバーに追加し、チャネルへ流す
    pub async fn publish_post(&self, post: Post) {
        self.seed_post(post.clone()).await;
        self.feed
            .publish(ChangeRecord::insert(EntityTable::Posts, post_row(&post)))
            .await;
    }

    pub async fn fail_next(&self, error: AppError) {
        *self.fail_next.lock().await = Some(error);
    }

    /// いいね要求を `Notify` で解放されるまで止める
    pub async fn hold_likes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.like_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn like_calls(&self) -> usize {
        self.like_calls.load(Ordering::SeqCst)
    }

    pub async fn server_post(&self, post_id: &PostId) -> Option<Post> {
        self.posts
            .lock()
            .await
            .iter()
            .find(|post| &post.id == post_id)
            .cloned()
    }

    pub async fn notifications(&self) -> Vec<NotificationDraft> {
        self.notifications.lock().await.clone()
    }

    async fn take_failure(&self) -> Result<(), AppError> {
        match self.fail_next.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    async fn echo(&self, record: ChangeRecord) {
        if self.echo {
            self.feed.publish(record).await;
        }
    }

    async fn author(&self, user_id: &UserId) -> UserSummary {
        self.users
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserSummary::placeholder(user_id.clone()))
    }
}

pub fn post_row(post: &Post) -> serde_json::Value {
    json!({
        "id": post.id.as_str(),
        "userId": post.author.id.as_str(),
        "body": post.body,
        "file": post.media.as_ref().map(|media| media.path.clone()),
        "created_at": post.created_at.map(|at| at.to_rfc3339()),
    })
}

pub fn comment_row(comment: &Comment) -> serde_json::Value {
    json!({
        "id": comment.id.as_str(),
        "postId": comment.post_id.as_str(),
        "userId": comment.author.id.as_str(),
        "text": comment.text,
        "created_at": comment.created_at.to_rfc3339(),
    })
}

pub fn like_row(like: &Like) -> serde_json::Value {
    json!({
        "postId": like.post_id.as_str(),
        "userId": like.user_id.as_str(),
    })
}

#[async_trait]
impl PostGateway for InMemoryBackend {
    async fn fetch_posts(
        &self,
        window: usize,
        author: Option<UserId>,
    ) -> Result<Vec<Post>, AppError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure().await?;
        let posts = self.posts.lock().await;
        Ok(posts
            .iter()
            .filter(|post| author.as_ref().map_or(true, |id| &post.author.id == id))
            .take(window)
            .cloned()
            .collect())
    }

    async fn fetch_post_details(&self, post_id: &PostId) -> Result<Option<Post>, AppError> {
        self.take_failure().await?;
        Ok(self.server_post(post_id).await)
    }
}

#[async_trait]
impl MutationGateway for InMemoryBackend {
    async fn create_post(&self, post: &NewPost) -> Result<Post, AppError> {
        self.take_failure().await?;
        let mut created = Post::new(
            PostId::new(self.next_id()).map_err(AppError::from)?,
            self.author(&post.user_id).await,
            post.body.clone(),
            Utc::now(),
        );
        if let Some(file) = &post.file {
            created = created.with_media(MediaRef::new(file.clone()));
        }
        self.seed_post(created.clone()).await;
        self.echo(ChangeRecord::insert(EntityTable::Posts, post_row(&created)))
            .await;
        Ok(created)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, AppError> {
        self.take_failure().await?;
        let created = Comment::new(
            CommentId::new(self.next_id()).map_err(AppError::from)?,
            comment.post_id.clone(),
            self.author(&comment.user_id).await,
            comment.text.clone(),
            Utc::now(),
        );
        {
            let mut posts = self.posts.lock().await;
            let post = posts
                .iter_mut()
                .find(|post| post.id == comment.post_id)
                .ok_or_else(|| AppError::NotFound(format!("post {}", comment.post_id)))?;
            post.comments.insert(0, created.clone());
        }
        self.echo(ChangeRecord::insert(
            EntityTable::Comments,
            comment_row(&created),
        ))
        .await;
        Ok(created)
    }

    async fn remove_comment(&self, comment_id: &CommentId) -> Result<(), AppError> {
        self.take_failure().await?;
        let removed = {
            let mut posts = self.posts.lock().await;
            posts.iter_mut().find_map(|post| {
                let index = post.comment_position(comment_id)?;
                Some(post.comments.remove(index))
            })
        };
        let removed = removed.ok_or_else(|| AppError::NotFound(format!("comment {comment_id}")))?;
        self.echo(ChangeRecord::delete(
            EntityTable::Comments,
            json!({"id": removed.id.as_str()}),
        ))
        .await;
        Ok(())
    }

    async fn create_like(&self, like: &Like) -> Result<(), AppError> {
        self.like_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.like_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.take_failure().await?;
        {
            let mut posts = self.posts.lock().await;
            if let Some(post) = posts.iter_mut().find(|post| post.id == like.post_id) {
                if !post.likes.contains(like) {
                    post.likes.push(like.clone());
                }
            }
        }
        self.echo(ChangeRecord::insert(EntityTable::PostLikes, like_row(like)))
            .await;
        Ok(())
    }

    async fn remove_like(&self, post_id: &PostId, user_id: &UserId) -> Result<(), AppError> {
        self.like_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure().await?;
        {
            let mut posts = self.posts.lock().await;
            if let Some(post) = posts.iter_mut().find(|post| &post.id == post_id) {
                post.likes.retain(|like| &like.user_id != user_id);
            }
        }
        let like = Like::new(post_id.clone(), user_id.clone());
        self.echo(ChangeRecord::delete(EntityTable::PostLikes, like_row(&like)))
            .await;
        Ok(())
    }

    async fn delete_post(&self, post_id: &PostId) -> Result<(), AppError> {
        self.take_failure().await?;
        let existed = {
            let mut posts = self.posts.lock().await;
            let before = posts.len();
            posts.retain(|post| &post.id != post_id);
            posts.len() != before
        };
        if !existed {
            return Err(AppError::NotFound(format!("post {post_id}")));
        }
        self.echo(ChangeRecord::delete(
            EntityTable::Posts,
            json!({"id": post_id.as_str()}),
        ))
        .await;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryBackend {
    async fn get_user_summary(&self, user_id: &UserId) -> Result<UserSummary, AppError> {
        self.users
            .lock()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }
}

#[async_trait]
impl NotificationGateway for InMemoryBackend {
    async fn create_notification(&self, draft: &NotificationDraft) -> Result<(), AppError> {
        self.notifications.lock().await.push(draft.clone());
        Ok(())
    }
}
