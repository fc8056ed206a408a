use crate::domain::entities::{Comment, Like, NewComment, NewPost, Post};
use crate::domain::value_objects::{CommentId, PostId, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 書き込み系エンドポイント
#[async_trait]
pub trait MutationGateway: Send + Sync {
    async fn create_post(&self, post: &NewPost) -> Result<Post, AppError>;

    /// 確定IDを持つコメントを返す
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, AppError>;

    async fn remove_comment(&self, comment_id: &CommentId) -> Result<(), AppError>;

    async fn create_like(&self, like: &Like) -> Result<(), AppError>;

    async fn remove_like(&self, post_id: &PostId, user_id: &UserId) -> Result<(), AppError>;

    async fn delete_post(&self, post_id: &PostId) -> Result<(), AppError>;
}
