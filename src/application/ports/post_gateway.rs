use crate::domain::entities::Post;
use crate::domain::value_objects::{PostId, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 投稿取得のポート。カーソルトークンは持たず、ウィンドウ幅で範囲を指定する
#[async_trait]
pub trait PostGateway: Send + Sync {
    /// 新しい順に最大 `window` 件を取得。`author` 指定時はその作者の投稿のみ
    async fn fetch_posts(
        &self,
        window: usize,
        author: Option<UserId>,
    ) -> Result<Vec<Post>, AppError>;

    /// コメント一覧を含む投稿詳細
    async fn fetch_post_details(&self, post_id: &PostId) -> Result<Option<Post>, AppError>;
}
