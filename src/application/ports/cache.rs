use crate::domain::entities::UserSummary;
use crate::domain::value_objects::UserId;
use async_trait::async_trait;

/// ユーザー概要用のキャッシュポート
#[async_trait]
pub trait UserSummaryCache: Send + Sync {
    /// 概要をキャッシュに追加
    async fn put(&self, summary: UserSummary);

    /// 期限内のエントリのみ返す
    async fn get(&self, id: &UserId) -> Option<UserSummary>;

    async fn invalidate(&self, id: &UserId);

    async fn clear(&self);
}
