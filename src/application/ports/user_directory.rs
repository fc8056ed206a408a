use crate::domain::entities::UserSummary;
use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_summary(&self, user_id: &UserId) -> Result<UserSummary, AppError>;
}
