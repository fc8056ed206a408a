use crate::domain::entities::NotificationDraft;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn create_notification(&self, draft: &NotificationDraft) -> Result<(), AppError>;
}
