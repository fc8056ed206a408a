use crate::domain::value_objects::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 投稿者への通知（コメントされた等）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationDraft {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub title: String,
    pub data: Value,
}
