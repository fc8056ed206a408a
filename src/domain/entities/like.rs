use crate::domain::value_objects::{PostId, UserId};
use serde::{Deserialize, Serialize};

/// いいね。同一ユーザーは1投稿に1回まで（複合キーで同一性を判定）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Like {
    pub post_id: PostId,
    pub user_id: UserId,
}

impl Like {
    pub fn new(post_id: PostId, user_id: UserId) -> Self {
        Self { post_id, user_id }
    }
}
