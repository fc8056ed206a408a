use super::post::created_after;
use super::user::UserSummary;
use crate::domain::value_objects::{CommentId, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserSummary,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// サーバー確定前の楽観的コメント
    pub pending: bool,
}

impl Comment {
    pub fn new(
        id: CommentId,
        post_id: PostId,
        author: UserSummary,
        text: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            post_id,
            author,
            text,
            created_at,
            pending: false,
        }
    }

    pub fn new_local(post_id: PostId, author: UserSummary, text: String) -> Self {
        Self {
            id: CommentId::local(),
            post_id,
            author,
            text,
            created_at: Utc::now(),
            pending: true,
        }
    }

    /// 自分（楽観的コメント）に対応するサーバー側のコメントか。
    /// 未確定コメントの `created_at` は端末での作成時刻
    pub fn is_echoed_by(&self, server: &Comment) -> bool {
        self.pending
            && !server.pending
            && created_after(server.created_at, self.created_at)
            && self.post_id == server.post_id
            && self.author.id == server.author.id
            && self.text == server.text
    }
}

/// コメント作成リクエスト
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub text: String,
}
