use super::like::Like;
use crate::domain::value_objects::{CommentId, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// ライブチャネルから届く生の変更レコード
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    #[serde(rename = "eventType")]
    pub kind: String,
    pub table: String,
    #[serde(rename = "new", default)]
    pub new_record: Option<Value>,
    #[serde(rename = "old", default)]
    pub old_record: Option<Value>,
}

impl ChangeRecord {
    pub fn insert(table: EntityTable, record: Value) -> Self {
        Self {
            kind: ChangeKind::Insert.as_str().to_string(),
            table: table.as_str().to_string(),
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn update(table: EntityTable, new_record: Value, old_record: Option<Value>) -> Self {
        Self {
            kind: ChangeKind::Update.as_str().to_string(),
            table: table.as_str().to_string(),
            new_record: Some(new_record),
            old_record,
        }
    }

    pub fn delete(table: EntityTable, old_record: Value) -> Self {
        Self {
            kind: ChangeKind::Delete.as_str().to_string(),
            table: table.as_str().to_string(),
            new_record: None,
            old_record: Some(old_record),
        }
    }

    /// new/old のうち中身のある方を返す（INSERT の old は空オブジェクトで届くことがある）
    pub fn payload(&self) -> Option<&Value> {
        fn non_empty(value: &Option<Value>) -> Option<&Value> {
            value.as_ref().filter(|v| match v {
                Value::Object(map) => !map.is_empty(),
                Value::Null => false,
                _ => true,
            })
        }
        non_empty(&self.new_record).or_else(|| non_empty(&self.old_record))
    }

    /// コメントのスコープ判定用に postId を取り出す
    pub fn post_id_hint(&self) -> Option<String> {
        match self.payload()?.get("postId")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTable {
    Posts,
    Comments,
    PostLikes,
}

impl EntityTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityTable::Posts => "posts",
            EntityTable::Comments => "comments",
            EntityTable::PostLikes => "postLikes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "posts" => Some(EntityTable::Posts),
            "comments" => Some(EntityTable::Comments),
            "postLikes" => Some(EntityTable::PostLikes),
            _ => None,
        }
    }
}

impl fmt::Display for EntityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 購読スコープ
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeScope {
    Posts,
    /// `post_id` 指定時は投稿詳細表示用にその投稿のコメントだけを受け取る
    Comments { post_id: Option<PostId> },
    Likes,
}

impl ChangeScope {
    pub fn table(&self) -> EntityTable {
        match self {
            ChangeScope::Posts => EntityTable::Posts,
            ChangeScope::Comments { .. } => EntityTable::Comments,
            ChangeScope::Likes => EntityTable::PostLikes,
        }
    }

    pub fn matches(&self, record: &ChangeRecord) -> bool {
        if record.table != self.table().as_str() {
            return false;
        }
        match self {
            ChangeScope::Comments {
                post_id: Some(post_id),
            } => record
                .post_id_hint()
                .is_some_and(|hint| hint == post_id.as_str()),
            _ => true,
        }
    }
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeScope::Posts => write!(f, "posts"),
            ChangeScope::Comments { post_id: None } => write!(f, "comments"),
            ChangeScope::Comments {
                post_id: Some(post_id),
            } => write!(f, "comments:{post_id}"),
            ChangeScope::Likes => write!(f, "likes"),
        }
    }
}

/// posts テーブルの行（作者は ID のみ。リスナーが概要を付与する）
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub id: PostId,
    pub user_id: UserId,
    pub body: String,
    pub file: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// 型付けされた変更イベント
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    PostCreated(PostRecord),
    PostUpdated(PostRecord),
    PostDeleted {
        post_id: PostId,
    },
    CommentCreated(CommentRecord),
    CommentDeleted {
        post_id: Option<PostId>,
        comment_id: CommentId,
    },
    LikeAdded(Like),
    LikeRemoved(Like),
}
