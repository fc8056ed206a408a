use super::comment::Comment;
use super::like::Like;
use super::user::UserSummary;
use crate::domain::value_objects::{CommentId, PostId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

const IMAGE_FOLDER: &str = "postImages";
const VIDEO_FOLDER: &str = "postVideos";

/// サーバーと端末の時計のずれとして許容する幅
pub(crate) const ECHO_CLOCK_SKEW_SECS: i64 = 5;

/// `at` がローカル作成時刻 `composed_at` 以降（許容幅込み）か
pub(crate) fn created_after(at: DateTime<Utc>, composed_at: DateTime<Utc>) -> bool {
    at >= composed_at - Duration::seconds(ECHO_CLOCK_SKEW_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

/// 添付メディアへの参照（ストレージ上のパス）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub path: String,
}

impl MediaRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// 保存先フォルダからメディア種別を判定
    pub fn kind(&self) -> MediaKind {
        if self.path.contains(IMAGE_FOLDER) {
            MediaKind::Image
        } else if self.path.contains(VIDEO_FOLDER) {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }
}

/// フィード上の並び順キー: 未確定の投稿が先頭、次に作成日時の降順、同時刻はIDで決定
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PostOrderKey(bool, Reverse<Option<DateTime<Utc>>>, Reverse<PostId>);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author: UserSummary,
    /// リッチテキスト本文（このコアでは不透明なまま扱う）
    pub body: String,
    pub media: Option<MediaRef>,
    /// サーバー確定前のローカル投稿のみ `None`
    pub created_at: Option<DateTime<Utc>>,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    pub pending: bool,
    /// 端末で作成した時刻（未確定投稿のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composed_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(id: PostId, author: UserSummary, body: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            author,
            body,
            media: None,
            created_at: Some(created_at),
            likes: Vec::new(),
            comments: Vec::new(),
            pending: false,
            composed_at: None,
        }
    }

    pub fn new_local(author: UserSummary, body: String, media: Option<MediaRef>) -> Self {
        Self {
            id: PostId::local(),
            author,
            body,
            media,
            created_at: None,
            likes: Vec::new(),
            comments: Vec::new(),
            pending: true,
            composed_at: Some(Utc::now()),
        }
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_likes(mut self, likes: Vec<Like>) -> Self {
        self.likes = Vec::new();
        for like in likes {
            if !self.likes.contains(&like) {
                self.likes.push(like);
            }
        }
        self
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = comments;
        self
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn is_liked_by(&self, user_id: &UserId) -> bool {
        self.likes.iter().any(|like| &like.user_id == user_id)
    }

    pub fn like_position(&self, user_id: &UserId) -> Option<usize> {
        self.likes.iter().position(|like| &like.user_id == user_id)
    }

    pub fn comment(&self, comment_id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == comment_id)
    }

    pub fn comment_position(&self, comment_id: &CommentId) -> Option<usize> {
        self.comments
            .iter()
            .position(|comment| &comment.id == comment_id)
    }

    pub fn order_key(&self) -> PostOrderKey {
        PostOrderKey(
            !self.pending,
            Reverse(self.created_at),
            Reverse(self.id.clone()),
        )
    }

    /// 自分（楽観的投稿）に対応するサーバー側の投稿か。
    /// 作成より前からある同じ内容の投稿はエコーとみなさない
    pub fn is_echoed_by(&self, server: &Post) -> bool {
        let fresh = match (self.composed_at, server.created_at) {
            (Some(composed_at), Some(at)) => created_after(at, composed_at),
            _ => false,
        };
        self.pending
            && !server.pending
            && fresh
            && self.author.id == server.author.id
            && self.body == server.body
            && self.media == server.media
    }

    /// 同一IDの投稿を取り込み、既存のいいね・コメントを失わずにフィールドを更新する
    pub fn reconcile(&mut self, incoming: Post) {
        let Post {
            id,
            author,
            body,
            media,
            created_at,
            likes,
            comments,
            pending,
            composed_at: _,
        } = incoming;

        self.id = id;
        if !author.is_placeholder() || self.author.is_placeholder() {
            self.author = author;
        }
        self.body = body;
        self.media = media;
        if created_at.is_some() {
            self.created_at = created_at;
        }
        self.pending = self.pending && pending;
        if !self.pending {
            self.composed_at = None;
        }

        for like in likes {
            if !self.likes.contains(&like) {
                self.likes.push(like);
            }
        }

        if !comments.is_empty() {
            // サーバーに無い既存コメント（未確定・後着のリアルタイム分）は先頭に残す
            let mut merged: Vec<Comment> = {
                let incoming_ids: HashSet<&CommentId> =
                    comments.iter().map(|comment| &comment.id).collect();
                self.comments
                    .drain(..)
                    .filter(|existing| {
                        !incoming_ids.contains(&existing.id)
                            && !comments.iter().any(|server| existing.is_echoed_by(server))
                    })
                    .collect()
            };
            merged.extend(comments);
            self.comments = merged;
        }
    }
}

/// 投稿作成リクエスト
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPost {
    pub user_id: UserId,
    pub body: String,
    pub file: Option<String>,
}
