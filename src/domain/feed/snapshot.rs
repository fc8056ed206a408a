use crate::domain::entities::Post;
use crate::domain::value_objects::PostId;
use serde::Serialize;
use std::ops::Deref;

/// 描画用の読み取り専用ビュー
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FeedSnapshot {
    posts: Vec<Post>,
}

impl FeedSnapshot {
    pub(crate) fn new(posts: Vec<Post>) -> Self {
        Self { posts }
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|post| &post.id == id)
    }

    pub fn ids(&self) -> Vec<PostId> {
        self.posts.iter().map(|post| post.id.clone()).collect()
    }

    /// 並び順キーに対して単調か（ページの取得順がずれていないかの確認用）
    pub fn is_chronological(&self) -> bool {
        is_ordered(&self.posts)
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }
}

impl Deref for FeedSnapshot {
    type Target = [Post];

    fn deref(&self) -> &Self::Target {
        &self.posts
    }
}

pub(crate) fn is_ordered(posts: &[Post]) -> bool {
    posts
        .windows(2)
        .all(|pair| pair[0].order_key() <= pair[1].order_key())
}
