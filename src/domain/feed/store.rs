use super::snapshot::{FeedSnapshot, is_ordered};
use crate::domain::entities::{Comment, Like, Post};
use crate::domain::value_objects::{CommentId, PostId, UserId};
use std::collections::HashSet;
use tracing::debug;

/// ストアへの変更要求。すべて同じ引数で何度適用しても結果が変わらない
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    /// ページ取得結果を末尾へ追加（既存の投稿は上書きしない）
    AppendPage(Vec<Post>),
    /// 新着投稿を先頭へ追加、既存なら取り込み
    Prepend(Post),
    /// 既存投稿のフィールド更新。存在しなければ何もしない
    PatchPost(Post),
    /// 投稿詳細の取り込み。いいね一覧はサーバーの内容で置き換えるが、
    /// `preserve_like_of` のユーザーのいいね状態だけは現在のまま残す（実行中の変更用）
    MergeDetails {
        post: Post,
        preserve_like_of: Option<UserId>,
    },
    RemovePost(PostId),
    RestorePost {
        index: usize,
        post: Post,
    },
    /// 一時IDの投稿を確定IDへ置き換える（位置は維持）
    ReconcilePost {
        local_id: PostId,
        canonical: Post,
    },
    MergeComment {
        post_id: PostId,
        comment: Comment,
    },
    /// `post_id` が不明な削除イベントは全投稿から探す
    RemoveComment {
        post_id: Option<PostId>,
        comment_id: CommentId,
    },
    RestoreComment {
        post_id: PostId,
        index: usize,
        comment: Comment,
    },
    ReconcileComment {
        post_id: PostId,
        local_id: CommentId,
        canonical: Comment,
    },
    ToggleLike {
        like: Like,
        add: bool,
    },
    RestoreLike {
        like: Like,
        index: usize,
    },
}

/// 変更の結果。インデックスは対象コレクション内の位置（ロールバック用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    Added(usize),
    Updated,
    Removed(usize),
}

impl MergeOutcome {
    pub fn is_changed(&self) -> bool {
        !matches!(self, MergeOutcome::Unchanged)
    }
}

/// フィードの正準状態。投稿の並び・コメント・いいねを唯一所有する
#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    posts: Vec<Post>,
    /// 削除済みID。古いページや遅れて届いたイベントで復活させない
    removed: HashSet<PostId>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.position(id).is_some()
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|post| &post.id == id)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot::new(self.posts.clone())
    }

    pub fn apply(&mut self, command: FeedCommand) -> MergeOutcome {
        match command {
            FeedCommand::AppendPage(posts) => self.append_page(posts),
            FeedCommand::Prepend(post) => self.prepend(post),
            FeedCommand::PatchPost(post) => self.patch_post(post),
            FeedCommand::MergeDetails {
                post,
                preserve_like_of,
            } => self.merge_details(post, preserve_like_of.as_ref()),
            FeedCommand::RemovePost(id) => self.remove_post_inner(&id),
            FeedCommand::RestorePost { index, post } => self.restore_post(index, post),
            FeedCommand::ReconcilePost {
                local_id,
                canonical,
            } => self.reconcile_post(&local_id, canonical),
            FeedCommand::MergeComment { post_id, comment } => {
                self.merge_comment_inner(&post_id, comment)
            }
            FeedCommand::RemoveComment {
                post_id,
                comment_id,
            } => self.remove_comment_inner(post_id.as_ref(), &comment_id),
            FeedCommand::RestoreComment {
                post_id,
                index,
                comment,
            } => self.restore_comment(&post_id, index, comment),
            FeedCommand::ReconcileComment {
                post_id,
                local_id,
                canonical,
            } => self.reconcile_comment(&post_id, &local_id, canonical),
            FeedCommand::ToggleLike { like, add } => self.toggle_like_inner(like, add),
            FeedCommand::RestoreLike { like, index } => self.restore_like(like, index),
        }
    }

    /// 追加された件数を返す。0件ならページ終端とみなせる
    pub fn merge_append(&mut self, posts: Vec<Post>) -> usize {
        match self.apply(FeedCommand::AppendPage(posts)) {
            MergeOutcome::Added(count) => count,
            _ => 0,
        }
    }

    pub fn merge_prepend(&mut self, post: Post) -> MergeOutcome {
        self.apply(FeedCommand::Prepend(post))
    }

    pub fn merge_comment(&mut self, post_id: &PostId, comment: Comment) -> MergeOutcome {
        self.apply(FeedCommand::MergeComment {
            post_id: post_id.clone(),
            comment,
        })
    }

    pub fn remove_comment(&mut self, post_id: &PostId, comment_id: &CommentId) -> MergeOutcome {
        self.apply(FeedCommand::RemoveComment {
            post_id: Some(post_id.clone()),
            comment_id: comment_id.clone(),
        })
    }

    pub fn toggle_like(&mut self, post_id: &PostId, user_id: &UserId, add: bool) -> MergeOutcome {
        self.apply(FeedCommand::ToggleLike {
            like: Like::new(post_id.clone(), user_id.clone()),
            add,
        })
    }

    pub fn remove_post(&mut self, post_id: &PostId) -> MergeOutcome {
        self.apply(FeedCommand::RemovePost(post_id.clone()))
    }

    fn position(&self, id: &PostId) -> Option<usize> {
        self.posts.iter().position(|post| &post.id == id)
    }

    fn echo_position(&self, server: &Post) -> Option<usize> {
        self.posts.iter().position(|post| post.is_echoed_by(server))
    }

    /// 先頭に並ぶ未確定投稿の数
    fn pending_head_len(&self) -> usize {
        self.posts.iter().take_while(|post| post.pending).count()
    }

    fn reconcile_at(&mut self, index: usize, incoming: Post) -> MergeOutcome {
        let before = self.posts[index].clone();
        self.posts[index].reconcile(incoming);
        if self.posts[index] == before {
            MergeOutcome::Unchanged
        } else {
            MergeOutcome::Updated
        }
    }

    fn append_page(&mut self, posts: Vec<Post>) -> MergeOutcome {
        if !is_ordered(&posts) {
            debug!(count = posts.len(), "page arrived out of order; keeping server order");
        }

        let mut added = 0;
        for post in posts {
            if self.removed.contains(&post.id) || self.contains(&post.id) {
                continue;
            }
            if let Some(index) = self.echo_position(&post) {
                // 未確定投稿のサーバー版がページに含まれていた
                self.reconcile_at(index, post);
                continue;
            }
            self.posts.push(post);
            added += 1;
        }

        if added == 0 {
            debug!("page added no new posts");
            MergeOutcome::Unchanged
        } else {
            MergeOutcome::Added(added)
        }
    }

    fn prepend(&mut self, post: Post) -> MergeOutcome {
        if self.removed.contains(&post.id) {
            debug!(post_id = %post.id, "ignoring removed post");
            return MergeOutcome::Unchanged;
        }
        if let Some(index) = self.position(&post.id) {
            return self.reconcile_at(index, post);
        }
        if let Some(index) = self.echo_position(&post) {
            debug!(post_id = %post.id, "realtime echo confirmed pending post");
            return self.reconcile_at(index, post);
        }

        let index = if post.pending {
            0
        } else {
            self.pending_head_len()
        };
        self.posts.insert(index, post);
        MergeOutcome::Added(index)
    }

    fn patch_post(&mut self, post: Post) -> MergeOutcome {
        match self.position(&post.id) {
            Some(index) => self.reconcile_at(index, post),
            None => {
                debug!(post_id = %post.id, "patch for unknown post ignored");
                MergeOutcome::Unchanged
            }
        }
    }

    fn merge_details(&mut self, mut post: Post, preserve_like_of: Option<&UserId>) -> MergeOutcome {
        if self.removed.contains(&post.id) {
            return MergeOutcome::Unchanged;
        }
        let Some(index) = self.position(&post.id) else {
            let likes = std::mem::take(&mut post.likes);
            self.posts.push(post.with_likes(likes));
            return MergeOutcome::Added(self.posts.len() - 1);
        };

        let server_likes = std::mem::take(&mut post.likes);
        let fields = self.reconcile_at(index, post);

        let current = &mut self.posts[index];
        let kept = preserve_like_of
            .and_then(|user_id| current.like_position(user_id))
            .map(|position| current.likes[position].clone());
        let mut likes: Vec<Like> = Vec::with_capacity(server_likes.len() + 1);
        for like in server_likes {
            let preserved = preserve_like_of.is_some_and(|user_id| user_id == &like.user_id);
            if !preserved && !likes.contains(&like) {
                likes.push(like);
            }
        }
        likes.extend(kept);

        if current.likes == likes {
            fields
        } else {
            debug!(post_id = %current.id, likes = likes.len(), "like set replaced from details");
            current.likes = likes;
            MergeOutcome::Updated
        }
    }

    fn remove_post_inner(&mut self, id: &PostId) -> MergeOutcome {
        self.removed.insert(id.clone());
        match self.position(id) {
            Some(index) => {
                self.posts.remove(index);
                MergeOutcome::Removed(index)
            }
            None => MergeOutcome::Unchanged,
        }
    }

    fn restore_post(&mut self, index: usize, post: Post) -> MergeOutcome {
        self.removed.remove(&post.id);
        if self.contains(&post.id) {
            return MergeOutcome::Unchanged;
        }
        let index = index.min(self.posts.len());
        self.posts.insert(index, post);
        MergeOutcome::Added(index)
    }

    fn reconcile_post(&mut self, local_id: &PostId, canonical: Post) -> MergeOutcome {
        let local = self.position(local_id);

        if self.removed.contains(&canonical.id) {
            return match local {
                Some(index) => {
                    self.posts.remove(index);
                    MergeOutcome::Removed(index)
                }
                None => MergeOutcome::Unchanged,
            };
        }

        match (local, self.position(&canonical.id)) {
            // エコーが先に確定版を入れていた
            (Some(index), Some(_)) => {
                self.posts.remove(index);
                MergeOutcome::Removed(index)
            }
            (Some(index), None) => self.reconcile_at(index, canonical),
            (None, Some(index)) => self.reconcile_at(index, canonical),
            // 一時投稿が既に無くても確定した投稿は失わない
            (None, None) => {
                debug!(local_id = %local_id, post_id = %canonical.id, "pending post missing; inserting canonical");
                let index = self.pending_head_len();
                self.posts.insert(index, canonical);
                MergeOutcome::Added(index)
            }
        }
    }

    fn merge_comment_inner(&mut self, post_id: &PostId, comment: Comment) -> MergeOutcome {
        let Some(index) = self.position(post_id) else {
            debug!(post_id = %post_id, comment_id = %comment.id, "dropping comment for missing post");
            return MergeOutcome::Unchanged;
        };
        let post = &mut self.posts[index];

        if post.comment(&comment.id).is_some() {
            return MergeOutcome::Unchanged;
        }
        if let Some(position) = post
            .comments
            .iter()
            .position(|existing| existing.is_echoed_by(&comment))
        {
            debug!(comment_id = %comment.id, "realtime echo confirmed pending comment");
            post.comments[position] = comment;
            return MergeOutcome::Updated;
        }

        post.comments.insert(0, comment);
        MergeOutcome::Added(0)
    }

    fn remove_comment_inner(
        &mut self,
        post_id: Option<&PostId>,
        comment_id: &CommentId,
    ) -> MergeOutcome {
        for post in self.posts.iter_mut() {
            if post_id.is_some_and(|id| id != &post.id) {
                continue;
            }
            if let Some(position) = post.comment_position(comment_id) {
                post.comments.remove(position);
                return MergeOutcome::Removed(position);
            }
        }
        MergeOutcome::Unchanged
    }

    fn restore_comment(
        &mut self,
        post_id: &PostId,
        index: usize,
        comment: Comment,
    ) -> MergeOutcome {
        let Some(post_index) = self.position(post_id) else {
            return MergeOutcome::Unchanged;
        };
        let post = &mut self.posts[post_index];
        if post.comment(&comment.id).is_some() {
            return MergeOutcome::Unchanged;
        }
        let index = index.min(post.comments.len());
        post.comments.insert(index, comment);
        MergeOutcome::Added(index)
    }

    fn reconcile_comment(
        &mut self,
        post_id: &PostId,
        local_id: &CommentId,
        canonical: Comment,
    ) -> MergeOutcome {
        let Some(post_index) = self.position(post_id) else {
            return MergeOutcome::Unchanged;
        };
        let post = &mut self.posts[post_index];

        match (
            post.comment_position(local_id),
            post.comment_position(&canonical.id),
        ) {
            (Some(local), Some(_)) => {
                post.comments.remove(local);
                MergeOutcome::Removed(local)
            }
            (Some(local), None) => {
                post.comments[local] = canonical;
                MergeOutcome::Updated
            }
            (None, Some(existing)) => {
                if post.comments[existing] == canonical {
                    MergeOutcome::Unchanged
                } else {
                    post.comments[existing] = canonical;
                    MergeOutcome::Updated
                }
            }
            (None, None) => {
                debug!(local_id = %local_id, comment_id = %canonical.id, "pending comment missing; inserting canonical");
                post.comments.insert(0, canonical);
                MergeOutcome::Added(0)
            }
        }
    }

    fn toggle_like_inner(&mut self, like: Like, add: bool) -> MergeOutcome {
        let Some(index) = self.position(&like.post_id) else {
            debug!(post_id = %like.post_id, "like for missing post ignored");
            return MergeOutcome::Unchanged;
        };
        let post = &mut self.posts[index];

        match (post.like_position(&like.user_id), add) {
            (None, true) => {
                post.likes.push(like);
                MergeOutcome::Added(post.likes.len() - 1)
            }
            (Some(position), false) => {
                post.likes.remove(position);
                MergeOutcome::Removed(position)
            }
            _ => MergeOutcome::Unchanged,
        }
    }

    fn restore_like(&mut self, like: Like, index: usize) -> MergeOutcome {
        let Some(post_index) = self.position(&like.post_id) else {
            return MergeOutcome::Unchanged;
        };
        let post = &mut self.posts[post_index];
        if post.is_liked_by(&like.user_id) {
            return MergeOutcome::Unchanged;
        }
        let index = index.min(post.likes.len());
        post.likes.insert(index, like);
        MergeOutcome::Added(index)
    }
}
