use super::feed_state::FeedState;
use super::mutation_coordinator::MutationCoordinator;
use super::paginator::{CursorPaginator, PageOutcome};
use super::realtime_listener::RealtimeListener;
use super::user_summary_service::UserSummaryService;
use crate::application::ports::{
    ChangeFeed, MutationGateway, NotificationGateway, PostGateway, UserDirectory,
    UserSummaryCache,
};
use crate::domain::entities::{ChangeScope, Post, UserSummary};
use crate::domain::feed::{FeedCommand, FeedSnapshot};
use crate::domain::value_objects::{PostId, UserId};
use crate::shared::config::FeedConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::info;

/// サインイン中のユーザー。認証側のライフサイクルで作り直して渡す
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub user: UserSummary,
}

impl SessionContext {
    pub fn new(user: UserSummary) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

/// セッションが使う外部コラボレータ一式
#[derive(Clone)]
pub struct FeedCollaborators {
    pub posts: Arc<dyn PostGateway>,
    pub mutations: Arc<dyn MutationGateway>,
    pub users: Arc<dyn UserDirectory>,
    pub user_cache: Arc<dyn UserSummaryCache>,
    pub change_feed: Arc<dyn ChangeFeed>,
    pub notifications: Option<Arc<dyn NotificationGateway>>,
}

/// 1画面分のフィード。ストア・ページャ・リスナー・コーディネータを束ねる
pub struct FeedSession {
    state: FeedState,
    posts: Arc<dyn PostGateway>,
    users: Arc<UserSummaryService>,
    paginator: CursorPaginator,
    listener: RealtimeListener,
    coordinator: MutationCoordinator,
    context: SessionContext,
    config: FeedConfig,
}

impl FeedSession {
    pub fn new(collaborators: FeedCollaborators, context: SessionContext, config: FeedConfig) -> Self {
        Self::build(collaborators, context, config, None)
    }

    /// プロフィール画面用。指定ユーザーの投稿のみを読み込む
    pub fn for_profile(
        collaborators: FeedCollaborators,
        context: SessionContext,
        config: FeedConfig,
        author: UserId,
    ) -> Self {
        Self::build(collaborators, context, config, Some(author))
    }

    fn build(
        collaborators: FeedCollaborators,
        context: SessionContext,
        config: FeedConfig,
        author: Option<UserId>,
    ) -> Self {
        let state = FeedState::new();
        let users = Arc::new(UserSummaryService::new(
            collaborators.users,
            collaborators.user_cache,
        ));

        let mut paginator = CursorPaginator::new(
            Arc::clone(&collaborators.posts),
            Arc::clone(&users),
            state.clone(),
            &config.pagination,
        );
        if let Some(author) = author {
            paginator = paginator.with_author(author);
        }
        let listener = RealtimeListener::new(
            collaborators.change_feed,
            Arc::clone(&users),
            state.clone(),
        );
        let mut coordinator = MutationCoordinator::new(
            collaborators.mutations,
            state.clone(),
            context.clone(),
            config.mutation.clone(),
            config.realtime.channel_capacity,
        );
        if let Some(notifications) = collaborators.notifications {
            coordinator = coordinator.with_notifications(notifications);
        }

        Self {
            state,
            posts: collaborators.posts,
            users,
            paginator,
            listener,
            coordinator,
            context,
            config,
        }
    }

    /// 購読を開始して最初のページを読み込む
    pub async fn activate(&self) -> Result<PageOutcome, AppError> {
        // 自分の投稿のエコーで問い合わせが発生しないようにする
        self.users.prime(self.context.user.clone()).await;
        self.listener.subscribe(ChangeScope::Posts).await?;
        self.listener.subscribe(ChangeScope::Likes).await?;
        if self.config.realtime.subscribe_comments {
            self.listener
                .subscribe(ChangeScope::Comments { post_id: None })
                .await?;
        }
        info!(author = ?self.paginator.author(), "feed session activated");
        self.paginator.request_next_page().await
    }

    /// 投稿詳細画面。詳細を取り込み、その投稿のコメントだけを購読する
    pub async fn activate_post_detail(&self, post_id: &PostId) -> Result<Post, AppError> {
        self.users.prime(self.context.user.clone()).await;
        let epoch = self.coordinator.like_epoch();
        let post = self
            .posts
            .fetch_post_details(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;
        self.users.prime_from_posts(std::slice::from_ref(&post)).await;

        // 取得中に自分のいいねが動いた場合はその状態を優先する
        let preserve_like_of = self
            .coordinator
            .like_changed_since(post_id, epoch)
            .then(|| self.context.user_id().clone());
        self.state
            .apply(FeedCommand::MergeDetails {
                post: post.clone(),
                preserve_like_of,
            })
            .await;
        let post = self
            .state
            .read(|store| store.post(post_id).cloned())
            .await
            .flatten()
            .unwrap_or(post);

        self.listener
            .subscribe(ChangeScope::Comments {
                post_id: Some(post_id.clone()),
            })
            .await?;
        info!(post_id = %post_id, "post detail session activated");
        Ok(post)
    }

    pub async fn load_more(&self) -> Result<PageOutcome, AppError> {
        self.paginator.request_next_page().await
    }

    /// 購読解除は失敗しても必ず行い、ストアを破棄する
    pub async fn deactivate(&self) {
        self.listener.unsubscribe_all().await;
        self.state.teardown().await;
        info!("feed session deactivated");
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        self.state.snapshot().await
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn paginator(&self) -> &CursorPaginator {
        &self.paginator
    }

    pub fn listener(&self) -> &RealtimeListener {
        &self.listener
    }

    pub fn mutations(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn users(&self) -> &Arc<UserSummaryService> {
        &self.users
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }
}
