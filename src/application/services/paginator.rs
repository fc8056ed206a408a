use super::feed_state::FeedState;
use super::user_summary_service::UserSummaryService;
use crate::application::ports::post_gateway::PostGateway;
use crate::domain::feed::{FeedCommand, MergeOutcome};
use crate::domain::value_objects::UserId;
use crate::shared::config::PaginationConfig;
use crate::shared::error::AppError;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginatorState {
    Idle,
    Loading,
    Exhausted,
}

impl PaginatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaginatorState::Idle => "idle",
            PaginatorState::Loading => "loading",
            PaginatorState::Exhausted => "exhausted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Loaded { added: usize, total: usize },
    /// 新しい投稿が1件も増えなかった。以降の要求は発行しない
    Exhausted,
    /// 取得中の要求があるため無視した
    Busy,
    AlreadyExhausted,
    /// ストアが破棄済みで結果を捨てた
    Dropped,
}

#[derive(Debug)]
struct Cursor {
    state: PaginatorState,
    /// 最後に成功した取得のウィンドウ幅
    window: usize,
}

/// 幅を広げながら前方向に読み込むページャ
pub struct CursorPaginator {
    gateway: Arc<dyn PostGateway>,
    users: Arc<UserSummaryService>,
    state: FeedState,
    author: Option<UserId>,
    step: usize,
    cursor: Arc<Mutex<Cursor>>,
}

/// 取得が完了せずに破棄された場合でも Loading のまま残さない
struct LoadingGuard {
    cursor: Arc<Mutex<Cursor>>,
    armed: bool,
}

impl LoadingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.cursor).state = PaginatorState::Idle;
        }
    }
}

fn lock(cursor: &Mutex<Cursor>) -> MutexGuard<'_, Cursor> {
    cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CursorPaginator {
    pub fn new(
        gateway: Arc<dyn PostGateway>,
        users: Arc<UserSummaryService>,
        state: FeedState,
        config: &PaginationConfig,
    ) -> Self {
        Self {
            gateway,
            users,
            state,
            author: None,
            step: config.page_step.max(1),
            cursor: Arc::new(Mutex::new(Cursor {
                state: PaginatorState::Idle,
                window: config.initial_window,
            })),
        }
    }

    /// プロフィール表示用に作者で絞り込む
    pub fn with_author(mut self, author: UserId) -> Self {
        self.author = Some(author);
        self
    }

    pub fn author(&self) -> Option<&UserId> {
        self.author.as_ref()
    }

    pub fn state(&self) -> PaginatorState {
        lock(&self.cursor).state
    }

    pub fn window(&self) -> usize {
        lock(&self.cursor).window
    }

    pub async fn request_next_page(&self) -> Result<PageOutcome, AppError> {
        let window = {
            let mut cursor = lock(&self.cursor);
            match cursor.state {
                PaginatorState::Loading => {
                    debug!("page request ignored while loading");
                    return Ok(PageOutcome::Busy);
                }
                PaginatorState::Exhausted => return Ok(PageOutcome::AlreadyExhausted),
                PaginatorState::Idle => {}
            }
            cursor.state = PaginatorState::Loading;
            cursor.window + self.step
        };
        let guard = LoadingGuard {
            cursor: Arc::clone(&self.cursor),
            armed: true,
        };

        let posts = match self.gateway.fetch_posts(window, self.author.clone()).await {
            Ok(posts) => posts,
            Err(e) => {
                // guard の drop で Idle に戻る（再試行可能）
                warn!(window, error = %e, "page fetch failed");
                return Err(e);
            }
        };
        let returned = posts.len();
        self.users.prime_from_posts(&posts).await;

        let Some(outcome) = self.state.apply(FeedCommand::AppendPage(posts)).await else {
            return Ok(PageOutcome::Dropped);
        };
        let added = match outcome {
            MergeOutcome::Added(count) => count,
            _ => 0,
        };

        guard.disarm();
        {
            let mut cursor = lock(&self.cursor);
            cursor.window = window;
            cursor.state = if added == 0 {
                PaginatorState::Exhausted
            } else {
                PaginatorState::Idle
            };
        }
        if added == 0 {
            info!(window, returned, "feed exhausted");
            return Ok(PageOutcome::Exhausted);
        }

        let total = self.state.len().await;
        debug!(window, returned, added, total, "page merged");
        Ok(PageOutcome::Loaded { added, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::cache::UserSummaryCache;
    use crate::application::ports::user_directory::UserDirectory;
    use crate::domain::entities::{Post, UserSummary};
    use crate::domain::value_objects::PostId;
    use crate::infrastructure::cache::LruUserSummaryCache;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use mockall::{Sequence, mock, predicate::*};

    mock! {
        pub Posts {}

        #[async_trait]
        impl PostGateway for Posts {
            async fn fetch_posts(
                &self,
                window: usize,
                author: Option<UserId>,
            ) -> Result<Vec<Post>, AppError>;
            async fn fetch_post_details(&self, post_id: &PostId) -> Result<Option<Post>, AppError>;
        }
    }

    mock! {
        pub Directory {}

        #[async_trait]
        impl UserDirectory for Directory {
            async fn get_user_summary(&self, user_id: &UserId) -> Result<UserSummary, AppError>;
        }
    }

    fn post(id: u32) -> Post {
        Post::new(
            PostId::new(id.to_string()).unwrap(),
            UserSummary::new(UserId::new("author".to_string()).unwrap(), "Author"),
            format!("post {id}"),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, id, 0).unwrap(),
        )
    }

    /// 新しい順に `window` 件
    fn newest(total: u32, window: usize) -> Vec<Post> {
        (1..=total).rev().take(window).map(post).collect()
    }

    fn paginator(gateway: MockPosts, state: FeedState) -> CursorPaginator {
        let cache: Arc<dyn UserSummaryCache> = Arc::new(LruUserSummaryCache::new(16, 60));
        let users = Arc::new(UserSummaryService::new(
            Arc::new(MockDirectory::new()),
            cache,
        ));
        CursorPaginator::new(
            Arc::new(gateway),
            users,
            state,
            &PaginationConfig {
                page_step: 4,
                initial_window: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_window_widens_until_exhausted() {
        let mut gateway = MockPosts::new();
        let mut seq = Sequence::new();
        for window in [4usize, 8, 12] {
            gateway
                .expect_fetch_posts()
                .with(eq(window), eq(None))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|window, _| Ok(newest(6, window)));
        }

        let state = FeedState::new();
        let paginator = paginator(gateway, state.clone());

        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::Loaded { added: 4, total: 4 }
        );
        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::Loaded { added: 2, total: 6 }
        );
        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::Exhausted
        );
        assert_eq!(paginator.state(), PaginatorState::Exhausted);
        assert_eq!(paginator.window(), 12);

        // 終端後は取得しない（モックの呼び出し回数で確認）
        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::AlreadyExhausted
        );
        assert_eq!(state.len().await, 6);
    }

    #[tokio::test]
    async fn test_fresh_load_keeps_server_order() {
        let mut gateway = MockPosts::new();
        gateway
            .expect_fetch_posts()
            .returning(|window, _| Ok(newest(4, window)));

        let state = FeedState::new();
        paginator(gateway, state.clone())
            .request_next_page()
            .await
            .unwrap();

        let ids: Vec<String> = state
            .snapshot()
            .await
            .iter()
            .map(|post| post.id.to_string())
            .collect();
        assert_eq!(ids, vec!["4", "3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_stays_retryable() {
        let mut gateway = MockPosts::new();
        let mut seq = Sequence::new();
        gateway
            .expect_fetch_posts()
            .with(eq(4usize), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AppError::Network("offline".to_string())));
        gateway
            .expect_fetch_posts()
            .with(eq(4usize), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|window, _| Ok(newest(8, window)));

        let state = FeedState::new();
        let paginator = paginator(gateway, state.clone());

        let err = paginator.request_next_page().await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
        assert_eq!(paginator.state(), PaginatorState::Idle);
        assert_eq!(paginator.window(), 0);

        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::Loaded { added: 4, total: 4 }
        );
    }

    #[tokio::test]
    async fn test_author_filter_is_forwarded() {
        let author = UserId::new("me".to_string()).unwrap();
        let expected = Some(author.clone());
        let mut gateway = MockPosts::new();
        gateway
            .expect_fetch_posts()
            .with(eq(4usize), eq(expected))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let paginator = paginator(gateway, FeedState::new()).with_author(author);
        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::Exhausted
        );
    }

    #[tokio::test]
    async fn test_result_dropped_after_teardown() {
        let mut gateway = MockPosts::new();
        gateway
            .expect_fetch_posts()
            .returning(|window, _| Ok(newest(4, window)));

        let state = FeedState::new();
        state.teardown().await;
        let paginator = paginator(gateway, state);

        assert_eq!(
            paginator.request_next_page().await.unwrap(),
            PageOutcome::Dropped
        );
        assert_eq!(paginator.state(), PaginatorState::Idle);
    }
}
