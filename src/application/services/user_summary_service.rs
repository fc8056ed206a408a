use crate::application::ports::cache::UserSummaryCache;
use crate::application::ports::user_directory::UserDirectory;
use crate::domain::entities::{Post, UserSummary};
use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

/// ユーザー概要の読み取り専用キャッシュ（未知のユーザーは参照時に取得する）
pub struct UserSummaryService {
    directory: Arc<dyn UserDirectory>,
    cache: Arc<dyn UserSummaryCache>,
}

impl UserSummaryService {
    pub fn new(directory: Arc<dyn UserDirectory>, cache: Arc<dyn UserSummaryCache>) -> Self {
        Self { directory, cache }
    }

    pub async fn get(&self, user_id: &UserId) -> Result<UserSummary, AppError> {
        if let Some(summary) = self.cache.get(user_id).await {
            return Ok(summary);
        }

        let summary = self.directory.get_user_summary(user_id).await?;
        self.cache.put(summary.clone()).await;
        Ok(summary)
    }

    /// 取得に失敗しても仮の概要で続行する
    pub async fn resolve(&self, user_id: &UserId) -> UserSummary {
        match self.get(user_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "user lookup failed; using placeholder");
                UserSummary::placeholder(user_id.clone())
            }
        }
    }

    pub async fn prime(&self, summary: UserSummary) {
        if summary.is_placeholder() {
            return;
        }
        self.cache.put(summary).await;
    }

    /// 取得済みページの作者・コメント投稿者をキャッシュへ入れる
    pub async fn prime_from_posts(&self, posts: &[Post]) {
        let mut primed = 0;
        for post in posts {
            let authors = std::iter::once(&post.author)
                .chain(post.comments.iter().map(|comment| &comment.author));
            for author in authors {
                if !author.is_placeholder() {
                    self.cache.put(author.clone()).await;
                    primed += 1;
                }
            }
        }
        debug!(primed, "primed user summaries from page");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::{mock, predicate::*};

    mock! {
        pub Directory {}

        #[async_trait]
        impl UserDirectory for Directory {
            async fn get_user_summary(&self, user_id: &UserId) -> Result<UserSummary, AppError>;
        }
    }

    mock! {
        pub Cache {}

        #[async_trait]
        impl UserSummaryCache for Cache {
            async fn put(&self, summary: UserSummary);
            async fn get(&self, id: &UserId) -> Option<UserSummary>;
            async fn invalidate(&self, id: &UserId);
            async fn clear(&self);
        }
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_directory() {
        let mut directory = MockDirectory::new();
        directory.expect_get_user_summary().never();
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .with(eq(uid("a")))
            .times(1)
            .returning(|id| Some(UserSummary::new(id.clone(), "Alice")));

        let service = UserSummaryService::new(Arc::new(directory), Arc::new(cache));
        let summary = service.get(&uid("a")).await.unwrap();
        assert_eq!(summary.name, "Alice");
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_and_stores() {
        let mut directory = MockDirectory::new();
        directory
            .expect_get_user_summary()
            .with(eq(uid("a")))
            .times(1)
            .returning(|id| Ok(UserSummary::new(id.clone(), "Alice")));
        let mut cache = MockCache::new();
        cache.expect_get().returning(|_| None);
        cache
            .expect_put()
            .withf(|summary| summary.name == "Alice")
            .times(1)
            .returning(|_| ());

        let service = UserSummaryService::new(Arc::new(directory), Arc::new(cache));
        assert_eq!(service.get(&uid("a")).await.unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_placeholder() {
        let mut directory = MockDirectory::new();
        directory
            .expect_get_user_summary()
            .returning(|_| Err(AppError::Network("timeout".to_string())));
        let mut cache = MockCache::new();
        cache.expect_get().returning(|_| None);
        cache.expect_put().never();

        let service = UserSummaryService::new(Arc::new(directory), Arc::new(cache));
        let summary = service.resolve(&uid("a")).await;

        assert!(summary.is_placeholder());
        assert_eq!(summary.id, uid("a"));
    }

    #[tokio::test]
    async fn test_prime_skips_placeholders() {
        let directory = MockDirectory::new();
        let mut cache = MockCache::new();
        cache.expect_put().times(1).returning(|_| ());

        let service = UserSummaryService::new(Arc::new(directory), Arc::new(cache));
        service.prime(UserSummary::placeholder(uid("x"))).await;
        service.prime(UserSummary::new(uid("y"), "Yui")).await;
    }
}
