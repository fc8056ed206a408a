pub mod backend;

pub use backend::InMemoryBackend;

use super::fixtures;
use linkup_feed::application::ports::UserSummaryCache;
use linkup_feed::infrastructure::{InMemoryChangeFeed, LruUserSummaryCache};
use linkup_feed::shared::config::FeedConfig;
use linkup_feed::{FeedCollaborators, FeedSession, SessionContext};
use std::sync::Arc;

/// バックエンドとそれにつながったセッション
pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub feed: InMemoryChangeFeed,
    pub session: FeedSession,
}

pub fn collaborators(
    backend: &Arc<InMemoryBackend>,
    feed: &InMemoryChangeFeed,
) -> FeedCollaborators {
    let cache: Arc<dyn UserSummaryCache> =
        Arc::new(LruUserSummaryCache::from_config(&fixtures::config().cache));
    FeedCollaborators {
        posts: backend.clone(),
        mutations: backend.clone(),
        users: backend.clone(),
        user_cache: cache,
        change_feed: Arc::new(feed.clone()),
        notifications: Some(backend.clone()),
    }
}

pub async fn harness(me: &str) -> Harness {
    harness_with(me, fixtures::config(), true).await
}

pub async fn harness_with(me: &str, config: FeedConfig, echo: bool) -> Harness {
    let feed = InMemoryChangeFeed::new(64);
    let backend = if echo {
        InMemoryBackend::new(feed.clone())
    } else {
        InMemoryBackend::without_echo(feed.clone())
    };
    let context: SessionContext = fixtures::context(me);
    backend.add_user(context.user.clone()).await;
    let session = FeedSession::new(collaborators(&backend, &feed), context, config);
    Harness {
        backend,
        feed,
        session,
    }
}
