use chrono::{DateTime, TimeZone, Utc};
use linkup_feed::domain::entities::{Post, UserSummary};
use linkup_feed::domain::value_objects::{PostId, UserId};
use linkup_feed::shared::config::FeedConfig;
use linkup_feed::SessionContext;
use std::time::Duration;

pub fn user_id(id: &str) -> UserId {
    UserId::new(id.to_string()).expect("valid user id")
}

pub fn post_id(id: &str) -> PostId {
    PostId::new(id.to_string()).expect("valid post id")
}

pub fn user(id: &str) -> UserSummary {
    UserSummary::new(user_id(id), format!("User {id}")).with_image(format!("avatars/{id}.png"))
}

pub fn context(id: &str) -> SessionContext {
    SessionContext::new(user(id))
}

pub fn at_minute(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
}

/// `P{n}` の投稿（n が大きいほど新しい）
pub fn server_post(n: u32, author: &str) -> Post {
    Post::new(
        post_id(&n.to_string()),
        user(author),
        format!("<p>P{n}</p>"),
        at_minute(n),
    )
}

pub fn config() -> FeedConfig {
    let mut config = FeedConfig::default();
    config.pagination.page_step = 4;
    config
}

/// 条件が満たされるまで待つ（リアルタイム反映の確認用）
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
