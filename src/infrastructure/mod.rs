pub mod cache;
pub mod realtime;

pub use cache::LruUserSummaryCache;
pub use realtime::InMemoryChangeFeed;
