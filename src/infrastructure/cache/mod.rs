pub mod user_summary_cache;

pub use user_summary_cache::LruUserSummaryCache;
