pub mod in_memory_change_feed;

pub use in_memory_change_feed::InMemoryChangeFeed;
