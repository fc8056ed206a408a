pub mod snapshot;
pub mod store;


pub use snapshot::FeedSnapshot;
pub use store::{FeedCommand, FeedStore, MergeOutcome};
