pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::services::{FeedCollaborators, FeedSession, SessionContext};
pub use domain::feed::{FeedCommand, FeedSnapshot, FeedStore, MergeOutcome};
pub use shared::{AppError, FeedConfig, Result};
