pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::FeedConfig;
pub use error::{AppError, Result};
pub use validation::ValidationFailureKind;
