pub mod cache;
pub mod change_feed;
pub mod mutation_gateway;
pub mod notification_gateway;
pub mod post_gateway;
pub mod user_directory;

pub use cache::UserSummaryCache;
pub use change_feed::{ChangeFeed, ChangeSubscription, SubscriptionHandle};
pub use mutation_gateway::MutationGateway;
pub use notification_gateway::NotificationGateway;
pub use post_gateway::PostGateway;
pub use user_directory::UserDirectory;
