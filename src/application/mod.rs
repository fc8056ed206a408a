pub mod ports;
pub mod services;
pub mod shared;

pub use services::{
    CursorPaginator, FeedSession, FeedState, MutationCoordinator, RealtimeListener,
    UserSummaryService,
};
