pub mod feed_session;
pub mod feed_state;
pub mod mutation_coordinator;
pub mod paginator;
pub mod realtime_listener;
pub mod user_summary_service;

pub use feed_session::{FeedCollaborators, FeedSession, SessionContext};
pub use feed_state::FeedState;
pub use mutation_coordinator::{
    EntityKey, FeedNotice, MutationCoordinator, MutationKind, MutationStatus, OptimisticPatch,
    PendingMutation,
};
pub use paginator::{CursorPaginator, PageOutcome, PaginatorState};
pub use realtime_listener::{ChangeApplier, RealtimeListener};
pub use user_summary_service::UserSummaryService;
