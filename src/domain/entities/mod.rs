pub mod change_event;
pub mod comment;
pub mod like;
pub mod notification;
pub mod post;
pub mod user;

pub use change_event::{
    ChangeEvent, ChangeKind, ChangeRecord, ChangeScope, CommentRecord, EntityTable, PostRecord,
};
pub use comment::{Comment, NewComment};
pub use like::Like;
pub use notification::NotificationDraft;
pub use post::{MediaKind, MediaRef, NewPost, Post, PostOrderKey};
pub use user::UserSummary;
