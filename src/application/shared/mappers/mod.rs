pub(crate) mod change_events;

pub use change_events::ChangeDecodeError;
pub(crate) use change_events::decode_change;
