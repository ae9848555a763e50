//! Post-commit notification fan-out

pub mod dispatcher;
pub mod sink;

pub use dispatcher::EventDispatcher;
pub use sink::{BroadcastSink, NotificationSink, TracingSink};
