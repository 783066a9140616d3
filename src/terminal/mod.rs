//! Line-oriented terminal sessions multiplexed over WebSocket connections.
//!
//! Each connection owns one [`session::Session`]. The
//! [`manager::SessionManager`] locks it per inbound line, runs the
//! [`dispatcher`] with a console bound to that session's
//! [`sink::OutputSink`], then emits exactly one prompt or close event.

pub mod dispatcher;
pub mod manager;
pub mod menus;
pub mod session;
pub mod sink;

pub use dispatcher::Outcome;
pub use manager::SessionManager;
pub use session::{Identity, Session, State};
pub use sink::{BoundConsole, Console, OutputSink, ServerEvent};
