//! Network-facing side of the game: per-connection sessions, the request
//! router, authentication, the mentor and the TCP listener.

pub mod auth;
pub mod context;
pub mod listener;
pub mod mentor;
pub mod messages;
pub mod session;

pub use context::GameContext;
pub use listener::serve;
pub use messages::{ClientRequest, MessageType, RequestType, ServerMessage};
pub use session::GameSession;
