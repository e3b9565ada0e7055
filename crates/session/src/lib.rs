mod error;
mod session;
mod state;

pub use error::SessionError;
pub use session::ClientSession;
pub use state::SessionState;
