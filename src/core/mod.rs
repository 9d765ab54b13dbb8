//! Core session infrastructure
//!
//! Contains the PTY wrapper and the session manager that owns the live
//! session table and its output/exit subscriptions.

pub mod pty;
pub mod session;

pub use pty::{PtyError, PtyHandle};
pub use session::{SessionCreateError, SessionId, SessionManager, Subscription};
