//! ptyhub - session orchestration for embedded terminals
//!
//! ptyhub owns the plumbing between a pty-backed shell session and a
//! terminal view: session creation and teardown, output fan-out to
//! subscribers, modal (vim-style) keyboard routing, clipboard traffic and
//! working-directory scraping from terminal titles.
//!
//! # Layers
//!
//! - [`core`]: pty processes and the [`SessionManager`] registry with its
//!   output/exit subscriptions
//! - [`input`]: the two-mode [`Router`] and its declarative key tables
//! - [`lifecycle`]: [`TerminalInstance`], the coordinator that wires one
//!   view to one session
//! - [`cwd`], [`clipboard`], [`view`], [`config`]: the supporting cast
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ptyhub::{InstanceHooks, SessionManager, Settings, TabId, TerminalInstance};
//! # use ptyhub::TerminalView;
//! # struct MyView;
//! # impl TerminalView for MyView {
//! #     fn write(&mut self, _: &str) {}
//! #     fn clear(&mut self) {}
//! #     fn select_all(&mut self) {}
//! #     fn has_selection(&self) -> bool { false }
//! #     fn selection(&self) -> Option<String> { None }
//! #     fn scroll_lines(&mut self, _: i32) {}
//! #     fn scroll_to_top(&mut self) {}
//! #     fn scroll_to_bottom(&mut self) {}
//! #     fn rows(&self) -> u16 { 24 }
//! #     fn cols(&self) -> u16 { 80 }
//! # }
//!
//! let settings = Settings::load();
//! let manager = Arc::new(SessionManager::with_shell(settings.shell.clone()));
//! let instance = TerminalInstance::new(
//!     manager,
//!     MyView,
//!     TabId::new("tab-1"),
//!     &settings,
//!     InstanceHooks::default(),
//! );
//! instance.mount(None);
//! ```

pub mod clipboard;
pub mod config;
pub mod core;
pub mod cwd;
pub mod input;
pub mod lifecycle;
pub mod view;

pub use clipboard::{Clipboard, SystemClipboard};
pub use config::Settings;
pub use core::{SessionCreateError, SessionId, SessionManager, Subscription};
pub use cwd::extract_cwd;
pub use input::{Effect, Mode, Platform, RouteContext, Router, RouterConfig, Verdict};
pub use lifecycle::{InstanceHooks, KeyOutcome, SessionState, TabId, TerminalInstance};
pub use view::{TerminalView, ViewAction};
