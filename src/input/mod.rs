//! Modal input routing
//!
//! The router classifies keyboard events; the bindings module holds the
//! declarative key tables it consults.

pub mod bindings;
pub mod router;

pub use bindings::{is_app_shortcut, seq, Mods, NormalAction, Platform};
pub use router::{Effect, Mode, RouteContext, Router, RouterConfig, Verdict, CHORD_TIMEOUT};
