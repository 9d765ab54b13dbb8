//! Clipboard access
//!
//! Small seam over the system clipboard so routing and lifecycle code can
//! be tested without touching the real one. Clipboard failures are logged
//! and otherwise ignored.

use tracing::warn;

pub trait Clipboard {
    fn get(&mut self) -> Option<String>;
    fn set(&mut self, text: &str);
}

/// System clipboard backed by `arboard`.
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(cb) => Some(cb),
            Err(e) => {
                warn!(error = %e, "system clipboard unavailable");
                None
            }
        };
        Self { inner }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipboard for SystemClipboard {
    fn get(&mut self) -> Option<String> {
        let cb = self.inner.as_mut()?;
        match cb.get_text() {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "clipboard read failed");
                None
            }
        }
    }

    fn set(&mut self, text: &str) {
        if let Some(cb) = self.inner.as_mut() {
            if let Err(e) = cb.set_text(text.to_string()) {
                warn!(error = %e, "clipboard write failed");
            }
        }
    }
}
