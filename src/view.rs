//! Terminal-view collaborator interface
//!
//! The view renders output and owns selection/scrollback state; this crate
//! never draws glyphs itself. Everything the orchestration layer needs from
//! the view is captured by [`TerminalView`].

/// The pre-built terminal-view component, as seen from this crate.
pub trait TerminalView {
    /// Feed output text to the view for rendering.
    fn write(&mut self, text: &str);
    /// Clear the visible screen and scrollback.
    fn clear(&mut self);
    /// Select the entire buffer.
    fn select_all(&mut self);
    /// Whether a selection currently exists.
    fn has_selection(&self) -> bool;
    /// The selected text, if any.
    fn selection(&self) -> Option<String>;
    /// Scroll by `n` lines (positive scrolls down).
    fn scroll_lines(&mut self, n: i32);
    fn scroll_to_top(&mut self);
    fn scroll_to_bottom(&mut self);
    fn rows(&self) -> u16;
    fn cols(&self) -> u16;
}

/// A local view action produced by the input router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewAction {
    Clear,
    SelectAll,
    ScrollLines(i32),
    ScrollToTop,
    ScrollToBottom,
}

impl ViewAction {
    pub fn apply<V: TerminalView + ?Sized>(self, view: &mut V) {
        match self {
            ViewAction::Clear => view.clear(),
            ViewAction::SelectAll => view.select_all(),
            ViewAction::ScrollLines(n) => view.scroll_lines(n),
            ViewAction::ScrollToTop => view.scroll_to_top(),
            ViewAction::ScrollToBottom => view.scroll_to_bottom(),
        }
    }
}
