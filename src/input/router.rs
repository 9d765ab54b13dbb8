//! Modal input router
//!
//! Classifies every keyboard event into one of four destinations: the
//! surrounding application (reserved shortcuts), the local terminal view,
//! the remote shell session, or nowhere at all. Classification is evaluated
//! top-down and the first matching rule wins.
//!
//! The router is pure state-machine code: it never touches the view, the
//! session or the clipboard itself. It returns a [`Verdict`] and the
//! lifecycle coordinator executes the effects.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use super::bindings::{self, seq, Mods, NormalAction, Platform};
use crate::view::ViewAction;

/// How long a `g` prefix stays armed waiting for the second `g`.
pub const CHORD_TIMEOUT: Duration = Duration::from_millis(500);

/// Router mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Insert,
    Normal,
}

/// Configuration passed explicitly into every classification call.
#[derive(Clone, Copy, Debug)]
pub struct RouterConfig {
    /// Whether modal (vim-style) input is enabled at all.
    pub vim_mode: bool,
    pub platform: Platform,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            vim_mode: false,
            platform: Platform::native(),
        }
    }
}

/// Per-event facts about the terminal view the router needs to classify.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouteContext {
    /// Current view height, for half-page scrolling.
    pub rows: u16,
    /// Whether a selection exists, for the conditional copy shortcut.
    pub has_selection: bool,
}

/// Side effect to be executed by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Apply a local action to the terminal view.
    View(ViewAction),
    /// Write a control sequence to the session.
    Send(&'static str),
    /// Write the clipboard contents to the session.
    Paste,
    /// Copy the current selection to the clipboard.
    CopySelection,
}

/// Classification result for one keyboard event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Reserved application shortcut; propagate to the surrounding chrome.
    Bubble,
    /// Deliver the event to the terminal view unchanged.
    Forward,
    /// Drop the event entirely.
    Swallow,
    /// Execute these effects, then drop the event. An empty list means the
    /// event only changed router state.
    Perform(Vec<Effect>),
}

/// Two-mode keystroke classifier with `gg` chord state.
pub struct Router {
    mode: Mode,
    chord_deadline: Option<Instant>,
}

impl Router {
    pub fn new(initial_mode: Mode) -> Self {
        Self {
            mode: initial_mode,
            chord_deadline: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether a `g` prefix is currently armed.
    pub fn chord_pending(&self) -> bool {
        self.chord_deadline.is_some()
    }

    /// Classify one keyboard event.
    pub fn route(&mut self, event: &KeyEvent, ctx: &RouteContext, cfg: &RouterConfig) -> Verdict {
        self.route_at(event, ctx, cfg, Instant::now())
    }

    /// Classification with an explicit clock, for chord-expiry handling.
    pub fn route_at(
        &mut self,
        event: &KeyEvent,
        ctx: &RouteContext,
        cfg: &RouterConfig,
        now: Instant,
    ) -> Verdict {
        let mods = Mods::from(event.modifiers);

        // 1. Reserved application shortcuts always bubble, in every mode.
        if bindings::is_app_shortcut(event.code, mods, cfg.platform) {
            return Verdict::Bubble;
        }

        let primary_phase = matches!(event.kind, KeyEventKind::Press | KeyEventKind::Repeat);

        if cfg.vim_mode && self.mode == Mode::Normal {
            // 2. While a chord may be mid-flight in the platform's input
            // pipeline, Normal mode blocks every non-press event outright
            // to prevent character injection.
            if !primary_phase {
                return Verdict::Swallow;
            }
            return self.route_normal(event, mods, ctx, cfg, now);
        }

        // Insert mode (or vim disabled entirely).
        if !primary_phase {
            return Verdict::Forward;
        }
        self.route_insert(event, mods, ctx, cfg)
    }

    fn route_normal(
        &mut self,
        event: &KeyEvent,
        mods: Mods,
        ctx: &RouteContext,
        cfg: &RouterConfig,
        now: Instant,
    ) -> Verdict {
        // Any key press disarms the chord; only a timely second `g`
        // consumes it.
        let chord_armed = self
            .chord_deadline
            .take()
            .map(|deadline| now < deadline)
            .unwrap_or(false);

        let primary = cfg.platform.primary(mods);
        let ctrl = mods.contains(Mods::CTRL);
        let plain_mods = !mods.contains(Mods::SHIFT) && !mods.contains(Mods::ALT);

        // Clear/copy/paste/select-all shortcuts work irrespective of mode.
        if let KeyCode::Char(c) = event.code {
            let k = c.to_ascii_lowercase();
            if primary {
                if plain_mods && k == 'k' {
                    return Verdict::Perform(vec![Effect::View(ViewAction::Clear)]);
                }
                if k == 'c' {
                    if ctx.has_selection {
                        return Verdict::Perform(vec![Effect::CopySelection]);
                    }
                    // No selection: the event must still reach the shell,
                    // e.g. to deliver an interrupt.
                    return Verdict::Forward;
                }
                if k == 'v' {
                    return Verdict::Perform(vec![Effect::Paste]);
                }
                if k == 'a' {
                    return Verdict::Perform(vec![Effect::View(ViewAction::SelectAll)]);
                }
            }
        }
        // Other Command combinations are not ours to interpret.
        if mods.contains(Mods::SUPER) {
            return Verdict::Forward;
        }

        // The `g` prefix: second press within the window scrolls to top.
        if event.code == KeyCode::Char('g') && !ctrl {
            if chord_armed {
                return Verdict::Perform(vec![Effect::View(ViewAction::ScrollToTop)]);
            }
            self.chord_deadline = Some(now + CHORD_TIMEOUT);
            return Verdict::Perform(Vec::new());
        }

        if let Some(action) = bindings::normal_binding(event.code, ctrl) {
            return self.apply_normal_action(action, ctx);
        }

        // Default deny: nothing unrecognized reaches the shell.
        Verdict::Swallow
    }

    fn apply_normal_action(&mut self, action: NormalAction, ctx: &RouteContext) -> Verdict {
        let half_page = i32::from(ctx.rows / 2);
        match action {
            NormalAction::View(action) => Verdict::Perform(vec![Effect::View(action)]),
            NormalAction::HalfPageDown => {
                Verdict::Perform(vec![Effect::View(ViewAction::ScrollLines(half_page))])
            }
            NormalAction::HalfPageUp => {
                Verdict::Perform(vec![Effect::View(ViewAction::ScrollLines(-half_page))])
            }
            NormalAction::Send(seq) => Verdict::Perform(vec![Effect::Send(seq)]),
            NormalAction::EnterInsert(priming) => {
                self.mode = Mode::Insert;
                Verdict::Perform(priming.iter().map(|s| Effect::Send(s)).collect())
            }
            NormalAction::Paste => Verdict::Perform(vec![Effect::Paste]),
            NormalAction::PassThrough => Verdict::Forward,
            NormalAction::Ignore => Verdict::Swallow,
        }
    }

    fn route_insert(
        &mut self,
        event: &KeyEvent,
        mods: Mods,
        ctx: &RouteContext,
        cfg: &RouterConfig,
    ) -> Verdict {
        // Escape with no modifiers enters Normal mode.
        if cfg.vim_mode && event.code == KeyCode::Esc && mods.is_empty() {
            self.mode = Mode::Normal;
            return Verdict::Perform(Vec::new());
        }

        let primary = cfg.platform.primary(mods);
        let ctrl = mods.contains(Mods::CTRL);
        let plain_mods = !mods.contains(Mods::SHIFT) && !mods.contains(Mods::ALT);

        if let KeyCode::Char(c) = event.code {
            let k = c.to_ascii_lowercase();
            if (primary || ctrl) && plain_mods && k == 'k' {
                return Verdict::Perform(vec![Effect::View(ViewAction::Clear)]);
            }
            if primary && plain_mods {
                match k {
                    'c' => {
                        // Copy only when a selection exists; otherwise the
                        // shell still gets the event (interrupt delivery).
                        if ctx.has_selection {
                            return Verdict::Perform(vec![Effect::CopySelection]);
                        }
                        return Verdict::Forward;
                    }
                    'v' => return Verdict::Perform(vec![Effect::Paste]),
                    'a' => return Verdict::Perform(vec![Effect::View(ViewAction::SelectAll)]),
                    _ => {}
                }
            }
        }

        // macOS line-navigation aliases for the Command key.
        if cfg.platform == Platform::MacOs && mods.contains(Mods::SUPER) {
            match event.code {
                KeyCode::Backspace => {
                    return Verdict::Perform(vec![Effect::Send(seq::KILL_TO_LINE_START)])
                }
                KeyCode::Left => return Verdict::Perform(vec![Effect::Send(seq::LINE_START)]),
                KeyCode::Right => return Verdict::Perform(vec![Effect::Send(seq::LINE_END)]),
                _ => {}
            }
        }

        Verdict::Forward
    }
}
