//! Key binding tables
//!
//! Declarative data for the modal router: the reserved application-shortcut
//! allow-list, the Normal-mode key table, and the control sequences written
//! to a session to emulate keystrokes.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyModifiers};

use crate::view::ViewAction;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Mods: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const SUPER = 0b1000;
    }
}

impl From<KeyModifiers> for Mods {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Mods::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Mods::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Mods::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Mods::ALT;
        }
        if mods.contains(KeyModifiers::SUPER) {
            result |= Mods::SUPER;
        }
        result
    }
}

/// Host platform, deciding which modifier is the "primary" shortcut key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Command is primary; Ctrl reaches the shell.
    MacOs,
    /// Ctrl is primary (Windows, Linux).
    Other,
}

impl Platform {
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }

    /// Whether the platform's primary shortcut modifier is held.
    pub fn primary(self, mods: Mods) -> bool {
        match self {
            Platform::MacOs => mods.contains(Mods::SUPER),
            Platform::Other => mods.contains(Mods::CTRL),
        }
    }
}

/// Control sequences written to a session to emulate keystrokes the router
/// cannot observe the effect of (the shell owns its own line editing).
pub mod seq {
    pub const CURSOR_UP: &str = "\x1b[A";
    pub const CURSOR_LEFT: &str = "\x1b[D";
    pub const CURSOR_RIGHT: &str = "\x1b[C";
    /// Ctrl+A, beginning of line in readline-style editors.
    pub const LINE_START: &str = "\x01";
    /// Ctrl+E, end of line.
    pub const LINE_END: &str = "\x05";
    /// Alt+F, word forward.
    pub const WORD_FORWARD: &str = "\x1bf";
    /// Alt+B, word backward.
    pub const WORD_BACKWARD: &str = "\x1bb";
    /// Delete the character under the cursor.
    pub const FORWARD_DELETE: &str = "\x1b[3~";
    pub const BACKSPACE: &str = "\x7f";
    pub const CARRIAGE_RETURN: &str = "\r";
    /// Ctrl+U, kill to beginning of line.
    pub const KILL_TO_LINE_START: &str = "\x15";
}

/// Reserved application shortcuts: tab create/close/switch, panel toggles,
/// search, font size, pane switching. These always propagate to the
/// surrounding chrome, regardless of router mode.
pub fn is_app_shortcut(code: KeyCode, mods: Mods, platform: Platform) -> bool {
    if !platform.primary(mods) {
        return false;
    }
    let shift = mods.contains(Mods::SHIFT);
    let alt = mods.contains(Mods::ALT);

    match code {
        KeyCode::Char(c) => {
            let k = c.to_ascii_lowercase();
            // new tab, close tab, toggle explorer, search, command palette
            if !shift && !alt && matches!(k, 't' | 'w' | 'b' | 'f' | 'p') {
                return true;
            }
            // switch to tab 1-9
            if !shift && !alt && c.is_ascii_digit() && c != '0' {
                return true;
            }
            // font size
            if !shift && !alt && matches!(c, '+' | '=' | '-' | '0') {
                return true;
            }
            // reopen tab, toggle explorer, search, toggle diff
            if shift && !alt && (matches!(k, 't' | 'e' | 'f') || matches!(c, '+' | '=')) {
                return true;
            }
            // search option toggles
            if alt && !shift && matches!(k, 'c' | 'w' | 'r') {
                return true;
            }
            // previous/next tab
            if !alt && !shift && matches!(c, '[' | ']') {
                return true;
            }
            false
        }
        // previous/next tab
        KeyCode::Left | KeyCode::Right => alt,
        _ => false,
    }
}

/// What a Normal-mode key does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalAction {
    /// Local view action, never reaches the shell.
    View(ViewAction),
    /// Half-page scroll; the line count depends on the view's height.
    HalfPageDown,
    HalfPageUp,
    /// Control sequence written to the session.
    Send(&'static str),
    /// Transition to Insert mode, first writing the given priming
    /// sequences so the shell's cursor matches the vim semantics.
    EnterInsert(&'static [&'static str]),
    /// Paste the clipboard into the session.
    Paste,
    /// Deliver the event to the terminal view (and on to the shell).
    PassThrough,
    /// Recognized but intentionally inert.
    Ignore,
}

struct NormalBinding {
    code: KeyCode,
    ctrl: bool,
    action: NormalAction,
}

const fn bind(code: KeyCode, ctrl: bool, action: NormalAction) -> NormalBinding {
    NormalBinding { code, ctrl, action }
}

/// Normal-mode key table, evaluated top-down, first match wins. Keys not
/// listed here (and not handled by the chord or shortcut logic) are
/// swallowed: Normal mode never lets an unrecognized key reach the shell.
static NORMAL_BINDINGS: &[NormalBinding] = &[
    // Ctrl+J stays available to the shell
    bind(KeyCode::Char('j'), true, NormalAction::PassThrough),
    // Scrollback navigation
    bind(
        KeyCode::Char('j'),
        false,
        NormalAction::View(ViewAction::ScrollLines(1)),
    ),
    bind(
        KeyCode::Down,
        false,
        NormalAction::View(ViewAction::ScrollLines(1)),
    ),
    bind(
        KeyCode::Char('k'),
        false,
        NormalAction::View(ViewAction::ScrollLines(-1)),
    ),
    bind(
        KeyCode::Up,
        false,
        NormalAction::View(ViewAction::ScrollLines(-1)),
    ),
    bind(
        KeyCode::Char('G'),
        false,
        NormalAction::View(ViewAction::ScrollToBottom),
    ),
    bind(KeyCode::Char('d'), true, NormalAction::HalfPageDown),
    bind(KeyCode::Char('u'), true, NormalAction::HalfPageUp),
    // Cursor movement, simulated against the shell's line editor
    bind(KeyCode::Char('h'), false, NormalAction::Send(seq::CURSOR_LEFT)),
    bind(KeyCode::Left, false, NormalAction::Send(seq::CURSOR_LEFT)),
    bind(KeyCode::Char('l'), false, NormalAction::Send(seq::CURSOR_RIGHT)),
    bind(KeyCode::Right, false, NormalAction::Send(seq::CURSOR_RIGHT)),
    bind(KeyCode::Char('w'), false, NormalAction::Send(seq::WORD_FORWARD)),
    bind(KeyCode::Char('b'), false, NormalAction::Send(seq::WORD_BACKWARD)),
    bind(KeyCode::Char('0'), false, NormalAction::Send(seq::LINE_START)),
    bind(KeyCode::Char('^'), false, NormalAction::Send(seq::LINE_START)),
    bind(KeyCode::Char('$'), false, NormalAction::Send(seq::LINE_END)),
    // Editing
    bind(KeyCode::Char('x'), false, NormalAction::Send(seq::FORWARD_DELETE)),
    bind(KeyCode::Char('X'), false, NormalAction::Send(seq::BACKSPACE)),
    bind(KeyCode::Char('p'), false, NormalAction::Paste),
    // Mode entry
    bind(KeyCode::Char('i'), false, NormalAction::EnterInsert(&[])),
    bind(
        KeyCode::Char('a'),
        false,
        NormalAction::EnterInsert(&[seq::CURSOR_RIGHT]),
    ),
    bind(
        KeyCode::Char('A'),
        false,
        NormalAction::EnterInsert(&[seq::LINE_END]),
    ),
    bind(
        KeyCode::Char('I'),
        false,
        NormalAction::EnterInsert(&[seq::LINE_START]),
    ),
    bind(
        KeyCode::Char('o'),
        false,
        NormalAction::EnterInsert(&[seq::LINE_END, seq::CARRIAGE_RETURN]),
    ),
    bind(
        KeyCode::Char('O'),
        false,
        NormalAction::EnterInsert(&[seq::LINE_START, seq::CARRIAGE_RETURN, seq::CURSOR_UP]),
    ),
    bind(KeyCode::Char('c'), false, NormalAction::EnterInsert(&[])),
    // Search is owned by the surrounding chrome
    bind(KeyCode::Char('/'), false, NormalAction::Ignore),
];

/// Look up a Normal-mode binding for the key and its Ctrl state.
pub fn normal_binding(code: KeyCode, ctrl: bool) -> Option<NormalAction> {
    NORMAL_BINDINGS
        .iter()
        .find(|b| b.code == code && b.ctrl == ctrl)
        .map(|b| b.action)
}
