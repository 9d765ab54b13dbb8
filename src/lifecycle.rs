//! Terminal instance lifecycle
//!
//! One [`TerminalInstance`] composes the session manager, the modal input
//! router, the title scraper and the clipboard for a single terminal view:
//! it creates the session at mount, wires output/exit/data/resize/title
//! flows, and tears everything down in a fixed order at unmount
//! (unsubscribe output, unsubscribe exit, close).
//!
//! Creation is asynchronous. The state machine below guards against
//! duplicate creation when mount is re-entered, and an unmount that races
//! an in-flight creation still closes whatever session id eventually
//! arrives.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossterm::event::KeyEvent;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::{home_dir, Settings};
use crate::core::session::{SessionId, SessionManager, Subscription};
use crate::cwd::extract_cwd;
use crate::input::{Effect, Platform, RouteContext, Router, RouterConfig, Verdict};
use crate::view::TerminalView;

/// Line written into the view when the shell exits normally.
const EXIT_BANNER: &str = "\r\n\x1b[90m[Process completed]\x1b[0m\r\n";

/// Identifier of the tab collaborator this instance reports into.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where the session stands. Mount only ever acts on `Uninitialized`, so a
/// re-entered mount cannot create a second session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Creating,
    Ready(SessionId),
    Closed,
}

/// Callbacks into the surrounding application.
#[derive(Default)]
pub struct InstanceHooks {
    /// Raw terminal title updates.
    pub on_title_change: Option<Box<dyn FnMut(&str) + Send>>,
    /// The shell exited.
    pub on_exit: Option<Box<dyn FnMut() + Send>>,
    /// Session creation failed; the message is user-facing.
    pub on_error: Option<Box<dyn FnMut(&str) + Send>>,
    /// A working directory was scraped from the title.
    pub update_tab_cwd: Option<Box<dyn FnMut(&TabId, &Path) + Send>>,
}

/// What the embedding should do with a key event after routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Reserved application shortcut; propagate it upward.
    NotHandled,
    /// Hand the event to the terminal view for normal processing.
    PassThrough,
    /// Fully consumed here.
    Handled,
}

/// Both unsubscribe handles live in one cell so teardown can take them
/// atomically with respect to the creation thread storing them.
#[derive(Default)]
struct SubscriptionCell {
    output: Option<Subscription>,
    exit: Option<Subscription>,
}

struct Shared<V: TerminalView> {
    manager: Arc<SessionManager>,
    view: Mutex<V>,
    state: Mutex<SessionState>,
    subs: Mutex<SubscriptionCell>,
    hooks: Mutex<InstanceHooks>,
    ended: AtomicBool,
}

/// Lifecycle coordinator for one terminal view.
pub struct TerminalInstance<V: TerminalView + Send + 'static> {
    shared: Arc<Shared<V>>,
    router: Router,
    router_cfg: RouterConfig,
    clipboard: Box<dyn Clipboard + Send>,
    copy_on_select: bool,
    tab_id: TabId,
    home: String,
}

impl<V: TerminalView + Send + 'static> TerminalInstance<V> {
    pub fn new(
        manager: Arc<SessionManager>,
        view: V,
        tab_id: TabId,
        settings: &Settings,
        hooks: InstanceHooks,
    ) -> Self {
        Self::with_clipboard(
            manager,
            view,
            tab_id,
            settings,
            hooks,
            Box::new(SystemClipboard::new()),
        )
    }

    pub fn with_clipboard(
        manager: Arc<SessionManager>,
        view: V,
        tab_id: TabId,
        settings: &Settings,
        hooks: InstanceHooks,
        clipboard: Box<dyn Clipboard + Send>,
    ) -> Self {
        // Resolved once per instance; title scraping reuses it for every
        // tilde expansion.
        let home = home_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            shared: Arc::new(Shared {
                manager,
                view: Mutex::new(view),
                state: Mutex::new(SessionState::Uninitialized),
                subs: Mutex::new(SubscriptionCell::default()),
                hooks: Mutex::new(hooks),
                ended: AtomicBool::new(false),
            }),
            router: Router::new(settings.initial_mode),
            router_cfg: RouterConfig {
                vim_mode: settings.vim_mode,
                platform: Platform::native(),
            },
            clipboard,
            copy_on_select: settings.copy_on_select,
            tab_id,
            home,
        }
    }

    /// Override the router configuration (platform, vim flag).
    pub fn configure_router(&mut self, cfg: RouterConfig) {
        self.router_cfg = cfg;
    }

    /// Start the session asynchronously using the view's current geometry.
    /// A second call while the first is in flight (or after it) is a no-op.
    pub fn mount(&self, cwd: Option<String>) {
        {
            let mut state = self.shared.state.lock();
            if *state != SessionState::Uninitialized {
                debug!(state = ?*state, "mount ignored");
                return;
            }
            *state = SessionState::Creating;
        }
        let (cols, rows) = {
            let view = self.shared.view.lock();
            (view.cols(), view.rows())
        };
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || create_session(shared, cols, rows, cwd));
    }

    /// Tear down: unsubscribe output, unsubscribe exit, then close. After
    /// this returns no output or exit callback can reach the view.
    pub fn unmount(&self) {
        {
            let mut subs = self.shared.subs.lock();
            if let Some(sub) = subs.output.take() {
                sub.cancel();
            }
            if let Some(sub) = subs.exit.take() {
                sub.cancel();
            }
        }
        let previous = {
            let mut state = self.shared.state.lock();
            std::mem::replace(&mut *state, SessionState::Closed)
        };
        if let SessionState::Ready(id) = previous {
            self.shared.manager.close(&id);
        }
    }

    /// Route one keyboard event and execute whatever it resolved to.
    pub fn handle_key(&mut self, event: &KeyEvent) -> KeyOutcome {
        let ctx = {
            let view = self.shared.view.lock();
            RouteContext {
                rows: view.rows(),
                has_selection: view.has_selection(),
            }
        };
        match self.router.route(event, &ctx, &self.router_cfg) {
            Verdict::Bubble => KeyOutcome::NotHandled,
            Verdict::Forward => KeyOutcome::PassThrough,
            Verdict::Swallow => KeyOutcome::Handled,
            Verdict::Perform(effects) => {
                for effect in effects {
                    self.apply_effect(effect);
                }
                KeyOutcome::Handled
            }
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::View(action) => action.apply(&mut *self.shared.view.lock()),
            Effect::Send(seq) => self.write_session(seq),
            Effect::Paste => {
                if let Some(text) = self.clipboard.get() {
                    if !text.is_empty() {
                        self.write_session(&text);
                    }
                }
            }
            Effect::CopySelection => {
                let selection = self.shared.view.lock().selection();
                if let Some(text) = selection {
                    self.clipboard.set(&text);
                }
            }
        }
    }

    /// Input produced by the terminal view, forwarded to the shell.
    pub fn handle_view_data(&self, data: &str) {
        self.write_session(data);
    }

    /// The view was resized; mirror the geometry onto the pty.
    pub fn handle_view_resize(&self, cols: u16, rows: u16) {
        let state = self.shared.state.lock();
        if let SessionState::Ready(id) = &*state {
            self.shared.manager.resize(id, cols, rows);
        }
    }

    /// A terminal title update: report it upward and scrape it for a
    /// working directory.
    pub fn handle_title_change(&mut self, title: &str) {
        if let Some(cb) = self.shared.hooks.lock().on_title_change.as_mut() {
            cb(title);
        }
        if let Some(path) = extract_cwd(title, &self.home) {
            if let Some(cb) = self.shared.hooks.lock().update_tab_cwd.as_mut() {
                cb(&self.tab_id, &path);
            }
        }
    }

    /// The view's selection changed; copy it out when copy-on-select is on.
    pub fn handle_selection_change(&mut self) {
        if !self.copy_on_select {
            return;
        }
        let selection = self.shared.view.lock().selection();
        if let Some(text) = selection {
            if !text.is_empty() {
                self.clipboard.set(&text);
            }
        }
    }

    fn write_session(&self, data: &str) {
        let state = self.shared.state.lock();
        if let SessionState::Ready(id) = &*state {
            self.shared.manager.write(id, data);
        } else {
            debug!("session input dropped; session not ready");
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.lock().clone()
    }

    pub fn mode(&self) -> crate::input::Mode {
        self.router.mode()
    }

    /// Whether the instance reached its "ended" display state (shell exit
    /// or creation failure).
    pub fn ended(&self) -> bool {
        self.shared.ended.load(Ordering::SeqCst)
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }
}

impl<V: TerminalView + Send + 'static> Drop for TerminalInstance<V> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Creation worker. Runs off-thread; the subscription cell is held across
/// the state flip and subscription wiring so an unmount can never observe
/// a ready session with unstored handles.
fn create_session<V: TerminalView + Send + 'static>(
    shared: Arc<Shared<V>>,
    cols: u16,
    rows: u16,
    cwd: Option<String>,
) {
    let id = match shared.manager.create(cols, rows, cwd.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            info!(error = %e, "session creation failed");
            shared
                .view
                .lock()
                .write(&format!("\x1b[31mSession error: {}\x1b[0m\r\n", e));
            shared.ended.store(true, Ordering::SeqCst);
            *shared.state.lock() = SessionState::Closed;
            if let Some(cb) = shared.hooks.lock().on_error.as_mut() {
                cb(&e.to_string());
            }
            return;
        }
    };

    let mut subs = shared.subs.lock();
    {
        let mut state = shared.state.lock();
        if *state == SessionState::Closed {
            // Unmounted while creating: close the late arrival, in order.
            drop(state);
            drop(subs);
            shared.manager.close(&id);
            return;
        }
        *state = SessionState::Ready(id.clone());
    }

    let output_shared = Arc::clone(&shared);
    subs.output = shared.manager.subscribe_output(&id, move |chunk| {
        output_shared.view.lock().write(chunk);
    });

    let exit_shared = Arc::clone(&shared);
    subs.exit = shared.manager.subscribe_exit(&id, move || {
        exit_shared.view.lock().write(EXIT_BANNER);
        exit_shared.ended.store(true, Ordering::SeqCst);
        if let Some(cb) = exit_shared.hooks.lock().on_exit.as_mut() {
            cb();
        }
    });
    drop(subs);

    // The view may have been measured again while the session was being
    // created; send one resize unconditionally to settle the race.
    let (cols, rows) = {
        let view = shared.view.lock();
        (view.cols(), view.rows())
    };
    shared.manager.resize(&id, cols, rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Mode;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct ViewLog {
        written: String,
        cleared: usize,
        scrolled: Vec<i32>,
        to_top: usize,
        selection: Option<String>,
    }

    #[derive(Clone)]
    struct MockView {
        log: Arc<Mutex<ViewLog>>,
        rows: u16,
        cols: u16,
    }

    impl MockView {
        fn new(cols: u16, rows: u16) -> Self {
            Self {
                log: Arc::new(Mutex::new(ViewLog::default())),
                rows,
                cols,
            }
        }
    }

    impl TerminalView for MockView {
        fn write(&mut self, text: &str) {
            self.log.lock().written.push_str(text);
        }
        fn clear(&mut self) {
            self.log.lock().cleared += 1;
        }
        fn select_all(&mut self) {}
        fn has_selection(&self) -> bool {
            self.log.lock().selection.is_some()
        }
        fn selection(&self) -> Option<String> {
            self.log.lock().selection.clone()
        }
        fn scroll_lines(&mut self, n: i32) {
            self.log.lock().scrolled.push(n);
        }
        fn scroll_to_top(&mut self) {
            self.log.lock().to_top += 1;
        }
        fn scroll_to_bottom(&mut self) {}
        fn rows(&self) -> u16 {
            self.rows
        }
        fn cols(&self) -> u16 {
            self.cols
        }
    }

    #[derive(Clone, Default)]
    struct RecordingClipboard {
        contents: Arc<Mutex<Option<String>>>,
    }

    impl Clipboard for RecordingClipboard {
        fn get(&mut self) -> Option<String> {
            self.contents.lock().clone()
        }
        fn set(&mut self, text: &str) {
            *self.contents.lock() = Some(text.to_string());
        }
    }

    fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
        let start = Instant::now();
        while !cond() {
            if start.elapsed() > Duration::from_secs(10) {
                panic!("timed out waiting for {}", what);
            }
            thread::sleep(Duration::from_millis(25));
        }
    }

    fn vim_settings() -> Settings {
        Settings {
            vim_mode: true,
            initial_mode: Mode::Normal,
            ..Settings::default()
        }
    }

    fn mac_router_cfg(vim_mode: bool) -> RouterConfig {
        RouterConfig {
            vim_mode,
            platform: Platform::MacOs,
        }
    }

    fn sh_manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::with_shell(Some("/bin/sh".to_string())))
    }

    #[test]
    #[cfg(unix)]
    fn mount_streams_output_and_unmount_closes() {
        let manager = sh_manager();
        let view = MockView::new(80, 24);
        let log = Arc::clone(&view.log);
        let instance = TerminalInstance::with_clipboard(
            Arc::clone(&manager),
            view,
            TabId::new("tab-1"),
            &Settings::default(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );

        instance.mount(None);
        wait_until("session ready", || {
            matches!(instance.state(), SessionState::Ready(_))
        });
        assert_eq!(manager.session_count(), 1);

        instance.handle_view_data("echo lifecycle-marker\n");
        wait_until("marker in view", || {
            log.lock().written.contains("lifecycle-marker")
        });

        instance.unmount();
        assert_eq!(manager.session_count(), 0);
        assert_eq!(instance.state(), SessionState::Closed);
    }

    #[test]
    #[cfg(unix)]
    fn mount_is_idempotent() {
        let manager = sh_manager();
        let view = MockView::new(80, 24);
        let instance = TerminalInstance::with_clipboard(
            Arc::clone(&manager),
            view,
            TabId::new("tab-1"),
            &Settings::default(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );

        instance.mount(None);
        instance.mount(None);
        wait_until("session ready", || {
            matches!(instance.state(), SessionState::Ready(_))
        });
        assert_eq!(manager.session_count(), 1);
        instance.unmount();
    }

    #[test]
    #[cfg(unix)]
    fn unmount_during_creation_still_closes_session() {
        let manager = sh_manager();
        let view = MockView::new(80, 24);
        let instance = TerminalInstance::with_clipboard(
            Arc::clone(&manager),
            view,
            TabId::new("tab-1"),
            &Settings::default(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );

        instance.mount(None);
        instance.unmount();
        assert_eq!(instance.state(), SessionState::Closed);

        // Whatever session the creation thread obtains must get closed
        wait_until("late session closed", || manager.session_count() == 0);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn create_failure_enters_ended_state() {
        let manager = Arc::new(SessionManager::with_shell(Some(
            "/nonexistent/shell".to_string(),
        )));
        let view = MockView::new(80, 24);
        let log = Arc::clone(&view.log);
        let errored = Arc::new(AtomicBool::new(false));
        let errored_flag = Arc::clone(&errored);
        let hooks = InstanceHooks {
            on_error: Some(Box::new(move |_| {
                errored_flag.store(true, Ordering::SeqCst);
            })),
            ..InstanceHooks::default()
        };
        let instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-1"),
            &Settings::default(),
            hooks,
            Box::new(RecordingClipboard::default()),
        );

        instance.mount(None);
        wait_until("error hook", || errored.load(Ordering::SeqCst));
        assert!(instance.ended());
        assert!(log.lock().written.contains("\x1b[31m"));
        assert_eq!(instance.state(), SessionState::Closed);
    }

    #[test]
    #[cfg(unix)]
    fn shell_exit_writes_banner_and_fires_hook() {
        let manager = sh_manager();
        let view = MockView::new(80, 24);
        let log = Arc::clone(&view.log);
        let exited = Arc::new(AtomicBool::new(false));
        let exited_flag = Arc::clone(&exited);
        let hooks = InstanceHooks {
            on_exit: Some(Box::new(move || {
                exited_flag.store(true, Ordering::SeqCst);
            })),
            ..InstanceHooks::default()
        };
        let instance = TerminalInstance::with_clipboard(
            Arc::clone(&manager),
            view,
            TabId::new("tab-1"),
            &Settings::default(),
            hooks,
            Box::new(RecordingClipboard::default()),
        );

        instance.mount(None);
        wait_until("session ready", || {
            matches!(instance.state(), SessionState::Ready(_))
        });
        instance.handle_view_data("exit\n");
        wait_until("exit hook", || exited.load(Ordering::SeqCst));
        wait_until("exit banner", || {
            log.lock().written.contains("[Process completed]")
        });
        assert!(instance.ended());
        instance.unmount();
    }

    #[test]
    fn title_change_forwards_absolute_cwd_once() {
        let manager = Arc::new(SessionManager::new());
        let view = MockView::new(80, 24);
        let updates: Arc<Mutex<Vec<(String, PathBuf)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let hooks = InstanceHooks {
            update_tab_cwd: Some(Box::new(move |tab, path| {
                sink.lock().push((tab.as_str().to_string(), path.to_path_buf()));
            })),
            ..InstanceHooks::default()
        };
        let mut instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-9"),
            &Settings::default(),
            hooks,
            Box::new(RecordingClipboard::default()),
        );

        instance.handle_title_change("host: /tmp/workdir");
        instance.handle_title_change("random text with no path");
        let recorded = updates.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "tab-9");
        assert_eq!(recorded[0].1, PathBuf::from("/tmp/workdir"));
    }

    #[test]
    fn key_routing_drives_the_view() {
        let manager = Arc::new(SessionManager::new());
        let view = MockView::new(80, 24);
        let log = Arc::clone(&view.log);
        let mut instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-1"),
            &vim_settings(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );
        instance.configure_router(mac_router_cfg(true));

        // Scrolling is a local view action
        let j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(instance.handle_key(&j), KeyOutcome::Handled);
        assert_eq!(log.lock().scrolled, vec![1]);

        // Unrecognized Normal-mode keys are swallowed with no effects
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(instance.handle_key(&q), KeyOutcome::Handled);
        assert_eq!(log.lock().scrolled, vec![1]);

        // Reserved app shortcuts bubble
        let new_tab = KeyEvent::new(KeyCode::Char('t'), KeyModifiers::SUPER);
        assert_eq!(instance.handle_key(&new_tab), KeyOutcome::NotHandled);

        // Mode entry flips the router even with no session attached
        let i = KeyEvent::new(KeyCode::Char('i'), KeyModifiers::NONE);
        assert_eq!(instance.handle_key(&i), KeyOutcome::Handled);
        assert_eq!(instance.mode(), Mode::Insert);
    }

    #[test]
    fn copy_on_select_writes_clipboard() {
        let manager = Arc::new(SessionManager::new());
        let view = MockView::new(80, 24);
        view.log.lock().selection = Some("picked text".to_string());
        let clipboard = RecordingClipboard::default();
        let contents = Arc::clone(&clipboard.contents);
        let settings = Settings {
            copy_on_select: true,
            ..Settings::default()
        };
        let mut instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-1"),
            &settings,
            InstanceHooks::default(),
            Box::new(clipboard),
        );

        instance.handle_selection_change();
        assert_eq!(contents.lock().as_deref(), Some("picked text"));
    }

    #[test]
    fn copy_shortcut_without_selection_passes_through() {
        let manager = Arc::new(SessionManager::new());
        let view = MockView::new(80, 24);
        let mut instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-1"),
            &vim_settings(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );
        instance.configure_router(mac_router_cfg(true));

        let copy = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::SUPER);
        assert_eq!(instance.handle_key(&copy), KeyOutcome::PassThrough);
    }

    #[test]
    fn chord_scroll_to_top_applies_once() {
        let manager = Arc::new(SessionManager::new());
        let view = MockView::new(80, 24);
        let log = Arc::clone(&view.log);
        let mut instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-1"),
            &vim_settings(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );
        instance.configure_router(mac_router_cfg(true));

        let g = KeyEvent::new(KeyCode::Char('g'), KeyModifiers::NONE);
        instance.handle_key(&g);
        instance.handle_key(&g);
        assert_eq!(log.lock().to_top, 1);
    }

    #[test]
    fn half_page_scroll_uses_view_rows() {
        let manager = Arc::new(SessionManager::new());
        let view = MockView::new(80, 24);
        let log = Arc::clone(&view.log);
        let mut instance = TerminalInstance::with_clipboard(
            manager,
            view,
            TabId::new("tab-1"),
            &vim_settings(),
            InstanceHooks::default(),
            Box::new(RecordingClipboard::default()),
        );
        instance.configure_router(mac_router_cfg(true));

        let down = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        let up = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        instance.handle_key(&down);
        instance.handle_key(&up);
        assert_eq!(log.lock().scrolled, vec![12, -12]);
    }
}
