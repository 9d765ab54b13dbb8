//! Session management
//!
//! Owns the set of live PTY sessions, addressed by an opaque [`SessionId`].
//! Each session runs a background reader thread that re-chunks shell output
//! on UTF-8 boundaries and hands it to typed output/exit subscribers.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::pty::{PtyError, PtyHandle};

/// Opaque identifier for one live session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
pub enum SessionCreateError {
    #[error("Invalid terminal dimensions {cols}x{rows} (must be 1-500)")]
    InvalidDimensions { cols: u16, rows: u16 },

    #[error("Working directory is not usable: {0}")]
    BadCwd(String),

    #[error(transparent)]
    Pty(#[from] PtyError),
}

type OutputFn = Box<dyn FnMut(&str) + Send>;
type ExitFn = Box<dyn FnMut() + Send>;

/// Subscriber lists for one session. Dispatch and (un)registration are
/// serialized by the enclosing mutex, so a completed `cancel()` guarantees
/// the callback will not fire again.
#[derive(Default)]
struct Subscribers {
    next_token: u64,
    output: Vec<(u64, OutputFn)>,
    exit: Vec<(u64, ExitFn)>,
    exited: bool,
}

impl Subscribers {
    fn dispatch_output(&mut self, chunk: &str) {
        if self.exited {
            return;
        }
        for (_, cb) in &mut self.output {
            cb(chunk);
        }
    }

    /// Fires exit callbacks at most once, then drops all subscribers so no
    /// output can be delivered after exit.
    fn dispatch_exit(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        for (_, cb) in &mut self.exit {
            cb();
        }
        self.output.clear();
        self.exit.clear();
    }
}

enum SubscriptionKind {
    Output,
    Exit,
}

/// Unsubscribe handle returned by [`SessionManager::subscribe_output`] and
/// [`SessionManager::subscribe_exit`].
pub struct Subscription {
    subs: Arc<Mutex<Subscribers>>,
    token: u64,
    kind: SubscriptionKind,
}

impl Subscription {
    /// Remove the callback. Synchronous: once this returns, the callback
    /// will never be invoked again.
    pub fn cancel(self) {
        let mut subs = self.subs.lock();
        match self.kind {
            SubscriptionKind::Output => subs.output.retain(|(t, _)| *t != self.token),
            SubscriptionKind::Exit => subs.exit.retain(|(t, _)| *t != self.token),
        }
    }
}

struct SessionEntry {
    pty: PtyHandle,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        self.pty.kill();
    }
}

/// Create/write/resize/close primitives over the live session table.
///
/// `write`, `resize` and `close` are fire-and-forget: failures are logged,
/// not surfaced. `close` is idempotent.
pub struct SessionManager {
    shell: Option<String>,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_shell(None)
    }

    /// Use `shell` instead of the platform default program for new sessions.
    pub fn with_shell(shell: Option<String>) -> Self {
        Self {
            shell,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a shell in a new pty and start its reader thread.
    pub fn create(
        &self,
        cols: u16,
        rows: u16,
        cwd: Option<&str>,
    ) -> Result<SessionId, SessionCreateError> {
        validate_dimensions(cols, rows)?;
        let cwd = match cwd {
            Some(dir) if !dir.is_empty() => Some(validate_cwd(dir)?),
            _ => None,
        };

        let (pty, reader) =
            PtyHandle::spawn(cols, rows, cwd.as_deref(), self.shell.as_deref())?;

        let id = SessionId::generate();
        let subscribers = Arc::new(Mutex::new(Subscribers::default()));

        let thread_subs = Arc::clone(&subscribers);
        let thread_id = id.clone();
        thread::Builder::new()
            .name(format!("pty-reader-{}", id))
            .spawn(move || run_reader(reader, thread_subs, thread_id))
            .map_err(|e| SessionCreateError::Pty(PtyError::Spawn(e.to_string())))?;

        info!(session = %id, cols, rows, "session created");
        self.sessions
            .lock()
            .insert(id.clone(), SessionEntry { pty, subscribers });
        Ok(id)
    }

    /// Write input to the shell. No backpressure, no failure signal.
    pub fn write(&self, id: &SessionId, data: &str) {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(id) {
            Some(entry) => {
                if let Err(e) = entry.pty.write(data.as_bytes()) {
                    warn!(session = %id, error = %e, "pty write failed");
                }
            }
            None => debug!(session = %id, "write to unknown session dropped"),
        }
    }

    /// Resize the session's pty. Idempotent.
    pub fn resize(&self, id: &SessionId, cols: u16, rows: u16) {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(id) {
            Some(entry) => {
                if let Err(e) = entry.pty.resize(cols, rows) {
                    warn!(session = %id, error = %e, "pty resize failed");
                }
            }
            None => debug!(session = %id, "resize of unknown session dropped"),
        }
    }

    /// Terminate the session. A no-op for unknown or already-closed ids.
    pub fn close(&self, id: &SessionId) {
        let entry = self.sessions.lock().remove(id);
        match entry {
            Some(entry) => {
                info!(session = %id, "session closed");
                drop(entry);
            }
            None => debug!(session = %id, "close of unknown session ignored"),
        }
    }

    /// Register an output callback. Chunks arrive in order, at least once,
    /// and never after the exit notification. Returns `None` for an unknown
    /// session.
    pub fn subscribe_output(
        &self,
        id: &SessionId,
        cb: impl FnMut(&str) + Send + 'static,
    ) -> Option<Subscription> {
        let sessions = self.sessions.lock();
        let entry = sessions.get(id)?;
        let subs = Arc::clone(&entry.subscribers);
        let mut guard = subs.lock();
        let token = guard.next_token;
        guard.next_token += 1;
        guard.output.push((token, Box::new(cb)));
        drop(guard);
        Some(Subscription {
            subs,
            token,
            kind: SubscriptionKind::Output,
        })
    }

    /// Register an exit callback. Fires at most once per session.
    pub fn subscribe_exit(
        &self,
        id: &SessionId,
        cb: impl FnMut() + Send + 'static,
    ) -> Option<Subscription> {
        let sessions = self.sessions.lock();
        let entry = sessions.get(id)?;
        let subs = Arc::clone(&entry.subscribers);
        let mut guard = subs.lock();
        let token = guard.next_token;
        guard.next_token += 1;
        guard.exit.push((token, Box::new(cb)));
        drop(guard);
        Some(Subscription {
            subs,
            token,
            kind: SubscriptionKind::Exit,
        })
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

fn validate_dimensions(cols: u16, rows: u16) -> Result<(), SessionCreateError> {
    if cols == 0 || cols > 500 || rows == 0 || rows > 500 {
        return Err(SessionCreateError::InvalidDimensions { cols, rows });
    }
    Ok(())
}

/// An explicit cwd must be an absolute path naming an existing directory.
fn validate_cwd(cwd: &str) -> Result<std::path::PathBuf, SessionCreateError> {
    let path = Path::new(cwd);
    if !path.is_absolute() {
        return Err(SessionCreateError::BadCwd(format!(
            "{} is not an absolute path",
            cwd
        )));
    }
    let canonical = path
        .canonicalize()
        .map_err(|_| SessionCreateError::BadCwd(format!("{} does not exist", cwd)))?;
    if !canonical.is_dir() {
        return Err(SessionCreateError::BadCwd(format!(
            "{} is not a directory",
            cwd
        )));
    }
    Ok(canonical)
}

/// Reader loop: re-chunk pty output on UTF-8 boundaries and dispatch it.
/// Incomplete trailing sequences (at most 4 bytes) are carried over to the
/// next read; longer invalid tails are delivered lossily.
fn run_reader(mut reader: Box<dyn Read + Send>, subs: Arc<Mutex<Subscribers>>, id: SessionId) {
    let mut buf = [0u8; 16384];
    let mut remainder: Vec<u8> = Vec::new();

    loop {
        match reader.read(&mut buf) {
            Ok(0) | Err(_) => {
                let mut guard = subs.lock();
                if !remainder.is_empty() {
                    let tail = String::from_utf8_lossy(&remainder).to_string();
                    guard.dispatch_output(&tail);
                }
                guard.dispatch_exit();
                debug!(session = %id, "reader finished");
                break;
            }
            Ok(n) => {
                let chunk: &[u8] = if remainder.is_empty() {
                    &buf[..n]
                } else {
                    remainder.extend_from_slice(&buf[..n]);
                    remainder.as_slice()
                };

                match std::str::from_utf8(chunk) {
                    Ok(s) => {
                        subs.lock().dispatch_output(s);
                        remainder = Vec::new();
                    }
                    Err(e) => {
                        let valid_up_to = e.valid_up_to();
                        let mut guard = subs.lock();
                        if valid_up_to > 0 {
                            // Bytes up to valid_up_to are known-valid UTF-8
                            let valid = unsafe {
                                std::str::from_utf8_unchecked(&chunk[..valid_up_to])
                            };
                            guard.dispatch_output(valid);
                        }
                        let tail = chunk[valid_up_to..].to_vec();
                        if tail.len() > 4 {
                            // Longer than any UTF-8 sequence: not an
                            // incomplete tail, flush it lossily
                            let lossy = String::from_utf8_lossy(&tail).to_string();
                            guard.dispatch_output(&lossy);
                            remainder = Vec::new();
                        } else {
                            remainder = tail;
                        }
                    }
                }
            }
        }
    }
}
