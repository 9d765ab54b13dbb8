//! PTY wrapper
//!
//! This module provides a thin wrapper around `portable-pty` for spawning
//! a shell attached to a pseudo-terminal and driving its I/O.

use std::io::{self, Read, Write};
use std::path::Path;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open pty: {0}")]
    Open(String),

    #[error("Failed to spawn shell: {0}")]
    Spawn(String),

    #[error("Failed to resize pty: {0}")]
    Resize(String),

    #[error("Failed to write to pty: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// A spawned shell attached to a pseudo-terminal.
///
/// Writing goes through the master writer; reading happens on a separate
/// reader handle obtained at spawn time so a background thread can own it.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PtyHandle {
    /// Open a pty of the given size and spawn a shell in it.
    ///
    /// `shell` overrides the platform default program. `cwd` falls back to
    /// the home directory when absent.
    pub fn spawn(
        cols: u16,
        rows: u16,
        cwd: Option<&Path>,
        shell: Option<&str>,
    ) -> Result<(Self, Box<dyn Read + Send>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(pty_size(cols, rows))
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = match shell {
            Some(prog) => CommandBuilder::new(prog),
            None => CommandBuilder::new_default_prog(),
        };
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        // Unicode support in vim/TUI apps needs a UTF-8 locale
        if std::env::var("LANG").is_err() {
            cmd.env("LANG", "en_US.UTF-8");
        }
        match cwd {
            Some(dir) => cmd.cwd(dir),
            None => {
                if let Some(home) = crate::config::home_dir() {
                    cmd.cwd(home);
                }
            }
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        Ok((
            Self {
                master: pair.master,
                writer,
                child,
            },
            reader,
        ))
    }

    /// Write bytes to the shell's input.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).map_err(PtyError::Write)?;
        self.writer.flush().map_err(PtyError::Write)?;
        Ok(())
    }

    /// Resize the pty. Safe to call with unchanged dimensions.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(pty_size(cols, rows))
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    /// Terminate the child process. The reader handle sees EOF afterwards.
    pub fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn spawn_and_kill_shell() {
        let spawned = PtyHandle::spawn(80, 24, None, Some("/bin/sh"));
        assert!(spawned.is_ok());
        let (mut pty, _reader) = spawned.unwrap();
        assert!(pty.write(b"true\n").is_ok());
        assert!(pty.resize(100, 30).is_ok());
        pty.kill();
    }

    #[test]
    #[cfg(unix)]
    fn spawn_missing_shell_fails() {
        let spawned = PtyHandle::spawn(80, 24, None, Some("/nonexistent/shell"));
        assert!(spawned.is_err());
    }
}
