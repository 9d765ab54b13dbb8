//! ptyhub demo runner
//!
//! Hosts a single [`TerminalInstance`] on the current terminal: raw stdout
//! is the view, crossterm events feed the router, and reserved shortcuts
//! quit. This is a thin harness around the library, not a multiplexer.

use std::env;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ptyhub::{
    InstanceHooks, KeyOutcome, SessionManager, Settings, TabId, TerminalInstance, TerminalView,
};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Demo invocation options.
struct Options {
    shell: Option<String>,
    vim_mode: bool,
    normal_start: bool,
    cwd: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            shell: None,
            vim_mode: false,
            normal_start: false,
            cwd: None,
        }
    }
}

fn print_version() {
    eprintln!("ptyhub {}", VERSION);
}

fn print_help() {
    eprintln!("ptyhub {} - terminal session orchestration demo", VERSION);
    eprintln!();
    eprintln!("Usage: ptyhub [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell command (default: from config or $SHELL)");
    eprintln!("  -d, --dir <PATH>      Working directory for the session");
    eprintln!("  --vim                 Enable modal (vim-style) input");
    eprintln!("  --normal              Start the router in Normal mode (implies --vim)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Modal input (with --vim): Esc enters Normal mode; i/a/o return to");
    eprintln!("Insert. Normal mode scrolls with j/k, gg/G, Ctrl+D/U.");
    eprintln!();
    eprintln!("Configuration: ~/.ptyhub/config.toml");
    eprintln!("Exit: type 'exit' in the shell");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing shell argument".to_string());
                }
                options.shell = Some(args[i].clone());
            }
            "-d" | "--dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing directory argument".to_string());
                }
                options.cwd = Some(args[i].clone());
            }
            "--vim" => {
                options.vim_mode = true;
            }
            "--normal" => {
                options.vim_mode = true;
                options.normal_start = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging() {
    let log_path = ptyhub::config::home_dir()
        .map(|h| h.join(".ptyhub").join("ptyhub.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("ptyhub.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// View backed by the hosting terminal. Scrollback and selection belong to
/// the host terminal, so those operations are either forwarded as escape
/// sequences or unavailable.
struct StdoutView;

impl TerminalView for StdoutView {
    fn write(&mut self, text: &str) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn clear(&mut self) {
        self.write("\x1b[2J\x1b[H");
    }

    fn select_all(&mut self) {}

    fn has_selection(&self) -> bool {
        false
    }

    fn selection(&self) -> Option<String> {
        None
    }

    fn scroll_lines(&mut self, _lines: i32) {}

    fn scroll_to_top(&mut self) {}

    fn scroll_to_bottom(&mut self) {}

    fn rows(&self) -> u16 {
        terminal::size().map(|(_, rows)| rows).unwrap_or(24)
    }

    fn cols(&self) -> u16 {
        terminal::size().map(|(cols, _)| cols).unwrap_or(80)
    }
}

/// Encode a key event as shell input bytes.
fn encode_key(event: &KeyEvent) -> Option<String> {
    let mods = event.modifiers;
    let ctrl = mods.contains(KeyModifiers::CONTROL);
    let alt = mods.contains(KeyModifiers::ALT);

    match event.code {
        KeyCode::Char(ch) => {
            if ctrl && !alt {
                if ch.is_ascii_alphabetic() {
                    let code = (ch.to_ascii_lowercase() as u8) - b'a' + 1;
                    return Some((code as char).to_string());
                }
                match ch {
                    '@' | ' ' => return Some("\x00".to_string()),
                    '[' => return Some("\x1b".to_string()),
                    '\\' => return Some("\x1c".to_string()),
                    ']' => return Some("\x1d".to_string()),
                    _ => {}
                }
            }
            if alt {
                return Some(format!("\x1b{}", ch));
            }
            Some(ch.to_string())
        }
        KeyCode::Enter => Some("\r".to_string()),
        KeyCode::Backspace => Some(if alt { "\x1b\x7f" } else { "\x7f" }.to_string()),
        KeyCode::Tab => Some("\t".to_string()),
        KeyCode::Esc => Some("\x1b".to_string()),
        KeyCode::Up => Some("\x1b[A".to_string()),
        KeyCode::Down => Some("\x1b[B".to_string()),
        KeyCode::Right => Some("\x1b[C".to_string()),
        KeyCode::Left => Some("\x1b[D".to_string()),
        KeyCode::Home => Some("\x1b[H".to_string()),
        KeyCode::End => Some("\x1b[F".to_string()),
        KeyCode::PageUp => Some("\x1b[5~".to_string()),
        KeyCode::PageDown => Some("\x1b[6~".to_string()),
        KeyCode::Delete => Some("\x1b[3~".to_string()),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("ptyhub demo starting");

    let mut settings = Settings::load();
    if let Some(shell) = options.shell {
        settings.shell = Some(shell);
    }
    if options.vim_mode {
        settings.vim_mode = true;
    }
    if options.normal_start {
        settings.initial_mode = ptyhub::Mode::Normal;
    }

    let manager = Arc::new(SessionManager::with_shell(settings.shell.clone()));

    let exited = Arc::new(AtomicBool::new(false));
    let exited_flag = Arc::clone(&exited);
    let hooks = InstanceHooks {
        on_exit: Some(Box::new(move || {
            exited_flag.store(true, Ordering::SeqCst);
        })),
        on_title_change: Some(Box::new(|title| {
            print!("\x1b]0;{}\x07", title);
            let _ = std::io::stdout().flush();
        })),
        ..InstanceHooks::default()
    };

    let mut instance = TerminalInstance::new(
        Arc::clone(&manager),
        StdoutView,
        TabId::new("demo"),
        &settings,
        hooks,
    );

    terminal::enable_raw_mode()?;
    instance.mount(options.cwd);

    let result = run_event_loop(&mut instance, &exited);

    instance.unmount();
    terminal::disable_raw_mode()?;
    println!();
    info!("ptyhub demo exiting");
    result
}

fn run_event_loop(
    instance: &mut TerminalInstance<StdoutView>,
    exited: &AtomicBool,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(25);

    loop {
        if exited.load(Ordering::SeqCst) || instance.ended() {
            info!("session ended");
            break;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key_event) => {
                if key_event.kind == KeyEventKind::Release {
                    continue;
                }
                match instance.handle_key(&key_event) {
                    KeyOutcome::PassThrough => {
                        if let Some(bytes) = encode_key(&key_event) {
                            instance.handle_view_data(&bytes);
                        }
                    }
                    KeyOutcome::NotHandled => {
                        // The only app shortcut the demo implements is quit
                        if key_event.code == KeyCode::Char('w') {
                            break;
                        }
                    }
                    KeyOutcome::Handled => {}
                }
            }
            Event::Resize(cols, rows) => {
                instance.handle_view_resize(cols, rows);
            }
            Event::Paste(text) => {
                instance.handle_view_data(&text);
            }
            _ => {}
        }
    }

    Ok(())
}
