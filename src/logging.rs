//! Diagnostics for both binaries: `error:`/`warning:` lines on stderr, an opt-in debug
//! log in the temp dir, and `tracing` events as JSON lines next to it.

use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
    time::{SystemTime, UNIX_EPOCH},
};
use tracing_subscriber::fmt::time::UtcTime;

use crate::config::ENV_TRACE_LOG;

const LOG_MAX_BYTES: u64 = 1024 * 1024;
static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static DEBUG_LOG: OnceLock<Mutex<Option<DebugLog>>> = OnceLock::new();
static TRACE_INSTALLED: OnceLock<()> = OnceLock::new();

/// Switches that decide whether the debug log and trace file are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub logs: bool,
    pub no_logs: bool,
}

impl LogSettings {
    pub fn enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    /// Where `tracing` events go; `C2Z_TRACE_LOG` overrides the temp-dir default.
    pub fn trace_log_path(&self) -> PathBuf {
        env::var_os(ENV_TRACE_LOG)
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("c2z_trace.jsonl"))
    }
}

/// Path of the debug log. The previous generation sits next to it as `c2z.log.old`.
pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("c2z.log")
}

/// Size-capped debug log that keeps one rotated generation.
struct DebugLog {
    path: PathBuf,
    file: File,
    cap: u64,
    size: u64,
}

impl DebugLog {
    fn open(path: PathBuf, cap: u64) -> io::Result<Self> {
        let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        if size >= cap {
            rotate(&path)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            cap,
            size,
        })
    }

    fn append(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64;
        if self.size > 0 && self.size + len > self.cap {
            rotate(&self.path)?;
            self.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.size = 0;
        }
        self.file.write_all(line.as_bytes())?;
        self.size += len;
        Ok(())
    }
}

fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".old");
    PathBuf::from(name)
}

fn rotate(path: &Path) -> io::Result<()> {
    match fs::rename(path, rotated_path(path)) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn debug_log() -> &'static Mutex<Option<DebugLog>> {
    DEBUG_LOG.get_or_init(|| Mutex::new(None))
}

/// Apply `settings`: open (or close) the debug log and, the first time logging is
/// enabled, route `tracing` events to the trace file.
pub fn init_logging(settings: LogSettings) {
    let enabled = settings.enabled();
    let log = if enabled {
        DebugLog::open(log_file_path(), LOG_MAX_BYTES).ok()
    } else {
        None
    };
    LOG_ENABLED.store(log.is_some(), Ordering::Relaxed);
    *debug_log()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = log;

    if enabled {
        install_trace_subscriber(&settings.trace_log_path());
    }
}

fn install_trace_subscriber(path: &Path) {
    TRACE_INSTALLED.get_or_init(|| {
        let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(Mutex::new(file))
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Append a timestamped line to the debug log when logging is enabled.
pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let line = format!("[{secs}] {msg}\n");
    let mut guard = debug_log()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let failed = match guard.as_mut() {
        Some(log) => log.append(&line).is_err(),
        None => false,
    };
    if failed {
        *guard = None;
        LOG_ENABLED.store(false, Ordering::Relaxed);
    }
}

/// Print an `error:` line on stderr.
pub fn report_error(msg: &str) {
    log_debug(&format!("error: {msg}"));
    emit_stderr("error", msg);
}

/// Print an `error:` line on stderr with the OS error description appended.
pub fn report_os_error(context: &str, err: &io::Error) {
    report_error(&format!("{context} ({err})"));
}

/// Print a `warning:` line on stderr.
pub fn report_warning(msg: &str) {
    log_debug(&format!("warning: {msg}"));
    emit_stderr("warning", msg);
}

fn emit_stderr(level: &str, msg: &str) {
    let _ = writeln!(io::stderr().lock(), "{level}: {msg}");
}

#[cfg(test)]
pub(crate) fn set_logging_for_tests(enabled: bool) {
    init_logging(LogSettings {
        logs: enabled,
        no_logs: false,
    });
}
