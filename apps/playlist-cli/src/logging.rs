//! Tracing setup and per-session log files.
//!
//! Human-readable events go to stderr. When the command operates on a named
//! session, every event is also written as JSON to
//! `<root>/.playlist/logs/<session>/<YYYYMMDD_HHMMSS>.log`, where `<root>` is
//! the directory holding the session file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log files untouched for longer than this are pruned on startup.
const RETENTION: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Used for stderr when `RUST_LOG` is unset.
const DEFAULT_CONSOLE_FILTER: &str = "warn";

/// Used for the JSON file when `RUST_LOG` is unset.
const DEFAULT_FILE_FILTER: &str = "playlist=debug,playlist_core=debug";

/// Where session logs live under a root directory.
#[derive(Debug, Clone)]
struct LogLayout {
    logs_dir: PathBuf,
}

impl LogLayout {
    fn new(root: &Path) -> Self {
        Self {
            logs_dir: root.join(".playlist").join("logs"),
        }
    }

    fn session_dir(&self, session: &str) -> PathBuf {
        self.logs_dir.join(session)
    }

    fn file_for(&self, session: &str, at: SystemTime) -> PathBuf {
        self.session_dir(session)
            .join(format!("{}.log", utc_stamp(at)))
    }
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit so the file writer flushes.
///
/// # Errors
///
/// Returns an error if the session log directory or file cannot be created.
pub fn init_tracing(root: &Path, session: Option<&str>) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter_or(DEFAULT_CONSOLE_FILTER));

    let Some(session) = session else {
        tracing_subscriber::registry().with(console).init();
        return Ok(None);
    };

    let (writer, guard) = open_session_log(&LogLayout::new(root), session)?;
    tracing_subscriber::registry()
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(filter_or(DEFAULT_FILE_FILTER)),
        )
        .init();

    Ok(Some(guard))
}

fn filter_or(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn open_session_log(layout: &LogLayout, session: &str) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = layout.session_dir(session);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let path = layout.file_for(session, SystemTime::now());
    let file = fs::File::create(&path)
        .with_context(|| format!("failed to create log file: {}", path.display()))?;

    Ok(tracing_appender::non_blocking(file))
}

/// Prune stale `.log` files under `<root>/.playlist/logs` and drop emptied
/// session directories.
///
/// Runs before tracing is installed, so problems are reported on stderr and
/// never abort the command.
pub fn cleanup_old_logs(root: &Path) {
    let layout = LogLayout::new(root);
    if !layout.logs_dir.is_dir() {
        return;
    }

    let Some(cutoff) = SystemTime::now().checked_sub(RETENTION) else {
        return;
    };
    prune(&layout.logs_dir, cutoff);
}

/// Returns `true` if `dir` is empty after pruning.
fn prune(dir: &Path, cutoff: SystemTime) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("warning: cannot read {}: {e}", dir.display());
            return false;
        }
    };

    let mut kept = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            if prune(&path, cutoff) && fs::remove_dir(&path).is_ok() {
                continue;
            }
            kept += 1;
            continue;
        }

        if is_stale_log(&path, cutoff) {
            match fs::remove_file(&path) {
                Ok(()) => continue,
                Err(e) => eprintln!("warning: cannot remove {}: {e}", path.display()),
            }
        }
        kept += 1;
    }
    kept == 0
}

fn is_stale_log(path: &Path, cutoff: SystemTime) -> bool {
    if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
        return false;
    }
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => modified < cutoff,
        Err(e) => {
            eprintln!("warning: cannot stat {}: {e}", path.display());
            false
        }
    }
}

/// `YYYYMMDD_HHMMSS` in UTC.
fn utc_stamp(at: SystemTime) -> String {
    let secs = at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let (year, month, day) = civil_date(secs / 86_400);
    let rem = secs % 86_400;
    format!(
        "{year:04}{month:02}{day:02}_{:02}{:02}{:02}",
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

/// Gregorian date for a count of days since 1970-01-01.
///
/// Hinnant's `civil_from_days`, with years counted from March 1st so the
/// leap day falls at the end.
fn civil_date(days: u64) -> (i64, u32, u32) {
    let z = days as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
