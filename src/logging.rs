//! Console and rolling-file logging for programs built on this crate

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when `RUST_LOG` is unset: this crate at info, the Discord IPC
/// chatter and everything else at warn
pub const DEFAULT_FILTER: &str = "warn,discord_party=info";

/// Where and how much to log
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub app_name: String,
    /// Log directory; `<data_local_dir>/<app_name>/logs` when unset
    pub directory: Option<PathBuf>,
    /// Days of rotated files to keep
    pub keep_days: u64,
    /// Fallback filter when `RUST_LOG` is unset
    pub filter: String,
}

impl LogOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            directory: None,
            keep_days: 7,
            filter: DEFAULT_FILTER.to_string(),
        }
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn keep_days(mut self, keep_days: u64) -> Self {
        self.keep_days = keep_days;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn log_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(&self.app_name)
                .join("logs"),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.log", self.app_name)
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

/// Install console and daily-rolling file logging.
///
/// Keep the returned guard alive for as long as logs should be flushed.
/// Installing twice (tests, a host that already set a subscriber) is not an error.
pub fn init_logging(options: &LogOptions) -> WorkerGuard {
    let log_dir = options.log_directory();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {:?}: {}", log_dir, e);
    }
    let file_name = options.file_name();

    let file_appender = tracing_appender::rolling::daily(&log_dir, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.filter));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_line_number(true)
        .with_writer(file_writer);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().compact())
        .with(file_layer)
        .try_init()
    {
        tracing::debug!("Logging already initialized: {}", e);
    }

    tracing::info!(
        "{} logging to {} (discord-party {})",
        options.app_name,
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    let removed = cleanup_old_logs(&log_dir, &file_name, options.keep_days);
    if removed > 0 {
        tracing::info!("Removed {} old log files", removed);
    }

    guard
}

/// Remove rotated copies of `file_name` last written more than `keep_days`
/// ago. The live file is never touched. Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, file_name: &str, keep_days: u64) -> usize {
    let cutoff = SystemTime::now() - Duration::from_secs(keep_days * 24 * 60 * 60);

    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot clean up logs in {:?}: {}", log_dir, e);
            return 0;
        }
    };

    let rotated = entries.flatten().filter(|entry| {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| name != file_name && name.starts_with(file_name))
    });

    let mut removed = 0;
    for entry in rotated {
        let stale = entry
            .metadata()
            .and_then(|m| m.modified())
            .is_ok_and(|modified| modified < cutoff);
        if !stale {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to remove {:?}: {}", entry.path(), e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    #[test]
    fn test_cleanup_counts_removed_rotations() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("party.log");
        let rotated = dir.path().join("party.log.2026-10-17");
        let older = dir.path().join("party.log.2026-10-16");
        let other = dir.path().join("notes.txt");
        for path in [&live, &rotated, &older, &other] {
            File::create(path).unwrap();
        }

        assert_eq!(cleanup_old_logs(dir.path(), "party.log", 7), 0);
        assert!(rotated.exists());

        // With no days kept every rotation is stale
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cleanup_old_logs(dir.path(), "party.log", 0), 2);
        assert!(live.exists());
        assert!(!rotated.exists());
        assert!(!older.exists());
        assert!(other.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_cleanup_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("gone"), "party.log", 0), 0);
    }

    #[test]
    fn test_log_options() {
        let options = LogOptions::default();
        assert_eq!(options.app_name, "discord-party");
        assert_eq!(options.file_name(), "discord-party.log");
        assert_eq!(options.filter, DEFAULT_FILTER);
        assert!(options.log_directory().ends_with("discord-party/logs"));

        let dir = tempfile::tempdir().unwrap();
        let options = LogOptions::new("lobby")
            .directory(dir.path())
            .keep_days(1)
            .filter("debug");
        assert_eq!(options.log_directory(), dir.path());
        assert_eq!(options.file_name(), "lobby.log");
        assert_eq!(options.keep_days, 1);
    }
}
