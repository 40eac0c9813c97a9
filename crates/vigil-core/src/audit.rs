use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::files::{change_owner, Ownership, CONFIG_FILE_MODE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Append-only audit trail of configuration changes.
///
/// Every entry is also mirrored to `tracing`. Writing the file is best effort:
/// a failure is reported as a warning and never interrupts the caller.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    ownership: Ownership,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, ownership: Ownership) -> Self {
        Self {
            path: path.into(),
            ownership,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_log(&self, message: impl fmt::Display, level: LogLevel, tag: &str) {
        let message = message.to_string();
        match level {
            LogLevel::Debug => tracing::debug!(tag, "{message}"),
            LogLevel::Info => tracing::info!(tag, "{message}"),
            LogLevel::Warning => tracing::warn!(tag, "{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!(tag, "{message}"),
        }

        if let Err(e) = self.append(&message, level, tag) {
            tracing::warn!("Failed to write audit log {}: {e:#}", self.path.display());
        }
    }

    fn append(&self, message: &str, level: LogLevel, tag: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = !self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open '{}'", self.path.display()))?;
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z");
        // One entry per line, even if an error message spans several.
        let message = message.replace('\n', " ");
        writeln!(file, "{timestamp} {level} {tag} {message}")?;

        if is_new {
            change_owner(&self.path, &self.ownership, CONFIG_FILE_MODE)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn test_create_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("logs").join("vigil.log"), Ownership::default());

        log.create_log("Agent configuration created", LogLevel::Info, "__create");
        log.create_log("Telegram Chat ID modified.", LogLevel::Warning, "_modify");

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("INFO __create Agent configuration created"));
        assert!(lines[1].ends_with("WARNING _modify Telegram Chat ID modified."));
    }

    #[test]
    fn test_multiline_message_stays_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("vigil.log"), Ownership::default());
        log.create_log("first\nsecond", LogLevel::Error, "_tag");

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("ERROR _tag first second"));
    }

    #[test]
    fn test_new_log_gets_config_mode() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("vigil.log"), Ownership::default());
        log.create_log("x", LogLevel::Debug, "_tag");

        let mode = std::fs::metadata(log.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_unwritable_log_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be.
        let log = AuditLog::new(dir.path(), Ownership::default());
        log.create_log("ignored", LogLevel::Info, "_tag");
    }

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Warning.to_string(), "WARNING");
        assert_eq!(LogLevel::Critical.to_string(), "CRITICAL");
    }
}
