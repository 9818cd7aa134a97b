use chrono::{SecondsFormat, Utc};
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub event: String,
    pub message: String,
}

/// Log sink shared between the caller threads and the broker's polling
/// thread. Entries produced on the background thread are queued here and
/// drained on whichever thread owns the user-visible surface; every entry
/// is also appended to the log file immediately.
#[derive(Debug)]
pub struct LogQueue {
    file_path: Option<PathBuf>,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogQueue {
    pub fn new(file_path: Option<PathBuf>) -> Self {
        Self {
            file_path,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, level: LogLevel, event: &str, message: &str) {
        self.append_to_file(level, event, message);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(LogEntry {
                level,
                event: event.to_string(),
                message: message.to_string(),
            });
        }
    }

    pub fn drain(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(mut entries) => entries.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn append_to_file(&self, level: LogLevel, event: &str, message: &str) {
        let Some(path) = &self.file_path else {
            return;
        };
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "level": level.as_str(),
            "event": event,
            "message": message,
        });
        let Ok(line) = serde_json::to_string(&payload) else {
            return;
        };
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };
        let _ = writeln!(file, "{line}");
    }
}
