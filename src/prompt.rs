use crate::orchestrator::Mode;
use crate::shared::atomic_write_file;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompt file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write prompt file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt content must be non-empty")]
    EmptyContent,
}

/// Header inserted above the immutable rules. The rules always come after
/// the mutable prompt so they win on conflicting instructions.
pub const FIXED_RULES_SEPARATOR: &str =
    "\n\n--- CRITICAL RULES AND TOOLS (DO NOT MODIFY BELOW) ---\n\n";
pub const USER_REQUEST_SEPARATOR: &str = "\n\n--- USER REQUEST ---\n\n";

/// Owns the two halves of the system prompt: fixed rules loaded once for
/// the store's lifetime, and a mutable prompt backed by a file with an
/// in-memory cache. Writes are whole-file replacements followed by a cache
/// update, so a reader never sees a partially written value.
#[derive(Debug)]
pub struct PromptStore {
    prompt_path: PathBuf,
    fixed_rules: String,
    cached_prompt: Mutex<String>,
    subscribers: Mutex<Vec<Sender<()>>>,
}

impl PromptStore {
    /// Reads both prompt files. A missing mutable prompt file starts the
    /// cache empty; missing rules are a hard error because they are the
    /// part the agent must never operate without.
    pub fn open(rules_path: &Path, prompt_path: &Path) -> Result<Self, PromptError> {
        let rules = fs::read_to_string(rules_path).map_err(|source| PromptError::Read {
            path: rules_path.display().to_string(),
            source,
        })?;
        let prompt = match fs::read_to_string(prompt_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(PromptError::Read {
                    path: prompt_path.display().to_string(),
                    source,
                })
            }
        };

        Ok(Self {
            prompt_path: prompt_path.to_path_buf(),
            fixed_rules: format!("{FIXED_RULES_SEPARATOR}{rules}"),
            cached_prompt: Mutex::new(prompt),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Latest committed mutable prompt text.
    pub fn prompt_content(&self) -> String {
        self.cached_prompt
            .lock()
            .map(|cached| cached.clone())
            .unwrap_or_default()
    }

    /// Final instruction text for a structured-mode exchange. Chatting gets
    /// no system text at all.
    pub fn compose(&self, mode: Mode) -> String {
        if mode == Mode::Chatting {
            return String::new();
        }
        let mut composed = self.prompt_content();
        composed.push_str(&self.fixed_rules);
        composed.push_str(USER_REQUEST_SEPARATOR);
        composed
    }

    /// Replaces the mutable prompt: persist first, then update the cache,
    /// then wake subscribers. The fixed rules are untouched by design.
    pub fn set_prompt(&self, content: &str) -> Result<(), PromptError> {
        if content.is_empty() {
            return Err(PromptError::EmptyContent);
        }

        if let Some(parent) = self.prompt_path.parent() {
            fs::create_dir_all(parent).map_err(|source| PromptError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        atomic_write_file(&self.prompt_path, content.as_bytes()).map_err(|source| {
            PromptError::Write {
                path: self.prompt_path.display().to_string(),
                source,
            }
        })?;

        if let Ok(mut cached) = self.cached_prompt.lock() {
            *cached = content.to_string();
        }
        self.notify_subscribers();
        Ok(())
    }

    /// Change notifications, one `()` per committed prompt update. Dropped
    /// receivers are pruned on the next notification.
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    fn notify_subscribers(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(()).is_ok());
        }
    }
}
