pub mod files;
pub mod launcher;

pub use files::{
    is_process_error, parse_response_id, request_file_name, response_file_name, sweep_stale_files,
    PROCESS_ERROR_PREFIX,
};
pub use launcher::AgentLauncher;

use crate::config::TransportSettings;
use crate::shared::{atomic_write_file, LogLevel, LogQueue};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("transport directory `{path}` does not exist")]
    MissingTransportDir { path: String },
    #[error("transport io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request {id} timed out after {after:?} with no response")]
    Timeout { id: u64, after: Duration },
    #[error("broker shut down before request {id} resolved")]
    Disconnected { id: u64 },
}

/// A correlated in-flight request. Exactly one response body will ever
/// arrive on the channel; the id from the response file name is the sole
/// correlation key.
#[derive(Debug)]
pub struct Delivery {
    id: u64,
    receiver: Receiver<String>,
    timeout: Option<Duration>,
}

impl Delivery {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Blocks until the correlated response arrives. With no configured
    /// timeout this waits forever, matching the legacy behavior.
    pub fn wait(self) -> Result<String, BrokerError> {
        match self.timeout {
            Some(after) => self.receiver.recv_timeout(after).map_err(|err| match err {
                RecvTimeoutError::Timeout => BrokerError::Timeout { id: self.id, after },
                RecvTimeoutError::Disconnected => BrokerError::Disconnected { id: self.id },
            }),
            None => self
                .receiver
                .recv()
                .map_err(|_| BrokerError::Disconnected { id: self.id }),
        }
    }
}

#[derive(Debug)]
struct BrokerShared {
    directory: PathBuf,
    poll_interval: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    request_timeout: Option<Duration>,
    pending: Mutex<HashMap<u64, Sender<String>>>,
    next_id: AtomicU64,
    running: AtomicBool,
    launcher: Option<AgentLauncher>,
    log: Arc<LogQueue>,
}

/// Correlation broker over a drop directory shared with an external
/// process. Requests are files named `message_<id>.txt`; the matching
/// `reponse_<id>.txt` resolves the correlation. One background thread
/// polls for responses; any number of callers may send concurrently.
#[derive(Debug)]
pub struct FileBroker {
    shared: Arc<BrokerShared>,
    poller: Option<JoinHandle<()>>,
}

impl FileBroker {
    /// Verifies the drop directory, sweeps files left over from previous
    /// runs, then starts the polling thread.
    pub fn start(settings: &TransportSettings, log: Arc<LogQueue>) -> Result<Self, BrokerError> {
        if !settings.directory.is_dir() {
            return Err(BrokerError::MissingTransportDir {
                path: settings.directory.display().to_string(),
            });
        }

        match sweep_stale_files(&settings.directory) {
            Ok(0) => {}
            Ok(removed) => log.push(
                LogLevel::Info,
                "broker.sweep",
                &format!("removed {removed} stale transport files"),
            ),
            Err(err) => log.push(
                LogLevel::Warn,
                "broker.sweep",
                &format!("startup sweep failed: {err}"),
            ),
        }

        let shared = Arc::new(BrokerShared {
            directory: settings.directory.clone(),
            poll_interval: settings.poll_interval(),
            retry_attempts: settings.read_retry_attempts,
            retry_delay: settings.read_retry_delay(),
            request_timeout: settings.request_timeout(),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            running: AtomicBool::new(true),
            launcher: settings.launcher.clone().map(AgentLauncher::new),
            log,
        });

        let poller_shared = Arc::clone(&shared);
        let poller = thread::Builder::new()
            .name("dropwire-broker-poll".to_string())
            .spawn(move || poll_loop(&poller_shared))
            .map_err(|source| BrokerError::Io {
                path: settings.directory.display().to_string(),
                source,
            })?;

        Ok(Self {
            shared,
            poller: Some(poller),
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Writes one request file and returns the pending correlation. The id
    /// counter is monotonic for the broker's lifetime and never reused, so
    /// two concurrent senders can never receive each other's payload.
    pub fn send(&self, payload: &str) -> Result<Delivery, BrokerError> {
        if let Some(launcher) = &self.shared.launcher {
            match launcher.ensure_running() {
                Ok(Some(pid)) => self.shared.log.push(
                    LogLevel::Info,
                    "broker.launch",
                    &format!("external agent process started (pid={pid})"),
                ),
                Ok(None) => {}
                // Not fatal: the send still waits on its correlation and
                // times out naturally if the process never appears.
                Err(err) => self
                    .shared
                    .log
                    .push(LogLevel::Warn, "broker.launch", &err.to_string()),
            }
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel();
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.insert(id, tx);
        }

        let request_path = self.shared.directory.join(request_file_name(id));
        if let Err(source) = atomic_write_file(&request_path, payload.as_bytes()) {
            if let Ok(mut pending) = self.shared.pending.lock() {
                pending.remove(&id);
            }
            return Err(BrokerError::Io {
                path: request_path.display().to_string(),
                source,
            });
        }

        self.shared.log.push(
            LogLevel::Info,
            "broker.send",
            &format!("request {id} written"),
        );
        Ok(Delivery {
            id,
            receiver: rx,
            timeout: self.shared.request_timeout,
        })
    }

    /// Stops the polling loop (signal + bounded join) and drops all pending
    /// senders, which resolves outstanding waiters with `Disconnected`.
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.poller.take() {
            let _ = handle.join();
        }
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.clear();
        }
    }
}

impl Drop for FileBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(shared: &BrokerShared) {
    while shared.running.load(Ordering::SeqCst) {
        if let Err(err) = process_visible_responses(shared) {
            shared.log.push(
                LogLevel::Error,
                "broker.poll",
                &format!("response scan failed: {err}"),
            );
        }
        thread::sleep(shared.poll_interval);
    }
}

fn process_visible_responses(shared: &BrokerShared) -> std::io::Result<()> {
    for (id, path) in files::scan_response_files(&shared.directory)? {
        let claimed = shared
            .pending
            .lock()
            .ok()
            .map(|pending| pending.contains_key(&id))
            .unwrap_or(false);

        if !claimed {
            // Orphan: nobody is waiting on this id. Deleting keeps the
            // directory clean and guarantees it can never be misdelivered.
            match files::delete_with_retry(&path, shared.retry_attempts, shared.retry_delay) {
                Ok(()) => shared.log.push(
                    LogLevel::Warn,
                    "broker.orphan",
                    &format!("orphan response {id} deleted"),
                ),
                Err(err) => shared.log.push(
                    LogLevel::Error,
                    "broker.orphan",
                    &format!("could not delete orphan response {id}: {err}"),
                ),
            }
            continue;
        }

        let body = match files::read_with_retry(&path, shared.retry_attempts, shared.retry_delay) {
            Ok(body) => body,
            Err(err) => {
                // The writer may still hold the file; leave it for the
                // next tick rather than dropping the correlation.
                shared.log.push(
                    LogLevel::Warn,
                    "broker.read",
                    &format!("response {id} not readable yet: {err}"),
                );
                continue;
            }
        };

        // Take the entry before resolving so the response can never be
        // delivered twice, then clean the file off disk.
        let sender = shared
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(&id));
        if let Err(err) = files::delete_with_retry(&path, shared.retry_attempts, shared.retry_delay)
        {
            shared.log.push(
                LogLevel::Error,
                "broker.delete",
                &format!("could not delete response {id}: {err}"),
            );
        }
        if let Some(sender) = sender {
            shared.log.push(
                LogLevel::Info,
                "broker.receive",
                &format!("response {id} delivered"),
            );
            // A dropped receiver means the caller gave up waiting.
            let _ = sender.send(body);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        TransportSettings, DEFAULT_READ_RETRY_ATTEMPTS, DEFAULT_READ_RETRY_DELAY_MS,
    };
    use std::fs;
    use tempfile::tempdir;

    fn fast_settings(directory: PathBuf) -> TransportSettings {
        TransportSettings {
            directory,
            poll_interval_ms: 10,
            read_retry_attempts: DEFAULT_READ_RETRY_ATTEMPTS,
            read_retry_delay_ms: DEFAULT_READ_RETRY_DELAY_MS,
            request_timeout_secs: None,
            launcher: None,
        }
    }

    #[test]
    fn start_requires_an_existing_transport_directory() {
        let tmp = tempdir().expect("tempdir");
        let settings = fast_settings(tmp.path().join("missing"));
        let err = FileBroker::start(&settings, Arc::new(LogQueue::new(None)))
            .expect_err("directory is absent");
        assert!(matches!(err, BrokerError::MissingTransportDir { .. }));
    }

    #[test]
    fn start_sweeps_leftover_transport_files() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("message_9.txt"), "stale").expect("write");
        fs::write(tmp.path().join("reponse_9.txt"), "stale").expect("write");

        let _broker = FileBroker::start(
            &fast_settings(tmp.path().to_path_buf()),
            Arc::new(LogQueue::new(None)),
        )
        .expect("start broker");

        assert!(!tmp.path().join("message_9.txt").exists());
        assert!(!tmp.path().join("reponse_9.txt").exists());
    }

    #[test]
    fn send_allocates_strictly_increasing_ids_and_writes_request_files() {
        let tmp = tempdir().expect("tempdir");
        let broker = FileBroker::start(
            &fast_settings(tmp.path().to_path_buf()),
            Arc::new(LogQueue::new(None)),
        )
        .expect("start broker");

        let first = broker.send("one").expect("send one");
        let second = broker.send("two").expect("send two");
        assert!(second.id() > first.id());
        assert_eq!(
            fs::read_to_string(tmp.path().join(request_file_name(first.id()))).expect("read"),
            "one"
        );
    }

    #[test]
    fn shutdown_resolves_outstanding_waiters_as_disconnected() {
        let tmp = tempdir().expect("tempdir");
        let mut broker = FileBroker::start(
            &fast_settings(tmp.path().to_path_buf()),
            Arc::new(LogQueue::new(None)),
        )
        .expect("start broker");

        let delivery = broker.send("never answered").expect("send");
        broker.shutdown();
        assert!(!broker.is_running());
        let err = delivery.wait().expect_err("broker is gone");
        assert!(matches!(err, BrokerError::Disconnected { .. }));
    }

    #[test]
    fn wait_times_out_when_configured_and_no_response_appears() {
        let tmp = tempdir().expect("tempdir");
        let mut settings = fast_settings(tmp.path().to_path_buf());
        settings.request_timeout_secs = Some(1);
        let broker =
            FileBroker::start(&settings, Arc::new(LogQueue::new(None))).expect("start broker");

        let started = std::time::Instant::now();
        let err = broker
            .send("no one is listening")
            .expect("send")
            .wait()
            .expect_err("must time out");
        assert!(matches!(err, BrokerError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
