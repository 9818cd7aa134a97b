use crate::config::LauncherSettings;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("failed to launch external agent process: {0}")]
pub struct LaunchError(String);

/// Starts the external agent process on demand, fire-and-forget. The child
/// handle is kept only to probe liveness; the broker never waits on the
/// process and the correlation machinery times out naturally if it never
/// comes up.
#[derive(Debug)]
pub struct AgentLauncher {
    settings: LauncherSettings,
    child: Mutex<Option<Child>>,
}

impl AgentLauncher {
    pub fn new(settings: LauncherSettings) -> Self {
        Self {
            settings,
            child: Mutex::new(None),
        }
    }

    /// Spawns the process unless the most recently launched one is still
    /// alive. `try_wait` both probes and reaps, so an exited child frees
    /// the slot for a relaunch instead of lingering as a zombie. Returns
    /// the pid when a new process was started.
    pub fn ensure_running(&self) -> Result<Option<u32>, LaunchError> {
        let mut slot = self
            .child
            .lock()
            .map_err(|_| LaunchError("launcher state poisoned".to_string()))?;
        if let Some(child) = slot.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(None),
                Ok(Some(_)) | Err(_) => *slot = None,
            }
        }

        let child = Command::new(&self.settings.command)
            .args(&self.settings.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| LaunchError(err.to_string()))?;
        let pid = child.id();
        *slot = Some(child);
        Ok(Some(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    #[test]
    fn launch_failure_reports_the_underlying_error() {
        let launcher = AgentLauncher::new(LauncherSettings {
            command: PathBuf::from("/definitely/not/a/real/binary"),
            args: Vec::new(),
        });
        let err = launcher.ensure_running().expect_err("missing binary");
        assert!(err.to_string().contains("failed to launch"));
    }

    #[cfg(unix)]
    #[test]
    fn ensure_running_skips_spawn_while_the_last_child_is_alive() {
        let launcher = AgentLauncher::new(LauncherSettings {
            command: PathBuf::from("/bin/sleep"),
            args: vec!["5".to_string()],
        });

        let first = launcher.ensure_running().expect("first spawn");
        assert!(first.is_some());
        let second = launcher.ensure_running().expect("second call");
        assert_eq!(second, None);
    }

    #[cfg(unix)]
    #[test]
    fn an_exited_child_is_reaped_and_replaced_on_the_next_call() {
        let launcher = AgentLauncher::new(LauncherSettings {
            command: PathBuf::from("/bin/true"),
            args: Vec::new(),
        });

        let first = launcher.ensure_running().expect("first spawn");
        assert!(first.is_some());

        // /bin/true exits immediately; poll until the launcher notices
        // and spawns a replacement.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match launcher.ensure_running().expect("later call") {
                Some(_) => break,
                None if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                None => panic!("dead child was never replaced"),
            }
        }
    }
}
