//! Emulator process launch and exit monitoring

use crate::{LaunchError, LaunchResult};
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Per-launch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle = 0,
    Planning = 1,
    Spawned = 2,
    Monitoring = 3,
    Finished = 4,
}

impl LaunchState {
    fn from_discriminant(discriminant: u8) -> Self {
        match discriminant {
            0 => Self::Idle,
            1 => Self::Planning,
            2 => Self::Spawned,
            3 => Self::Monitoring,
            4 => Self::Finished,
            _ => panic!("invalid launch state discriminant: {discriminant}"),
        }
    }

    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Spawned | Self::Monitoring)
    }
}

/// Shared, lock-free view of a launch's [`LaunchState`].
#[derive(Debug, Clone)]
pub struct LaunchStatus(Arc<AtomicU8>);

impl LaunchStatus {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(LaunchState::Idle as u8)))
    }

    #[must_use]
    pub fn get(&self) -> LaunchState {
        LaunchState::from_discriminant(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, state: LaunchState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }
}

impl Default for LaunchStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// How an emulator process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// `None` if the exit status could not be collected
    pub status: Option<ExitStatus>,
    pub duration: Duration,
}

impl LaunchOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.is_some_and(|status| status.success())
    }
}

pub struct MonitorHandle {
    status: LaunchStatus,
    pid: u32,
    thread: JoinHandle<LaunchOutcome>,
}

impl MonitorHandle {
    #[must_use]
    pub fn state(&self) -> LaunchState {
        self.status.get()
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the monitor observes process exit. Returns `None` if the monitor thread
    /// panicked.
    #[must_use]
    pub fn wait(self) -> Option<LaunchOutcome> {
        self.thread.join().ok()
    }
}

/// Spawn `command` in `cwd` and watch it from a background thread, checking for exit every
/// `interval`.
///
/// `status` moves to [`LaunchState::Spawned`] once the process starts, to
/// [`LaunchState::Monitoring`] when the monitor thread takes over and to
/// [`LaunchState::Finished`] right before `on_exit` runs on the monitor thread. The process
/// cannot be cancelled through the handle.
///
/// # Errors
///
/// Returns [`LaunchError::Spawn`] if the command line is empty or the process or monitor thread
/// cannot be started.
pub fn spawn_monitored<F>(
    command: &[OsString],
    cwd: &Path,
    interval: Duration,
    status: LaunchStatus,
    on_exit: F,
) -> LaunchResult<MonitorHandle>
where
    F: FnOnce(&LaunchOutcome) + Send + 'static,
{
    let Some((program, args)) = command.split_first() else {
        return Err(LaunchError::spawn(
            Path::new(""),
            io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        ));
    };
    let program_path = Path::new(program);

    log::info!("Launching {command:?} in '{}'", cwd.display());

    let start = Instant::now();
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .spawn()
        .map_err(|err| LaunchError::spawn(program_path, err))?;
    let pid = child.id();
    status.set(LaunchState::Spawned);

    let thread = {
        let status = status.clone();
        thread::Builder::new()
            .name("dosdeck-monitor".into())
            .spawn(move || {
                status.set(LaunchState::Monitoring);
                let exit_status = poll_until_exit(child, interval);
                let outcome = LaunchOutcome { status: exit_status, duration: start.elapsed() };
                log::info!(
                    "Emulator process {pid} exited after {:.1}s ({exit_status:?})",
                    outcome.duration.as_secs_f64()
                );

                status.set(LaunchState::Finished);
                on_exit(&outcome);
                outcome
            })
            .map_err(|err| LaunchError::spawn(program_path, err))?
    };

    Ok(MonitorHandle { status, pid, thread })
}

fn poll_until_exit(mut child: Child, interval: Duration) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(exit_status)) => return Some(exit_status),
            Ok(None) => thread::sleep(interval),
            Err(err) => {
                log::error!("Error polling emulator process {}: {err}", child.id());
                return child
                    .wait()
                    .map_err(|err| log::error!("Error waiting for emulator process: {err}"))
                    .ok();
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use test_log::test;

    fn shell(script: &str) -> Vec<OsString> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let status = LaunchStatus::new();
        assert_eq!(LaunchState::Idle, status.get());

        let (sender, receiver) = mpsc::channel();
        let handle = spawn_monitored(
            &shell("sleep 0.2; exit 3"),
            dir.path(),
            Duration::from_millis(10),
            status.clone(),
            move |outcome| sender.send(*outcome).unwrap(),
        )
        .unwrap();
        assert!(status.get().is_running());

        let outcome = handle.wait().unwrap();
        assert_eq!(LaunchState::Finished, status.get());
        assert_eq!(Some(3), outcome.status.unwrap().code());
        assert!(!outcome.success());
        assert!(outcome.duration >= Duration::from_millis(200));
        assert_eq!(outcome, receiver.recv().unwrap());
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_monitored(
            &shell("touch launched"),
            dir.path(),
            Duration::from_millis(5),
            LaunchStatus::new(),
            |_| {},
        )
        .unwrap();

        assert!(handle.wait().unwrap().success());
        assert!(dir.path().join("launched").exists());
    }

    #[test]
    fn spawn_errors() {
        let dir = tempfile::tempdir().unwrap();
        let status = LaunchStatus::new();

        let result = spawn_monitored(&[], dir.path(), Duration::ZERO, status.clone(), |_| {});
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));

        let command = vec![dir.path().join("missing-emulator").into_os_string()];
        let result = spawn_monitored(&command, dir.path(), Duration::ZERO, status.clone(), |_| {});
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
        assert_eq!(LaunchState::Idle, status.get());
    }
}
