//! Streaming child-process execution with background cancellation.
//!
//! Send (spec §4.6) needs to read a toolkit driver's stdout line-by-line as
//! it is produced — not just the captured-at-completion [`crate::ProcessOutput`]
//! that [`crate::ProcessRunner`] returns — while a cancellation signal can
//! arrive at any time and must tear down the whole process tree, not just
//! the immediate child (dcm4che's `storescu.bat` forks a `java` process;
//! DCMTK's `storescu` can itself spawn helper processes under some
//! configurations).

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

use crate::command_spec::CommandSpec;
use crate::error::RunnerError;

/// Poll interval for the cancellation watcher (spec §5: "roughly every
/// 150ms").
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// A spawned child process whose stdout is streamed line-by-line.
pub struct StreamingChild {
    child: Child,
    pid: u32,
}

impl StreamingChild {
    /// Spawn `cmd` with stdout piped and stderr piped, placing it in its own
    /// process group on Unix so the whole tree can be force-killed later.
    pub fn spawn(cmd: &CommandSpec) -> Result<Self, RunnerError> {
        let mut tokio_cmd = cmd.to_tokio_command();
        tokio_cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                tokio_cmd.pre_exec(|| {
                    nix::unistd::setsid().map_err(std::io::Error::from)?;
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            tokio_cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let child = tokio_cmd.spawn().map_err(|e| RunnerError::SpawnFailed {
            program: cmd.program.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;

        let pid = child.id().ok_or_else(|| RunnerError::SpawnFailed {
            program: cmd.program.to_string_lossy().into_owned(),
            reason: "child exited before its pid could be read".to_string(),
        })?;

        Ok(Self { child, pid })
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Take ownership of the stdout line stream. May only be called once.
    pub fn stdout_lines(&mut self) -> Option<Lines<BufReader<ChildStdout>>> {
        self.child.stdout.take().map(|out| BufReader::new(out).lines())
    }

    /// Take ownership of the stderr line stream. May only be called once.
    pub fn stderr_lines(&mut self) -> Option<Lines<BufReader<tokio::process::ChildStderr>>> {
        self.child
            .stderr
            .take()
            .map(|out| BufReader::new(out).lines())
    }

    /// Wait for the child to exit, returning its exit code (`None` if it was
    /// killed by a signal rather than exiting normally).
    pub async fn wait(&mut self) -> Result<Option<i32>, RunnerError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| RunnerError::StreamFailed {
                program: "child".to_string(),
                reason: e.to_string(),
            })?;
        Ok(status.code())
    }

    /// Force-kill this process and every descendant it spawned.
    pub fn kill_tree(&self) -> Result<(), RunnerError> {
        kill_tree(self.pid)
    }
}

#[cfg(unix)]
fn kill_tree(pid: u32) -> Result<(), RunnerError> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(pid as i32);
    // Negative pid targets the whole process group (`killpg` semantics via kill(2)).
    signal::kill(Pid::from_raw(-pgid.as_raw()), Signal::SIGKILL).map_err(|e| {
        RunnerError::KillFailed {
            pid,
            reason: e.to_string(),
        }
    })
}

#[cfg(windows)]
fn kill_tree(pid: u32) -> Result<(), RunnerError> {
    // `taskkill /T` walks the process tree for us; reimplementing that via
    // CreateToolhelp32Snapshot buys nothing but unsafe code here.
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| RunnerError::KillFailed {
            pid,
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::KillFailed {
            pid,
            reason: format!("taskkill exited with {status}"),
        })
    }
}

/// Spawn a background task that polls `cancelled` roughly every
/// [`CANCEL_POLL_INTERVAL`] and force-kills `pid`'s whole tree the moment it
/// flips to `true`. The returned handle resolves once the kill has been
/// issued (or the watcher was dropped via `stop`).
pub fn spawn_cancel_watcher(pid: u32, cancelled: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancelled.load(Ordering::Relaxed) {
                let _ = kill_tree(pid);
                return;
            }
            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_wait_on_a_trivial_command() {
        let cmd = if cfg!(windows) {
            CommandSpec::new("cmd").args(["/C", "exit 0"])
        } else {
            CommandSpec::new("true")
        };
        let mut child = StreamingChild::spawn(&cmd).expect("spawn should succeed");
        let code = child.wait().await.expect("wait should succeed");
        assert_eq!(code, Some(0));
    }

    #[tokio::test]
    async fn stdout_lines_are_readable() {
        let cmd = if cfg!(windows) {
            CommandSpec::new("cmd").args(["/C", "echo hello"])
        } else {
            CommandSpec::new("sh").args(["-c", "echo hello"])
        };
        let mut child = StreamingChild::spawn(&cmd).expect("spawn should succeed");
        let mut lines = child.stdout_lines().expect("stdout should be piped");
        let first = lines.next_line().await.unwrap();
        assert_eq!(first.as_deref(), Some("hello"));
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_watcher_kills_a_long_running_process() {
        let cmd = if cfg!(windows) {
            CommandSpec::new("cmd").args(["/C", "ping -n 30 127.0.0.1 >nul"])
        } else {
            CommandSpec::new("sleep").args(["30"])
        };
        let mut child = StreamingChild::spawn(&cmd).expect("spawn should succeed");
        let pid = child.pid();
        let cancelled = Arc::new(AtomicBool::new(false));
        let watcher = spawn_cancel_watcher(pid, Arc::clone(&cancelled));

        cancelled.store(true, Ordering::Relaxed);
        watcher.await.expect("watcher task should not panic");

        let code = child.wait().await.expect("wait should succeed");
        assert_ne!(code, Some(0));
    }
}
