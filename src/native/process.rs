use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Captured result of a child that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("process timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Runs an argv vector to completion, bounded by `timeout`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String], timeout: Duration) -> Result<ProcessOutput, RunError>;
}

/// Spawns the child directly (no shell) in its own process group.
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, argv: &[String], timeout: Duration) -> Result<ProcessOutput, RunError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();

        // On timeout the wait future is dropped here, which kills the leader
        // through kill_on_drop; the group kill reaches anything it forked.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                code: exit_code(&output.status),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(RunError::Io(e)),
            Err(_) => {
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                Err(RunError::TimedOut(timeout))
            }
        }
    }
}

/// Signal-terminated children report the negated signal number.
fn exit_code(status: &ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

fn kill_group(pid: u32) {
    let pgid = Pid::from_raw(pid as i32);
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => tracing::debug!(pgid = pid, "Killed timed-out process group"),
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid = pid, "killpg({}, SIGKILL) failed: {}", pid, e),
    }
}
