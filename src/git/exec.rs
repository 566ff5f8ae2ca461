//! git::exec
//!
//! Bounded invocation of the external git executable.
//!
//! Network operations (clone, push) go through the git CLI so they pick up
//! the host's transport configuration. Everything else uses git2 in-process.
//!
//! Every invocation has a timeout, never prompts for credentials, and can be
//! abandoned through a cancel flag. A timed-out or cancelled child is killed.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Errors from running the git executable.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("git timed out after {0:?}")]
    Timeout(Duration),

    #[error("git was cancelled")]
    Cancelled,

    #[error("git exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Handle on the configured git executable.
#[derive(Debug, Clone)]
pub struct GitExecutable {
    program: PathBuf,
}

impl GitExecutable {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run git with `args`, waiting at most `timeout`.
    ///
    /// When `cancel` becomes true the child is killed at the next poll.
    pub fn run<I, S>(
        &self,
        args: I,
        cwd: Option<&Path>,
        timeout: Duration,
        cancel: Option<&AtomicBool>,
    ) -> Result<GitOutput, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Drain pipes on their own threads so a chatty child cannot block.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On timeout or cancel the readers are detached: a helper process
        // spawned by git may still hold the pipes open.
        let status = wait_bounded(&self.program, &mut child, timeout, cancel)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(ExecError::Failed {
                status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(GitOutput { stdout, stderr })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_bounded(
    program: &Path,
    child: &mut Child,
    timeout: Duration,
    cancel: Option<&AtomicBool>,
) -> Result<ExitStatus, ExecError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(ExecError::Spawn {
                    program: program.to_path_buf(),
                    source,
                });
            }
        }

        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Cancelled);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
