//! External commands with a hard deadline.
//!
//! `Command::output()` waits forever on a hung child. [`output_with_deadline`]
//! polls the child instead and, once the deadline passes, kills it and every
//! process it started (the child leads its own process group on Unix), so a
//! stuck `tmux` or `bd` never outlives the caller's budget.

use super::{DefaultSignaller, ProcessSignaller, Signal};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Deadline for a single `tmux` or `bd` invocation unless configured otherwise.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to run a command to completion
#[derive(Debug, Error)]
pub enum CommandError {
    /// Spawning or waiting on the child failed
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The child was still running at the deadline and was killed
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill_tree(child: &mut Child) {
    let group_killed = DefaultSignaller::new()
        .signal_group(&child.id().to_string(), Signal::Kill)
        .is_ok();
    if !group_killed {
        let _ = child.kill();
    }
}

/// Run `command` capturing stdout and stderr, killing it after `deadline`.
pub fn output_with_deadline(command: &mut Command, deadline: Duration) -> Result<Output, CommandError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if started.elapsed() >= deadline {
            kill_tree(&mut child);
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    // Pipes close once the whole group is gone, so the readers finish.
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    match status {
        Some(status) => Ok(Output {
            status,
            stdout,
            stderr,
        }),
        None => Err(CommandError::TimedOut(deadline)),
    }
}
