//! `kill(2)`-based signal delivery for Unix targets.

use super::{ProcessSignaller, Signal, TerminateError, parse_process_id};
use tracing::debug;

fn raw_signal(signal: Signal) -> libc::c_int {
    match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
        Signal::Int => libc::SIGINT,
        Signal::Hup => libc::SIGHUP,
    }
}

/// Signals processes with `libc::kill`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixSignaller;

impl PosixSignaller {
    pub fn new() -> Self {
        Self
    }

    fn deliver(target: String, raw_target: libc::pid_t, signal: Signal) -> Result<(), TerminateError> {
        // SAFETY: kill(2) takes plain integers and has no memory-safety
        // preconditions; the target id was validated as positive by the caller
        // (and negated only for group delivery).
        let result = unsafe { libc::kill(raw_target, raw_signal(signal)) };
        if result == 0 {
            debug!("Sent {signal} to {target}");
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            debug!("{target} already gone; {signal} not needed");
            return Ok(());
        }
        Err(TerminateError::Os {
            target,
            signal,
            source: err,
        })
    }
}

impl ProcessSignaller for PosixSignaller {
    fn signal_pid(&self, pid: &str, signal: Signal) -> Result<(), TerminateError> {
        let pid = parse_process_id(pid)?;
        Self::deliver(format!("pid {pid}"), pid, signal)
    }

    fn signal_group(&self, pgid: &str, signal: Signal) -> Result<(), TerminateError> {
        let pgid = parse_process_id(pgid)?;
        // Negative target = whole process group.
        Self::deliver(format!("process group {pgid}"), -pgid, signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::{Command, Stdio};

    fn spawn_sleeper(own_group: bool) -> std::process::Child {
        let mut cmd = Command::new("sleep");
        cmd.arg("60").stdout(Stdio::null()).stderr(Stdio::null());
        if own_group {
            cmd.process_group(0);
        }
        cmd.spawn().unwrap()
    }

    #[test]
    fn test_signal_pid_terminates_child() {
        let mut child = spawn_sleeper(false);
        let signaller = PosixSignaller::new();

        signaller
            .signal_pid(&format!(" {}\n", child.id()), Signal::Term)
            .unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn test_signal_group_terminates_group_not_caller() {
        let mut child = spawn_sleeper(true);
        let signaller = PosixSignaller::new();

        signaller
            .signal_group(&child.id().to_string(), Signal::Kill)
            .unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        // Still running here: the caller was not part of the signalled group.
    }

    #[test]
    fn test_absent_pid_is_success() {
        // i32::MAX exceeds the kernel pid range on Linux/macOS; kill() returns ESRCH.
        let signaller = PosixSignaller::new();
        signaller
            .signal_pid(&i32::MAX.to_string(), Signal::Term)
            .unwrap();
    }

    #[test]
    fn test_absent_group_is_success() {
        let signaller = PosixSignaller::new();
        signaller
            .signal_group(&i32::MAX.to_string(), Signal::Term)
            .unwrap();
    }

    #[test]
    fn test_malformed_ids_fail_before_signalling() {
        let signaller = PosixSignaller::new();
        assert!(matches!(
            signaller.signal_pid("abc", Signal::Term),
            Err(TerminateError::InvalidId { .. })
        ));
        assert!(matches!(
            signaller.signal_group("0", Signal::Term),
            Err(TerminateError::NonPositiveId { id: 0 })
        ));
    }
}
