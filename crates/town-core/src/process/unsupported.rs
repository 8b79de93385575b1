//! Stub signaller for platforms without `kill(2)`.

use super::{ProcessSignaller, Signal, TerminateError};

/// Fails every request with [`TerminateError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSignaller;

impl UnsupportedSignaller {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSignaller for UnsupportedSignaller {
    fn signal_pid(&self, _pid: &str, _signal: Signal) -> Result<(), TerminateError> {
        Err(TerminateError::Unsupported {
            operation: "signal_pid",
        })
    }

    fn signal_group(&self, _pgid: &str, _signal: Signal) -> Result<(), TerminateError> {
        Err(TerminateError::Unsupported {
            operation: "signal_group",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_call_fails_explicitly() {
        let signaller = UnsupportedSignaller::new();
        assert!(matches!(
            signaller.signal_pid("1234", Signal::Term),
            Err(TerminateError::Unsupported { .. })
        ));
        assert!(matches!(
            signaller.signal_group("1234", Signal::Kill),
            Err(TerminateError::Unsupported { .. })
        ));
    }
}
