//! Exit code logic for the getghrel process.
//!
//! Single responsibility: map the run summary to the process exit outcome.

use std::process::ExitCode;

use getghrel_core::pipeline::RunSummary;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// No identifier failed.
    Success,
    /// Some identifiers failed, some succeeded.
    Partial,
    /// Every identifier failed, or the run was interrupted.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Partial => ExitCode::from(2),
            Self::Failure => ExitCode::FAILURE,
        }
    }
}

/// Determines the process exit outcome from succeeded and failed counts.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Exit outcome of a finished run; interruption always fails.
pub(crate) fn exit_for_summary(summary: &RunSummary) -> ProcessExit {
    if summary.interrupted {
        ProcessExit::Failure
    } else {
        determine_exit_outcome(summary.succeeded(), summary.failed)
    }
}
