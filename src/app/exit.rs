//! Exit code logic for the coursedl process.
//!
//! Single responsibility: map the run report to the process exit outcome.

use super::RunReport;

/// Process exit outcomes and their codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Everything requested was downloaded or already present.
    Success,
    /// One or more transfers failed permanently, or an unhandled error.
    Failure,
    /// A supplied course locator did not match the expected shape.
    InvalidReference,
    /// No requested course was accessible and nothing was transferred.
    NotAuthorized,
    /// The user interrupted the run.
    Cancelled,
}

impl ProcessExit {
    /// Returns the numeric process exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::InvalidReference => 2,
            Self::NotAuthorized => 3,
            Self::Cancelled => 130,
        }
    }
}

/// Determines the process exit outcome from a completed run.
pub(crate) fn determine_exit(report: &RunReport) -> ProcessExit {
    let nothing_transferred =
        report.completed == 0 && report.failed == 0 && report.skipped == 0;
    if report.courses_requested > 0
        && report.courses_unauthorized == report.courses_requested
        && nothing_transferred
    {
        ProcessExit::NotAuthorized
    } else if report.failed > 0 {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
