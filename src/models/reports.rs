use std::{path::PathBuf, process::ExitStatus};

use crate::runner::PackageError;

/// One blank-line-delimited step of the build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Action keyword, e.g. `CompileC` or `CodeSign`.
    pub kind: String,
    pub argument: String,
    /// Lines from the first error marker to the end of the step, verbatim.
    pub error_log: Option<String>,
}

impl StepRecord {
    pub fn has_error(&self) -> bool {
        self.error_log.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success { artifact: PathBuf },
    Failure { errors: Vec<StepRecord> },
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success { .. })
    }

    pub fn artifact(&self) -> Option<&PathBuf> {
        match self {
            Verdict::Success { artifact } => Some(artifact),
            Verdict::Failure { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub steps: Vec<StepRecord>,
    pub verdict: Verdict,
    /// Buffered text left over at stream end and discarded.
    pub dropped_tail: Option<String>,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub parse: ParseOutcome,
    pub status: ExitStatus,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub outcome: BuildOutcome,
    pub archive: Option<PathBuf>,
    /// Set when the build succeeded but packaging did not.
    pub package_error: Option<PackageError>,
    pub elapsed: u64,
    pub logs: Vec<String>,
}

impl PipelineReport {
    /// A clean build log, and a packaged archive if packaging was attempted.
    pub fn is_success(&self) -> bool {
        self.outcome.parse.verdict.is_success() && self.package_error.is_none()
    }
}
