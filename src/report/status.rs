//! Status vocabularies and the status aggregator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single measurement inside a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementStatus {
    #[serde(rename = "P")]
    Passed,
    #[serde(rename = "F")]
    Failed,
    #[serde(rename = "S")]
    Skipped,
}

impl MeasurementStatus {
    pub fn from_verdict(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// Status of a leaf step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    #[serde(rename = "P")]
    Passed,
    #[serde(rename = "F")]
    Failed,
    #[serde(rename = "D")]
    Done,
    #[serde(rename = "E")]
    Error,
    #[serde(rename = "T")]
    Terminated,
    #[serde(rename = "S")]
    Skipped,
}

impl StepStatus {
    pub fn code(self) -> &'static str {
        match self {
            Self::Passed => "P",
            Self::Failed => "F",
            Self::Done => "D",
            Self::Error => "E",
            Self::Terminated => "T",
            Self::Skipped => "S",
        }
    }
}

/// Derived status of a sequence and of the report as a whole
///
/// Variants are ordered by precedence: the aggregate of a set of
/// statuses is its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "P")]
    Passed,
    #[serde(rename = "F")]
    Failed,
    #[serde(rename = "E")]
    Error,
}

impl Status {
    pub fn code(self) -> &'static str {
        match self {
            Self::Passed => "P",
            Self::Failed => "F",
            Self::Error => "E",
        }
    }

    pub fn is_passed(self) -> bool {
        self == Self::Passed
    }
}

impl From<StepStatus> for Status {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Passed | StepStatus::Done | StepStatus::Skipped => Status::Passed,
            StepStatus::Failed => Status::Failed,
            StepStatus::Error | StepStatus::Terminated => Status::Error,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Error => "Error",
        };
        f.write_str(text)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Done => "Done",
            Self::Error => "Error",
            Self::Terminated => "Terminated",
            Self::Skipped => "Skipped",
        };
        f.write_str(text)
    }
}

/// Combine child statuses: Error > Failed > Passed, Passed when empty
pub fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let mut result = Status::Passed;
    for status in statuses {
        if status == Status::Error {
            return Status::Error;
        }
        result = result.max(status);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_passed() {
        assert_eq!(aggregate(std::iter::empty()), Status::Passed);
    }

    #[test]
    fn test_error_outranks_failed() {
        let statuses = [Status::Failed, Status::Passed, Status::Error, Status::Failed];
        assert_eq!(aggregate(statuses), Status::Error);
    }

    #[test]
    fn test_failed_outranks_passed() {
        assert_eq!(aggregate([Status::Passed, Status::Failed]), Status::Failed);
        assert_eq!(aggregate([Status::Passed, Status::Passed]), Status::Passed);
    }

    #[test]
    fn test_step_status_folding() {
        assert_eq!(Status::from(StepStatus::Done), Status::Passed);
        assert_eq!(Status::from(StepStatus::Skipped), Status::Passed);
        assert_eq!(Status::from(StepStatus::Terminated), Status::Error);
        assert_eq!(Status::from(StepStatus::Failed), Status::Failed);
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(serde_json::to_string(&Status::Error).unwrap(), "\"E\"");
        assert_eq!(serde_json::to_string(&StepStatus::Done).unwrap(), "\"D\"");
        assert_eq!(StepStatus::Terminated.code(), "T");
    }
}
