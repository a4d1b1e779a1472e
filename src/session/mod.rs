//! Test session hook
//!
//! A [`Session`] owns the report of one test run. The runner announces each
//! test with [`Session::begin_test`], lets the test add steps to its
//! sequence call, and reports the outcome with [`Session::end_test`].
//! [`Session::finish`] finalizes the report, saves it and uploads it.

pub mod text;

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::common::{Error, Result};
use crate::report::{FinalizedReport, Report, ReportIdentity, Sequence, Status, Step};
use crate::upload::{ReportUploader, UploadReceipt};

/// Name of the step recording a test's own outcome
pub const OUTCOME_STEP: &str = "Outcome";
/// Name of the step recording an abnormal end of the session
pub const SESSION_STEP: &str = "Session";

/// Settings for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub identity: ReportIdentity,
    /// Name of the root sequence
    pub name: String,
    /// Directory the finished report is written to
    pub save_dir: Option<PathBuf>,
    /// Write indented JSON
    pub pretty: bool,
}

/// How a single test ended
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Passed,
    Failed {
        /// Short description, stored as the call's `errorMessage`
        message: Option<String>,
        /// Captured output, stored as the call's `reportText`
        details: Option<String>,
    },
    Skipped {
        reason: Option<String>,
    },
    /// The test could not run to completion
    Errored {
        message: String,
    },
}

/// How the whole session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Ok,
    TestsFailed,
    Interrupted,
    InternalError,
    UsageError,
    NoTestsCollected,
}

impl SessionExit {
    fn describe(self) -> &'static str {
        match self {
            Self::Ok => "session completed",
            Self::TestsFailed => "tests failed",
            Self::Interrupted => "session was interrupted",
            Self::InternalError => "internal error in the test runner",
            Self::UsageError => "test runner was used incorrectly",
            Self::NoTestsCollected => "no tests were collected",
        }
    }

    /// Exits the tests themselves already account for
    fn is_reflected_by_tests(self) -> bool {
        matches!(self, Self::Ok | Self::TestsFailed)
    }
}

/// Per-outcome test counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errored
    }
}

/// What a finished session produced
#[derive(Debug)]
pub struct SessionSummary {
    pub report: FinalizedReport,
    pub counts: OutcomeCounts,
    pub saved_to: Option<PathBuf>,
    pub receipt: Option<UploadReceipt>,
}

impl SessionSummary {
    pub fn status(&self) -> Status {
        self.report.status()
    }
}

struct RunningTest {
    index: usize,
    name: String,
    started: Instant,
}

pub struct Session {
    report: Report,
    save_dir: Option<PathBuf>,
    pretty: bool,
    uploader: Option<Box<dyn ReportUploader>>,
    current: Option<RunningTest>,
    counts: OutcomeCounts,
    started: Instant,
}

impl Session {
    /// Open the report for a new session
    pub fn start(options: SessionOptions) -> Result<Self> {
        let report = Report::with_root(options.identity, &options.name)?;
        info!(
            id = %report.id(),
            sn = %report.identity().serial_number,
            "Started session {}",
            options.name
        );
        Ok(Self {
            report,
            save_dir: options.save_dir,
            pretty: options.pretty,
            uploader: None,
            current: None,
            counts: OutcomeCounts::default(),
            started: Instant::now(),
        })
    }

    /// Upload the report through `uploader` when the session finishes
    pub fn with_uploader(mut self, uploader: Box<dyn ReportUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Header access, e.g. for misc infos, assets or comments
    pub fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    /// Add a sequence call for the test `name` defined in `file`
    pub fn begin_test(&mut self, name: &str, file: &str) -> Result<&mut Sequence> {
        if let Some(running) = &self.current {
            return Err(Error::IllegalState(format!(
                "test `{}` is still running",
                running.name
            )));
        }
        let path = file.replace('\\', "/");
        let root = self.report.root_mut()?;
        let index = root.children().len();
        root.add_sequence(name, &path, "1.0")?;
        debug!(test = name, path = %path, "Test started");
        self.current = Some(RunningTest {
            index,
            name: name.to_string(),
            started: Instant::now(),
        });
        self.current_test()
    }

    /// The sequence call of the running test
    pub fn current_test(&mut self) -> Result<&mut Sequence> {
        let index = self
            .current
            .as_ref()
            .map(|running| running.index)
            .ok_or_else(|| Error::IllegalState("no test is running".to_string()))?;
        self.report.root_mut()?.sequence_at_mut(index)
    }

    /// Record how the running test ended and return its sequence status
    pub fn end_test(&mut self, outcome: TestOutcome) -> Result<Status> {
        let elapsed = self
            .current
            .as_ref()
            .map(|running| running.started.elapsed().as_secs_f64())
            .ok_or_else(|| Error::IllegalState("no test is running".to_string()))?;

        let seq = self.current_test()?;
        seq.set_total_time(elapsed)?;
        match &outcome {
            TestOutcome::Passed => {
                seq.push_step(Step::pass_fail(OUTCOME_STEP, true)?)?;
            }
            TestOutcome::Failed { message, details } => {
                seq.push_step(Step::pass_fail(OUTCOME_STEP, false)?)?;
                if let Some(details) = details {
                    seq.set_report_text(&text::failure_report_text(details))?;
                }
                if let Some(message) = message {
                    seq.set_error(None, Some(&text::failure_message(message)))?;
                }
            }
            TestOutcome::Skipped { reason } => {
                let step = seq.push_step(Step::pass_fail(OUTCOME_STEP, true)?)?;
                step.mark_skipped();
                if let Some(reason) = reason {
                    step.set_report_text(reason);
                }
            }
            TestOutcome::Errored { message } => {
                let message = text::failure_message(message);
                seq.push_step(Step::pass_fail(OUTCOME_STEP, false)?)?
                    .mark_error(&message);
                seq.set_error(None, Some(&message))?;
            }
        }
        let status = seq.status();
        let name = seq.name().to_string();

        match outcome {
            TestOutcome::Passed => self.counts.passed += 1,
            TestOutcome::Failed { .. } => self.counts.failed += 1,
            TestOutcome::Skipped { .. } => self.counts.skipped += 1,
            TestOutcome::Errored { .. } => self.counts.errored += 1,
        }
        self.current = None;

        if status.is_passed() {
            info!(test = %name, "Test finished: {}", status);
        } else {
            warn!(test = %name, "Test finished: {}", status);
        }
        Ok(status)
    }

    /// Finalize, save and upload the report
    pub async fn finish(mut self, exit: SessionExit) -> Result<SessionSummary> {
        if self.current.is_some() {
            self.end_test(TestOutcome::Errored {
                message: "session ended while the test was running".to_string(),
            })?;
        }

        self.report.uut_mut()?.exec_time = Some(self.started.elapsed().as_secs_f64());

        if !exit.is_reflected_by_tests() {
            let mut step = Step::pass_fail(SESSION_STEP, false)?;
            if exit == SessionExit::Interrupted {
                step.mark_terminated();
            }
            step.set_error(None, Some(exit.describe()));
            self.report.root_mut()?.push_step(step)?;
            warn!("Session ended abnormally: {}", exit.describe());
        }

        let report = self.report.finalize()?;
        info!(
            passed = self.counts.passed,
            failed = self.counts.failed,
            skipped = self.counts.skipped,
            errored = self.counts.errored,
            "Session finished: {}",
            report.status()
        );

        let saved_to = match &self.save_dir {
            Some(dir) => Some(save_report(&report, dir, self.pretty).await?),
            None => None,
        };

        let receipt = match &self.uploader {
            Some(uploader) => {
                let payload = report.to_json()?;
                match uploader.upload(&payload).await {
                    Ok(receipt) => Some(receipt),
                    Err(e) => {
                        error!("Failed to upload report {}: {}", report.id(), e);
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        Ok(SessionSummary {
            report,
            counts: self.counts,
            saved_to,
            receipt,
        })
    }
}

/// Write `report` into `dir` under its standard file name
pub async fn save_report(report: &FinalizedReport, dir: &Path, pretty: bool) -> Result<PathBuf> {
    let bytes = if pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report.file_name());
    tokio::fs::write(&path, bytes).await?;
    info!("Report saved to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{BinaryCompOp, NumericMeasurement, Node, StepStatus};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn options() -> SessionOptions {
        SessionOptions {
            identity: ReportIdentity {
                part_number: "PN-1".into(),
                serial_number: "SN-1".into(),
                revision: "A".into(),
                process_code: 10,
                machine_name: "rig".into(),
                location: "lab".into(),
                purpose: "dev".into(),
                operator: "tester".into(),
                ..Default::default()
            },
            name: "Smoke".into(),
            save_dir: None,
            pretty: false,
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Vec<u8>>>>);

    #[async_trait]
    impl ReportUploader for Recorder {
        async fn upload(&self, payload: &[u8]) -> Result<UploadReceipt> {
            self.0.lock().unwrap().push(payload.to_vec());
            Ok(UploadReceipt {
                id: "1".into(),
                view_url: "https://wats.example/Modules/ViewUUT_Report.html?id=1".into(),
            })
        }
    }

    fn outcome_status(seq: &Sequence) -> StepStatus {
        match seq.children().last() {
            Some(Node::Step(step)) => step.status(),
            other => panic!("expected an outcome step, got {:?}", other),
        }
    }

    #[test]
    fn test_begin_test_normalizes_path() {
        let mut session = Session::start(options()).unwrap();
        let seq = session.begin_test("test_power", r"tests\power.rs").unwrap();
        assert_eq!(seq.path(), "tests/power.rs");
        assert_eq!(seq.version(), "1.0");
    }

    #[test]
    fn test_no_current_test() {
        let mut session = Session::start(options()).unwrap();
        assert!(matches!(session.current_test().unwrap_err(), Error::IllegalState(_)));
        assert!(session.end_test(TestOutcome::Passed).is_err());
    }

    #[test]
    fn test_nested_begin_rejected() {
        let mut session = Session::start(options()).unwrap();
        session.begin_test("a", "a.rs").unwrap();
        assert!(matches!(session.begin_test("b", "b.rs").unwrap_err(), Error::IllegalState(_)));
    }

    #[test]
    fn test_outcomes() {
        let mut session = Session::start(options()).unwrap();

        session.begin_test("passes", "t.rs").unwrap();
        assert_eq!(session.end_test(TestOutcome::Passed).unwrap(), Status::Passed);

        session.begin_test("skips", "t.rs").unwrap();
        let status = session
            .end_test(TestOutcome::Skipped { reason: Some("no hardware".into()) })
            .unwrap();
        assert_eq!(status, Status::Passed);

        session.begin_test("errors", "t.rs").unwrap();
        let status = session
            .end_test(TestOutcome::Errored { message: "spawn failed".into() })
            .unwrap();
        assert_eq!(status, Status::Error);

        let root = session.report().root().unwrap();
        let seqs: Vec<&Sequence> = root
            .children()
            .iter()
            .filter_map(|node| match node {
                Node::Sequence(seq) => Some(seq),
                Node::Step(_) => None,
            })
            .collect();
        assert_eq!(outcome_status(seqs[1]), StepStatus::Skipped);
        assert_eq!(outcome_status(seqs[2]), StepStatus::Error);
        assert_eq!(seqs[2].error_message(), Some("spawn failed"));
        assert!(seqs[0].total_time().is_some());
        assert_eq!(session.counts().total(), 3);
    }

    #[test]
    fn test_failure_text_is_cleaned() {
        let mut session = Session::start(options()).unwrap();
        session.begin_test("fails", "t.rs").unwrap();
        session
            .end_test(TestOutcome::Failed {
                message: Some("\x1b[31massert failed\x1b[0m".into()),
                details: Some("left:  1\nright: 2".into()),
            })
            .unwrap();
        let root = session.report().root().unwrap();
        let Node::Sequence(seq) = &root.children()[0] else {
            panic!("expected a sequence");
        };
        assert_eq!(seq.error_message(), Some("assert failed"));
        assert_eq!(seq.report_text(), Some("<pre>left:\u{a0}\u{a0}1\nright: 2</pre>"));
        assert_eq!(seq.status(), Status::Failed);
    }

    #[test]
    fn test_steps_added_by_the_test() {
        let mut session = Session::start(options()).unwrap();
        session
            .begin_test("measures", "t.rs")
            .unwrap()
            .push_step(
                Step::numeric(
                    "Current",
                    NumericMeasurement::binary(12.0, 10.0, BinaryCompOp::LessThan, "mA"),
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(session.end_test(TestOutcome::Passed).unwrap(), Status::Failed);
    }

    #[tokio::test]
    async fn test_finish_uploads_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options();
        opts.save_dir = Some(dir.path().to_path_buf());
        let recorder = Recorder::default();
        let mut session = Session::start(opts)
            .unwrap()
            .with_uploader(Box::new(recorder.clone()));
        session.begin_test("passes", "t.rs").unwrap();
        session.end_test(TestOutcome::Passed).unwrap();

        let summary = session.finish(SessionExit::Ok).await.unwrap();
        assert_eq!(summary.status(), Status::Passed);
        assert!(summary.report.report().uut().exec_time.is_some());

        let saved = summary.saved_to.unwrap();
        assert!(saved.file_name().unwrap().to_str().unwrap().ends_with("-Smoke-SN-1_WATS.json"));
        let parsed = FinalizedReport::from_json(&std::fs::read(&saved).unwrap()).unwrap();
        assert_eq!(parsed.id(), summary.report.id());

        let uploads = recorder.0.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(summary.receipt.unwrap().id, "1");
    }

    #[tokio::test]
    async fn test_interrupted_session_is_error() {
        let mut session = Session::start(options()).unwrap();
        session.begin_test("passes", "t.rs").unwrap();
        session.end_test(TestOutcome::Passed).unwrap();
        let summary = session.finish(SessionExit::Interrupted).await.unwrap();
        assert_eq!(summary.status(), Status::Error);
        let last = summary.report.root().unwrap().children().last().unwrap();
        assert_eq!(last.name(), SESSION_STEP);
    }

    #[tokio::test]
    async fn test_no_tests_collected_fails() {
        let session = Session::start(options()).unwrap();
        let summary = session.finish(SessionExit::NoTestsCollected).await.unwrap();
        assert_eq!(summary.status(), Status::Failed);
    }

    #[tokio::test]
    async fn test_finish_ends_running_test() {
        let mut session = Session::start(options()).unwrap();
        session.begin_test("hangs", "t.rs").unwrap();
        let summary = session.finish(SessionExit::Ok).await.unwrap();
        assert_eq!(summary.status(), Status::Error);
        assert_eq!(summary.counts.errored, 1);
    }
}
