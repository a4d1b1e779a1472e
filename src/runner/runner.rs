//! Scenario runner implementation
//!
//! Executes each test command through the shell, turns its `key=value`
//! output into report steps and hands the outcome to the session.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use colored::Colorize;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use crate::common::{Error, Result};
use crate::report::{NumericMeasurement, Status, Step, StringMeasurement};
use crate::session::{Session, SessionExit, TestOutcome};

use super::config::{Check, NumericRule, StringRule, TestCase, TestScenario};

/// Longest string measurement value a report accepts
const MAX_VALUE: usize = 100;

/// Load a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;
    TestScenario::parse(&content)
}

/// Run every test of `scenario` inside `session`
///
/// Commands run in `dir`, normally the directory of the scenario file.
/// `file` is recorded as the path of each test's sequence call.
pub async fn run_scenario(
    scenario: &TestScenario,
    dir: &Path,
    file: &str,
    session: &mut Session,
    verbose: bool,
) -> Result<SessionExit> {
    println!(
        "\n{} {}",
        "Running Scenario:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    if let Some(setup_steps) = &scenario.setup {
        println!("\n{}", "Setup:".cyan());
        for step in setup_steps {
            if verbose {
                println!("  $ {}", step.shell.dimmed());
            }

            let status = TokioCommand::new("sh")
                .arg("-c")
                .arg(&step.shell)
                .current_dir(dir)
                .stdin(Stdio::null())
                .stdout(if verbose {
                    Stdio::inherit()
                } else {
                    Stdio::null()
                })
                .stderr(if verbose {
                    Stdio::inherit()
                } else {
                    Stdio::null()
                })
                .status()
                .await
                .map_err(|e| Error::Config(format!("Setup command failed to execute: {}", e)))?;

            if !status.success() {
                println!("  {} {}", "✗".red(), step.shell.dimmed());
                warn!(
                    "Setup command '{}' failed with exit code {:?}",
                    step.shell,
                    status.code()
                );
                return Ok(SessionExit::UsageError);
            }
            println!("  {} {}", "✓".green(), step.shell.dimmed());
        }
    }

    if scenario.tests.is_empty() {
        println!("\n{}", "No tests collected".yellow());
        return Ok(SessionExit::NoTestsCollected);
    }

    println!("\n{}", "Tests:".cyan());
    let mut any_failed = false;

    for test in &scenario.tests {
        session.begin_test(&test.name, file)?;
        let outcome = run_test(test, dir, session, verbose).await?;
        let status = session.end_test(outcome.clone())?;

        match (&outcome, status) {
            (TestOutcome::Skipped { .. }, _) => {
                println!("  {} {} (skipped)", "-".yellow(), test.name)
            }
            (_, Status::Passed) => println!("  {} {}", "✓".green(), test.name),
            (_, Status::Failed) => println!("  {} {}", "✗".red(), test.name),
            (_, Status::Error) => println!("  {} {} (error)", "✗".red().bold(), test.name),
        }
        any_failed |= !status.is_passed();
    }

    let counts = session.counts();
    let summary = format!(
        "{} passed, {} failed, {} skipped, {} errored",
        counts.passed, counts.failed, counts.skipped, counts.errored
    );
    if any_failed {
        println!("\n{} {}\n", "✗".red().bold(), summary.red().bold());
        Ok(SessionExit::TestsFailed)
    } else {
        println!("\n{} {}\n", "✓".green().bold(), summary.green().bold());
        Ok(SessionExit::Ok)
    }
}

/// Execute one test command and record its checks in the current test
async fn run_test(
    test: &TestCase,
    dir: &Path,
    session: &mut Session,
    verbose: bool,
) -> Result<TestOutcome> {
    if verbose {
        println!("  $ {}", test.run.dimmed());
    }

    let output = match execute(&test.run, dir, test.timeout()).await {
        Ok(output) => output,
        Err(message) => return Ok(TestOutcome::Errored { message }),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output.status.code();
    debug!(test = %test.name, ?code, "Test command exited");

    if code == Some(test.skip_exit_code) {
        let reason = last_line(&stdout).or_else(|| last_line(&stderr));
        return Ok(TestOutcome::Skipped { reason });
    }

    let values = parse_key_values(&stdout);
    let seq = session.current_test()?;
    for check in &test.checks {
        seq.push_step(check_step(check, &values)?)?;
    }

    if output.status.success() {
        return Ok(TestOutcome::Passed);
    }

    let details = if stderr.trim().is_empty() {
        stdout.into_owned()
    } else {
        stderr.into_owned()
    };
    Ok(TestOutcome::Failed {
        message: Some(match code {
            Some(code) => format!("`{}` exited with code {}", test.run, code),
            None => format!("`{}` was killed by a signal", test.run),
        }),
        details: (!details.trim().is_empty()).then_some(details),
    })
}

/// Run `command` through the shell, collecting its output
///
/// Spawn failures and timeouts are reported as a message; the child is
/// killed when the timeout drops it.
async fn execute(
    command: &str,
    dir: &Path,
    timeout: Option<Duration>,
) -> std::result::Result<Output, String> {
    let mut cmd = TokioCommand::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let run = cmd.output();

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| format!("`{}` timed out after {:?}", command, limit))?,
        None => run.await,
    };
    result.map_err(|e| format!("failed to run `{}`: {}", command, e))
}

/// Collect `key=value` lines; later lines win
pub fn parse_key_values(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "pass" | "passed" | "ok" => Some(true),
        "false" | "0" | "no" | "fail" | "failed" => Some(false),
        _ => None,
    }
}

fn error_step(name: &str, message: &str) -> Result<Step> {
    let mut step = Step::pass_fail(name, false)?;
    step.mark_error(message);
    Ok(step)
}

/// Turn one check into a report step
///
/// A value that is missing or cannot be read becomes an error step.
fn check_step(check: &Check, values: &HashMap<String, String>) -> Result<Step> {
    let name = check.step_name();
    let Some(raw) = values.get(check.key()) else {
        return error_step(name, &format!("no `{}=` line in the output", check.key()));
    };

    match check {
        Check::Numeric { unit, .. } => {
            let Ok(value) = raw.parse::<f64>() else {
                return error_step(name, &format!("`{}` is not a number", raw));
            };
            if !value.is_finite() {
                return error_step(name, &format!("`{}` is not a finite number", raw));
            }
            let measurement = match check.numeric_rule()? {
                Some(NumericRule::Binary { op, limit }) => {
                    NumericMeasurement::binary(value, limit, op, unit.as_str())
                }
                Some(NumericRule::Ternary { op, low, high }) => {
                    NumericMeasurement::ternary(value, low, high, op, unit.as_str())
                }
                None => return Err(Error::Internal("numeric check without rule".to_string())),
            };
            Step::numeric(name, measurement)
        }
        Check::String { expected, .. } => {
            if let Some(step) = overlong(name, raw) {
                return step;
            }
            let measurement = match check.string_rule()? {
                Some(StringRule::Binary(op)) => StringMeasurement::binary(raw.as_str(), expected.as_str(), op)?,
                Some(StringRule::Case(op)) => StringMeasurement::case(raw.as_str(), expected.as_str(), op),
                None => return Err(Error::Internal("string check without rule".to_string())),
            };
            Step::string(name, measurement)
        }
        Check::PassFail { .. } => match parse_bool(raw) {
            Some(passed) => Step::pass_fail(name, passed),
            None => error_step(name, &format!("`{}` is not a pass/fail value", raw)),
        },
        Check::Log { unit, .. } => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Step::numeric(name, NumericMeasurement::log(value, unit.as_str())),
            Ok(_) => error_step(name, &format!("`{}` is not a finite number", raw)),
            Err(_) => match overlong(name, raw) {
                Some(step) => step,
                None => Step::string(name, StringMeasurement::log(raw.as_str())),
            },
        },
    }
}

/// Error step for a string value the report cannot hold
fn overlong(name: &str, raw: &str) -> Option<Result<Step>> {
    let len = raw.chars().count();
    (len > MAX_VALUE).then(|| {
        error_step(
            name,
            &format!("value is {} characters, at most {} allowed", len, MAX_VALUE),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{StepKind, StepStatus};

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn numeric(op: &str, limit: Option<f64>, low: Option<f64>, high: Option<f64>) -> Check {
        Check::Numeric {
            key: "vout".into(),
            name: Some("Output voltage".into()),
            op: op.into(),
            limit,
            low,
            high,
            unit: "V".into(),
        }
    }

    #[test]
    fn test_parse_key_values() {
        let parsed = parse_key_values("booting\nvout = 3.31\nnot a key=1\nfw=1.2=rc\nvout=3.30\n");
        assert_eq!(parsed.get("vout").map(String::as_str), Some("3.30"));
        assert_eq!(parsed.get("fw").map(String::as_str), Some("1.2=rc"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_numeric_checks() {
        let vals = values(&[("vout", "3.31")]);
        let inside = check_step(&numeric("GELE", None, Some(3.2), Some(3.4)), &vals).unwrap();
        assert_eq!(inside.name(), "Output voltage");
        assert_eq!(inside.status(), StepStatus::Passed);

        let above = check_step(&numeric("LT", Some(3.0), None, None), &vals).unwrap();
        assert_eq!(above.status(), StepStatus::Failed);
    }

    #[test]
    fn test_missing_or_bad_value_is_error() {
        let check = numeric("LT", Some(3.0), None, None);
        let missing = check_step(&check, &values(&[])).unwrap();
        assert_eq!(missing.status(), StepStatus::Error);
        assert!(missing.error_message().unwrap().contains("vout="));

        let garbage = check_step(&check, &values(&[("vout", "n/a")])).unwrap();
        assert_eq!(garbage.status(), StepStatus::Error);
    }

    #[test]
    fn test_string_and_pass_fail_checks() {
        let vals = values(&[("fw", "V1.2"), ("selftest", "PASS")]);
        let fw = Check::String {
            key: "fw".into(),
            name: None,
            op: "IGNORECASE".into(),
            expected: "v1.2".into(),
        };
        assert_eq!(check_step(&fw, &vals).unwrap().status(), StepStatus::Passed);

        let selftest = Check::PassFail {
            key: "selftest".into(),
            name: None,
        };
        let step = check_step(&selftest, &vals).unwrap();
        assert_eq!(step.name(), "selftest");
        assert_eq!(step.status(), StepStatus::Passed);
    }

    #[test]
    fn test_log_check_picks_kind() {
        let vals = values(&[("temp", "41.5"), ("serial", "ABC")]);
        let temp = Check::Log {
            key: "temp".into(),
            name: None,
            unit: "C".into(),
        };
        assert!(matches!(check_step(&temp, &vals).unwrap().kind(), StepKind::NumericLimit(_)));

        let serial = Check::Log {
            key: "serial".into(),
            name: None,
            unit: String::new(),
        };
        assert!(matches!(check_step(&serial, &vals).unwrap().kind(), StepKind::StringValue(_)));
    }

    #[test]
    fn test_non_finite_values_are_errors() {
        let check = numeric("GELE", None, Some(3.2), Some(3.4));
        for raw in ["nan", "inf", "-inf", "NaN"] {
            let step = check_step(&check, &values(&[("vout", raw)])).unwrap();
            assert_eq!(step.status(), StepStatus::Error, "{}", raw);
            assert!(step.error_message().unwrap().contains("finite"));
        }

        let log = Check::Log {
            key: "temp".into(),
            name: None,
            unit: "C".into(),
        };
        let step = check_step(&log, &values(&[("temp", "inf")])).unwrap();
        assert_eq!(step.status(), StepStatus::Error);
    }

    #[test]
    fn test_overlong_string_values_are_errors() {
        let long = "z".repeat(150);
        let vals = values(&[("banner", long.as_str()), ("short", "ok")]);
        let log = Check::Log {
            key: "banner".into(),
            name: None,
            unit: String::new(),
        };
        let step = check_step(&log, &vals).unwrap();
        assert_eq!(step.status(), StepStatus::Error);
        assert!(step.error_message().unwrap().contains("150 characters"));

        let string = Check::String {
            key: "banner".into(),
            name: None,
            op: "EQ".into(),
            expected: "z".into(),
        };
        assert_eq!(check_step(&string, &vals).unwrap().status(), StepStatus::Error);

        let exact = "y".repeat(100);
        let vals = values(&[("banner", exact.as_str())]);
        assert!(matches!(check_step(&log, &vals).unwrap().kind(), StepKind::StringValue(_)));
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nno hardware\n\n"), Some("no hardware".to_string()));
        assert_eq!(last_line("  \n"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute("sleep 5", dir.path(), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_collects_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = execute("echo vout=3.3; echo oops >&2; exit 3", dir.path(), None)
            .await
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "vout=3.3\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "oops\n");
    }
}
