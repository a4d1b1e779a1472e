//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::report::{BinaryCompOp, StringCaseOp, TernaryCompOp};

/// Exit code a test command uses to report that it skipped itself
pub const DEFAULT_SKIP_EXIT_CODE: i32 = 77;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the scenario, used as the root sequence name
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Optional setup steps to run before the tests (e.g., compilation)
    pub setup: Option<Vec<SetupStep>>,
    /// The tests to execute, in order
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// A setup step that runs before the tests
#[derive(Deserialize, Debug)]
pub struct SetupStep {
    /// Shell command to execute
    pub shell: String,
}

/// One test: a shell command whose exit status and output are judged
#[derive(Deserialize, Debug)]
pub struct TestCase {
    pub name: String,
    /// Shell command to execute
    pub run: String,
    /// Kill the command after this many seconds
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_skip_exit_code")]
    pub skip_exit_code: i32,
    /// Checks against `key=value` lines printed by the command
    #[serde(default)]
    pub checks: Vec<Check>,
}

fn default_skip_exit_code() -> i32 {
    DEFAULT_SKIP_EXIT_CODE
}

impl TestCase {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// A check against one value printed by a test command
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// Compare a number with one limit (`op: LT`) or two (`op: GELE`)
    Numeric {
        key: String,
        name: Option<String>,
        op: String,
        limit: Option<f64>,
        low: Option<f64>,
        high: Option<f64>,
        #[serde(default)]
        unit: String,
    },
    /// Compare a string with `EQ`, `NE`, `CASESENSIT` or `IGNORECASE`
    String {
        key: String,
        name: Option<String>,
        #[serde(default = "default_string_op")]
        op: String,
        expected: String,
    },
    /// Read the value as a boolean verdict
    PassFail { key: String, name: Option<String> },
    /// Record the value without judging it
    Log {
        key: String,
        name: Option<String>,
        #[serde(default)]
        unit: String,
    },
}

fn default_string_op() -> String {
    "EQ".to_string()
}

/// A numeric check operator together with its limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericRule {
    Binary { op: BinaryCompOp, limit: f64 },
    Ternary { op: TernaryCompOp, low: f64, high: f64 },
}

/// A string check operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRule {
    Binary(BinaryCompOp),
    Case(StringCaseOp),
}

impl Check {
    /// Output key the check reads
    pub fn key(&self) -> &str {
        match self {
            Check::Numeric { key, .. }
            | Check::String { key, .. }
            | Check::PassFail { key, .. }
            | Check::Log { key, .. } => key,
        }
    }

    /// Step name: the explicit name, or the key
    pub fn step_name(&self) -> &str {
        let name = match self {
            Check::Numeric { name, .. }
            | Check::String { name, .. }
            | Check::PassFail { name, .. }
            | Check::Log { name, .. } => name,
        };
        name.as_deref().unwrap_or_else(|| self.key())
    }

    pub fn numeric_rule(&self) -> Result<Option<NumericRule>> {
        let Check::Numeric {
            key,
            op,
            limit,
            low,
            high,
            ..
        } = self
        else {
            return Ok(None);
        };

        if let Ok(op) = BinaryCompOp::from_str(op) {
            let limit = limit.ok_or_else(|| {
                Error::Config(format!("check `{}`: operator {} needs `limit`", key, op))
            })?;
            return Ok(Some(NumericRule::Binary { op, limit }));
        }
        if let Ok(op) = TernaryCompOp::from_str(op) {
            let (Some(low), Some(high)) = (low, high) else {
                return Err(Error::Config(format!(
                    "check `{}`: operator {} needs `low` and `high`",
                    key, op
                )));
            };
            return Ok(Some(NumericRule::Ternary {
                op,
                low: *low,
                high: *high,
            }));
        }
        Err(Error::Config(format!(
            "check `{}`: unknown numeric operator `{}`",
            key, op
        )))
    }

    pub fn string_rule(&self) -> Result<Option<StringRule>> {
        let Check::String { key, op, .. } = self else {
            return Ok(None);
        };

        if let Ok(op) = StringCaseOp::from_str(op) {
            return Ok(Some(StringRule::Case(op)));
        }
        match BinaryCompOp::from_str(op) {
            Ok(op) if op.supports_strings() => Ok(Some(StringRule::Binary(op))),
            Ok(op) => Err(Error::Config(format!(
                "check `{}`: operator {} cannot compare strings, use EQ or NE",
                key, op
            ))),
            Err(_) => Err(Error::Config(format!(
                "check `{}`: unknown string operator `{}`",
                key, op
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.key().trim().is_empty() {
            return Err(Error::Config("check key must not be empty".to_string()));
        }
        fits("check name", self.step_name(), MAX_NAME)?;
        match self {
            Check::Numeric { unit, .. } | Check::Log { unit, .. } => fits("check unit", unit, MAX_UNIT)?,
            Check::String { expected, .. } => fits("expected value", expected, MAX_NAME)?,
            Check::PassFail { .. } => {}
        }
        self.numeric_rule()?;
        self.string_rule()?;
        Ok(())
    }
}

/// Longest step or sequence name a report accepts
const MAX_NAME: usize = 100;
const MAX_UNIT: usize = 20;

fn fits(what: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::Config(format!(
            "{} is {} characters, at most {} allowed: `{}`",
            what, len, max, value
        )));
    }
    Ok(())
}

impl TestScenario {
    pub fn parse(content: &str) -> Result<Self> {
        let scenario: TestScenario = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("scenario name must not be empty".to_string()));
        }
        fits("scenario name", &self.name, MAX_NAME)?;
        for test in &self.tests {
            if test.name.trim().is_empty() {
                return Err(Error::Config("test name must not be empty".to_string()));
            }
            fits("test name", &test.name, MAX_NAME)?;
            for check in &test.checks {
                check.validate()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name: Power board
description: Rail checks
setup:
  - shell: echo ready
tests:
  - name: rails
    run: ./measure.sh
    timeout_secs: 5
    checks:
      - type: numeric
        key: vout
        op: GELE
        low: 3.2
        high: 3.4
        unit: V
      - type: string
        key: fw
        expected: 1.2.0
      - type: pass_fail
        key: selftest
  - name: optional
    run: exit 77
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = TestScenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.name, "Power board");
        assert_eq!(scenario.setup.as_ref().unwrap().len(), 1);
        assert_eq!(scenario.tests.len(), 2);

        let rails = &scenario.tests[0];
        assert_eq!(rails.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(rails.skip_exit_code, DEFAULT_SKIP_EXIT_CODE);
        assert_eq!(
            rails.checks[0].numeric_rule().unwrap(),
            Some(NumericRule::Ternary {
                op: TernaryCompOp::GreaterEqualLessEqual,
                low: 3.2,
                high: 3.4
            })
        );
        assert_eq!(
            rails.checks[1].string_rule().unwrap(),
            Some(StringRule::Binary(BinaryCompOp::Equal))
        );
        assert_eq!(rails.checks[2].step_name(), "selftest");
        assert!(scenario.tests[1].checks.is_empty());
    }

    #[test]
    fn test_binary_needs_limit() {
        let check = Check::Numeric {
            key: "i".into(),
            name: None,
            op: "lt".into(),
            limit: None,
            low: None,
            high: None,
            unit: String::new(),
        };
        assert!(matches!(check.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_string_ordering_rejected() {
        let yaml = r#"
name: s
tests:
  - name: t
    run: "true"
    checks:
      - type: string
        key: fw
        op: GT
        expected: "1"
"#;
        let err = TestScenario::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("use EQ or NE"));
    }

    #[test]
    fn test_unknown_check_type() {
        let yaml = r#"
name: s
tests:
  - name: t
    run: "true"
    checks:
      - type: histogram
        key: x
"#;
        assert!(matches!(TestScenario::parse(yaml), Err(Error::Config(_))));
    }

    #[test]
    fn test_names_longer_than_a_step_name_rejected() {
        let long = "x".repeat(101);
        let ok = "x".repeat(100);

        let scenario = SCENARIO.replace("name: rails", &format!("name: {}", ok));
        assert!(TestScenario::parse(&scenario).is_ok());

        let scenario = SCENARIO.replace("name: rails", &format!("name: {}", long));
        let err = TestScenario::parse(&scenario).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("test name")));

        let scenario = SCENARIO.replace("key: selftest", &format!("key: selftest\n        name: {}", long));
        let err = TestScenario::parse(&scenario).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("check name")));

        let scenario = SCENARIO.replace("key: selftest", &format!("key: {}", long));
        assert!(TestScenario::parse(&scenario).is_err());

        let scenario = SCENARIO.replace("unit: V", &format!("unit: {}", "m".repeat(21)));
        assert!(TestScenario::parse(&scenario).is_err());
    }
}
