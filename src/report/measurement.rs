//! Measurements recorded by limit steps
//!
//! Every measurement evaluates its own status when it is constructed, so a
//! step's verdict is a pure function of the measurements it holds.

use tracing::{debug, warn};

use super::compare::{BinaryCompOp, StringCaseOp, TernaryCompOp, LOG_CODE};
use super::status::MeasurementStatus;
use crate::common::{Error, Result};

/// Behaviour shared by the measurement kinds, used to validate measurement sets
pub trait Measurement {
    fn name(&self) -> Option<&str>;
    fn status(&self) -> MeasurementStatus;
}

/// How a numeric value was judged
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericComparison {
    /// Single limit, stored as the low limit on the wire
    Binary { op: BinaryCompOp, limit: f64 },
    /// Low and high limit
    Ternary { op: TernaryCompOp, low: f64, high: f64 },
    /// Value recorded without a limit
    Log,
}

impl NumericComparison {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Binary { op, .. } => op.code(),
            Self::Ternary { op, .. } => op.code(),
            Self::Log => LOG_CODE,
        }
    }

    pub fn low_limit(&self) -> Option<f64> {
        match self {
            Self::Binary { limit, .. } => Some(*limit),
            Self::Ternary { low, .. } => Some(*low),
            Self::Log => None,
        }
    }

    pub fn high_limit(&self) -> Option<f64> {
        match self {
            Self::Ternary { high, .. } => Some(*high),
            _ => None,
        }
    }

    fn evaluate(&self, value: f64) -> bool {
        match *self {
            Self::Binary { op, limit } => op.evaluate(&value, &limit),
            Self::Ternary { op, low, high } => op.evaluate(value, low, high),
            Self::Log => true,
        }
    }

    fn describe(&self, value: f64) -> String {
        match *self {
            Self::Binary { op, limit } => format!("{} {} {}", value, op.symbol(), limit),
            Self::Ternary { op, low, high } => {
                let (left, right) = op.symbols();
                format!("{} {} {} {} {}", low, left, value, right, high)
            }
            Self::Log => format!("{} (logged)", value),
        }
    }
}

/// A numeric value checked against limits
#[derive(Debug, Clone, PartialEq)]
pub struct NumericMeasurement {
    pub(crate) name: Option<String>,
    pub(crate) value: f64,
    pub(crate) unit: Option<String>,
    pub(crate) comparison: NumericComparison,
    pub(crate) status: MeasurementStatus,
}

impl NumericMeasurement {
    fn evaluated(value: f64, comparison: NumericComparison, unit: Option<String>) -> Self {
        let passed = comparison.evaluate(value);
        if passed {
            debug!("Measurement passed: {}", comparison.describe(value));
        } else {
            warn!("Measurement failed: {}", comparison.describe(value));
        }
        Self {
            name: None,
            value,
            unit,
            comparison,
            status: MeasurementStatus::from_verdict(passed),
        }
    }

    /// Compare `value` against a single `limit`
    pub fn binary(value: f64, limit: f64, op: BinaryCompOp, unit: impl Into<String>) -> Self {
        Self::evaluated(
            value,
            NumericComparison::Binary { op, limit },
            Some(unit.into()),
        )
    }

    /// Compare `value` against a low and a high limit
    pub fn ternary(
        value: f64,
        low: f64,
        high: f64,
        op: TernaryCompOp,
        unit: impl Into<String>,
    ) -> Self {
        Self::evaluated(
            value,
            NumericComparison::Ternary { op, low, high },
            Some(unit.into()),
        )
    }

    /// Record `value` without judging it
    pub fn log(value: f64, unit: impl Into<String>) -> Self {
        Self::evaluated(value, NumericComparison::Log, Some(unit.into()))
    }

    /// Name the measurement; required inside multiple-measurement steps
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the measurement as not evaluated
    pub fn skip(mut self) -> Self {
        self.status = MeasurementStatus::Skipped;
        self
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn comparison(&self) -> &NumericComparison {
        &self.comparison
    }
}

impl Measurement for NumericMeasurement {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> MeasurementStatus {
        self.status
    }
}

/// How a string value was judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringComparison {
    Binary(BinaryCompOp),
    Case(StringCaseOp),
    Log,
}

impl StringComparison {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Binary(op) => op.code(),
            Self::Case(op) => op.code(),
            Self::Log => LOG_CODE,
        }
    }
}

/// A string value compared with an expected string
#[derive(Debug, Clone, PartialEq)]
pub struct StringMeasurement {
    pub(crate) name: Option<String>,
    pub(crate) value: String,
    pub(crate) limit: Option<String>,
    pub(crate) comparison: StringComparison,
    pub(crate) status: MeasurementStatus,
}

impl StringMeasurement {
    /// Compare `value` with `limit` using equality or inequality
    ///
    /// Ordering operators are rejected: the receiving service does not
    /// evaluate them correctly for strings.
    pub fn binary(
        value: impl Into<String>,
        limit: impl Into<String>,
        op: BinaryCompOp,
    ) -> Result<Self> {
        if !op.supports_strings() {
            return Err(Error::Validation(format!(
                "operator {} is not supported for string values, use EQ or NE",
                op.code()
            )));
        }
        let value = value.into();
        let limit = limit.into();
        let passed = op.evaluate(value.as_str(), limit.as_str());
        Ok(Self::evaluated(value, Some(limit), StringComparison::Binary(op), passed))
    }

    /// Compare `value` with `limit` with or without regard to case
    pub fn case(value: impl Into<String>, limit: impl Into<String>, op: StringCaseOp) -> Self {
        let value = value.into();
        let limit = limit.into();
        let passed = op.evaluate(&value, &limit);
        Self::evaluated(value, Some(limit), StringComparison::Case(op), passed)
    }

    /// Record `value` without judging it
    pub fn log(value: impl Into<String>) -> Self {
        Self::evaluated(value.into(), None, StringComparison::Log, true)
    }

    fn evaluated(
        value: String,
        limit: Option<String>,
        comparison: StringComparison,
        passed: bool,
    ) -> Self {
        if passed {
            debug!("String measurement passed: {:?} {}", value, comparison.code());
        } else {
            warn!(
                "String measurement failed: {:?} {} {:?}",
                value,
                comparison.code(),
                limit.as_deref().unwrap_or_default()
            );
        }
        Self {
            name: None,
            value,
            limit,
            comparison,
            status: MeasurementStatus::from_verdict(passed),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn skip(mut self) -> Self {
        self.status = MeasurementStatus::Skipped;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn limit(&self) -> Option<&str> {
        self.limit.as_deref()
    }

    pub fn comparison(&self) -> StringComparison {
        self.comparison
    }
}

impl Measurement for StringMeasurement {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> MeasurementStatus {
        self.status
    }
}

/// A pass/fail verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanMeasurement {
    pub(crate) name: Option<String>,
    pub(crate) status: MeasurementStatus,
}

impl BooleanMeasurement {
    pub fn new(passed: bool) -> Self {
        Self {
            name: None,
            status: MeasurementStatus::from_verdict(passed),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn skip(mut self) -> Self {
        self.status = MeasurementStatus::Skipped;
        self
    }

    pub fn passed(&self) -> bool {
        self.status != MeasurementStatus::Failed
    }
}

impl Measurement for BooleanMeasurement {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> MeasurementStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ternary_in_range_passes() {
        let m = NumericMeasurement::ternary(5.0, 1.0, 10.0, TernaryCompOp::GreaterEqualLessEqual, "V");
        assert_eq!(m.status(), MeasurementStatus::Passed);
        assert_eq!(m.comparison().low_limit(), Some(1.0));
        assert_eq!(m.comparison().high_limit(), Some(10.0));
        assert_eq!(m.comparison().code(), "GELE");
    }

    #[test]
    fn test_binary_limit_is_low_limit() {
        let m = NumericMeasurement::binary(3.0, 2.0, BinaryCompOp::LessOrEqual, "mm");
        assert_eq!(m.status(), MeasurementStatus::Failed);
        assert_eq!(m.comparison().low_limit(), Some(2.0));
        assert_eq!(m.comparison().high_limit(), None);
    }

    #[test]
    fn test_log_always_passes() {
        let m = NumericMeasurement::log(1337.0, "rpm");
        assert_eq!(m.status(), MeasurementStatus::Passed);
        assert_eq!(m.comparison().code(), "LOG");
        assert_eq!(StringMeasurement::log("abc").status(), MeasurementStatus::Passed);
    }

    #[test]
    fn test_string_ordering_operators_rejected() {
        for op in [
            BinaryCompOp::GreaterThan,
            BinaryCompOp::GreaterOrEqual,
            BinaryCompOp::LessThan,
            BinaryCompOp::LessOrEqual,
        ] {
            let err = StringMeasurement::binary("b", "a", op).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{:?} should be rejected", op);
        }
    }

    #[test]
    fn test_string_equality() {
        let eq = StringMeasurement::binary("a", "a", BinaryCompOp::Equal).unwrap();
        assert_eq!(eq.status(), MeasurementStatus::Passed);
        let ne = StringMeasurement::binary("a", "a", BinaryCompOp::NotEqual).unwrap();
        assert_eq!(ne.status(), MeasurementStatus::Failed);
    }

    #[test]
    fn test_case_insensitive_string() {
        let m = StringMeasurement::case("HELLO", "hello", StringCaseOp::IgnoreCase).named("greeting");
        assert_eq!(m.status(), MeasurementStatus::Passed);
        assert_eq!(Measurement::name(&m), Some("greeting"));
    }

    #[test]
    fn test_boolean() {
        assert!(BooleanMeasurement::new(true).passed());
        assert_eq!(BooleanMeasurement::new(false).status(), MeasurementStatus::Failed);
    }
}
