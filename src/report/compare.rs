//! Comparison operators and their evaluation
//!
//! Operator codes are the ones the receiving service expects in `compOp`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

/// Compare a value `v` with a single limit `a`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryCompOp {
    /// v = a
    #[serde(rename = "EQ")]
    Equal,
    /// v ≠ a
    #[serde(rename = "NE")]
    NotEqual,
    /// v > a
    #[serde(rename = "GT")]
    GreaterThan,
    /// v ≥ a
    #[serde(rename = "GE")]
    GreaterOrEqual,
    /// v < a
    #[serde(rename = "LT")]
    LessThan,
    /// v ≤ a
    #[serde(rename = "LE")]
    LessOrEqual,
}

impl BinaryCompOp {
    pub const ALL: [BinaryCompOp; 6] = [
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::GreaterOrEqual,
        Self::LessThan,
        Self::LessOrEqual,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Equal => "EQ",
            Self::NotEqual => "NE",
            Self::GreaterThan => "GT",
            Self::GreaterOrEqual => "GE",
            Self::LessThan => "LT",
            Self::LessOrEqual => "LE",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "≠",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => "≥",
            Self::LessThan => "<",
            Self::LessOrEqual => "≤",
        }
    }

    /// Whether the receiving service evaluates this operator correctly for strings.
    ///
    /// Its documentation lists the ordering operators for string steps as
    /// well, but only equality and inequality give the right verdict.
    pub fn supports_strings(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    pub fn evaluate<T: PartialOrd + ?Sized>(self, value: &T, limit: &T) -> bool {
        match self {
            Self::Equal => value == limit,
            Self::NotEqual => value != limit,
            Self::GreaterThan => value > limit,
            Self::GreaterOrEqual => value >= limit,
            Self::LessThan => value < limit,
            Self::LessOrEqual => value <= limit,
        }
    }
}

/// Compare a value `v` with a low limit `a` and a high limit `b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TernaryCompOp {
    /// a < v < b
    #[serde(rename = "GTLT")]
    GreaterThanLessThan,
    /// a ≤ v ≤ b
    #[serde(rename = "GELE")]
    GreaterEqualLessEqual,
    /// a ≤ v < b
    #[serde(rename = "GELT")]
    GreaterEqualLessThan,
    /// a < v ≤ b
    #[serde(rename = "GTLE")]
    GreaterThanLessEqual,
    /// v ∉ [a, b]
    #[serde(rename = "LTGT")]
    LessThanGreaterThan,
    /// v ∉ (a, b)
    #[serde(rename = "LEGE")]
    LessEqualGreaterEqual,
    /// v ∉ (a, b]
    #[serde(rename = "LEGT")]
    LessEqualGreaterThan,
    /// v ∉ [a, b)
    #[serde(rename = "LTGE")]
    LessThanGreaterEqual,
}

impl TernaryCompOp {
    pub const ALL: [TernaryCompOp; 8] = [
        Self::GreaterThanLessThan,
        Self::GreaterEqualLessEqual,
        Self::GreaterEqualLessThan,
        Self::GreaterThanLessEqual,
        Self::LessThanGreaterThan,
        Self::LessEqualGreaterEqual,
        Self::LessEqualGreaterThan,
        Self::LessThanGreaterEqual,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::GreaterThanLessThan => "GTLT",
            Self::GreaterEqualLessEqual => "GELE",
            Self::GreaterEqualLessThan => "GELT",
            Self::GreaterThanLessEqual => "GTLE",
            Self::LessThanGreaterThan => "LTGT",
            Self::LessEqualGreaterEqual => "LEGE",
            Self::LessEqualGreaterThan => "LEGT",
            Self::LessThanGreaterEqual => "LTGE",
        }
    }

    /// Symbols placed between low limit, value and high limit when logging
    pub fn symbols(self) -> (&'static str, &'static str) {
        match self {
            Self::GreaterThanLessThan => ("<", "<"),
            Self::GreaterEqualLessEqual => ("≤", "≤"),
            Self::GreaterEqualLessThan => ("≤", "<"),
            Self::GreaterThanLessEqual => ("<", "≤"),
            Self::LessThanGreaterThan => (">", ">"),
            Self::LessEqualGreaterEqual => ("≥", "≥"),
            Self::LessEqualGreaterThan => ("≥", ">"),
            Self::LessThanGreaterEqual => (">", "≥"),
        }
    }

    pub fn evaluate(self, value: f64, low: f64, high: f64) -> bool {
        match self {
            Self::GreaterThanLessThan => low < value && value < high,
            Self::GreaterEqualLessEqual => low <= value && value <= high,
            Self::GreaterEqualLessThan => low <= value && value < high,
            Self::GreaterThanLessEqual => low < value && value <= high,
            Self::LessThanGreaterThan => value < low || high < value,
            Self::LessEqualGreaterEqual => value <= low || high <= value,
            Self::LessEqualGreaterThan => value <= low || high < value,
            Self::LessThanGreaterEqual => value < low || high <= value,
        }
    }
}

/// Case handling for string comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringCaseOp {
    #[serde(rename = "CASESENSIT")]
    CaseSensitive,
    #[serde(rename = "IGNORECASE")]
    IgnoreCase,
}

impl StringCaseOp {
    pub fn code(self) -> &'static str {
        match self {
            Self::CaseSensitive => "CASESENSIT",
            Self::IgnoreCase => "IGNORECASE",
        }
    }

    pub fn evaluate(self, value: &str, limit: &str) -> bool {
        match self {
            Self::CaseSensitive => value == limit,
            Self::IgnoreCase => value.to_lowercase() == limit.to_lowercase(),
        }
    }
}

/// `compOp` code of a measurement that only records a value
pub const LOG_CODE: &str = "LOG";

macro_rules! code_parsing {
    ($ty:ty, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let upper = s.trim().to_ascii_uppercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|op| op.code() == upper)
                    .ok_or_else(|| Error::Validation(format!("unknown {} operator `{}`", $what, s)))
            }
        }
    };
}

code_parsing!(BinaryCompOp, "binary");
code_parsing!(TernaryCompOp, "ternary");

impl StringCaseOp {
    pub const ALL: [StringCaseOp; 2] = [Self::CaseSensitive, Self::IgnoreCase];
}

code_parsing!(StringCaseOp, "string case");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_numeric() {
        assert!(BinaryCompOp::Equal.evaluate(&1.0, &1.0));
        assert!(BinaryCompOp::NotEqual.evaluate(&1.1, &1.0));
        assert!(BinaryCompOp::GreaterThan.evaluate(&2.0, &1.0));
        assert!(BinaryCompOp::GreaterOrEqual.evaluate(&1.0, &1.0));
        assert!(!BinaryCompOp::LessThan.evaluate(&1.0, &1.0));
        assert!(BinaryCompOp::LessOrEqual.evaluate(&1.0, &1.0));
    }

    #[test]
    fn test_ternary_boundaries() {
        use TernaryCompOp::*;
        assert!(GreaterThanLessThan.evaluate(1.5, 1.0, 2.0));
        assert!(!GreaterThanLessThan.evaluate(1.0, 1.0, 2.0));
        assert!(GreaterEqualLessEqual.evaluate(1.0, 1.0, 2.0));
        assert!(GreaterEqualLessThan.evaluate(1.99, 1.0, 2.0));
        assert!(!GreaterEqualLessThan.evaluate(2.0, 1.0, 2.0));
        assert!(GreaterThanLessEqual.evaluate(2.0, 1.0, 2.0));
        assert!(LessThanGreaterThan.evaluate(0.9, 1.0, 2.0));
        assert!(!LessThanGreaterThan.evaluate(1.0, 1.0, 2.0));
        assert!(LessEqualGreaterEqual.evaluate(1.0, 1.0, 2.0));
        assert!(LessEqualGreaterThan.evaluate(2.1, 1.0, 2.0));
        assert!(!LessEqualGreaterThan.evaluate(2.0, 1.0, 2.0));
        assert!(LessThanGreaterEqual.evaluate(2.0, 1.0, 2.0));
    }

    #[test]
    fn test_case_comparison() {
        assert!(!StringCaseOp::CaseSensitive.evaluate("hello", "Hello"));
        assert!(StringCaseOp::IgnoreCase.evaluate("hello", "Hello"));
    }

    #[test]
    fn test_only_equality_supports_strings() {
        let supported: Vec<_> = BinaryCompOp::ALL
            .iter()
            .filter(|op| op.supports_strings())
            .collect();
        assert_eq!(supported, vec![&BinaryCompOp::Equal, &BinaryCompOp::NotEqual]);
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("gele".parse::<TernaryCompOp>().unwrap(), TernaryCompOp::GreaterEqualLessEqual);
        assert_eq!("NE".parse::<BinaryCompOp>().unwrap(), BinaryCompOp::NotEqual);
        assert_eq!("IGNORECASE".parse::<StringCaseOp>().unwrap(), StringCaseOp::IgnoreCase);
        assert!("greater_than".parse::<BinaryCompOp>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_codes() {
        let json = serde_json::to_string(&TernaryCompOp::LessThanGreaterEqual).unwrap();
        assert_eq!(json, "\"LTGE\"");
    }
}
