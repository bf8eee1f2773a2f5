//! Monthly usage validation and aggregation.
//!
//! Clients send a loose `month -> quantity` map. Values that are negative,
//! not finite or not numbers at all are kept as zero instead of failing the
//! request; keys that are not a month in `1..=12` are dropped. Both cases are reported as issues so
//! callers can log or display them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Raw client input, keyed by month string (`"1"` .. `"12"`). Values are
/// whatever JSON the client sent.
pub type RawMonthly = BTreeMap<String, Value>;

/// A problem found while normalizing raw monthly input.
#[derive(Debug, Clone, PartialEq)]
pub enum MonthlyIssue {
    /// The key does not parse to a month in `1..=12`. The entry is dropped.
    InvalidMonth(String),
    /// The value is negative, not finite or not a number. It is stored as zero.
    InvalidValue { month: u8, value: Value },
}

impl std::fmt::Display for MonthlyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMonth(key) => write!(f, "'{key}' is not a month between 1 and 12"),
            Self::InvalidValue { month, value } => {
                write!(f, "month {month} has invalid quantity {value}, counted as 0")
            }
        }
    }
}

/// Validated monthly quantities. Every key is a month in `1..=12` and every
/// value is finite and non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlyUsage(BTreeMap<u8, f64>);

impl MonthlyUsage {
    /// Normalizes raw input. Never fails; see [`MonthlyIssue`].
    pub fn from_raw(raw: &RawMonthly) -> (Self, Vec<MonthlyIssue>) {
        let mut months = BTreeMap::new();
        let mut issues = Vec::new();

        for (key, value) in raw {
            let month = match key.trim().parse::<u8>() {
                Ok(m) if (1..=12).contains(&m) => m,
                _ => {
                    issues.push(MonthlyIssue::InvalidMonth(key.clone()));
                    continue;
                }
            };
            let quantity = match quantity(value) {
                Some(q) if q.is_finite() && q >= 0.0 => q,
                _ => {
                    issues.push(MonthlyIssue::InvalidValue {
                        month,
                        value: value.clone(),
                    });
                    0.0
                }
            };
            months.insert(month, quantity);
        }

        (Self(months), issues)
    }

    pub fn get(&self, month: u8) -> Option<f64> {
        self.0.get(&month).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    /// Sum of all quantities, rounded to two decimals.
    pub fn total(&self) -> f64 {
        let sum: f64 = self.0.values().sum();
        (sum * 100.0).round() / 100.0
    }

    /// Fails unless the aggregate is strictly positive.
    pub fn require_positive_total(&self) -> Result<f64, CoreError> {
        let total = self.total();
        if total > 0.0 {
            Ok(total)
        } else {
            Err(CoreError::validation("total usage must exceed zero"))
        }
    }

    /// String-keyed form used for API responses.
    pub fn to_raw(&self) -> BTreeMap<String, f64> {
        self.0.iter().map(|(m, v)| (m.to_string(), *v)).collect()
    }
}

/// Numbers and numeric strings count; anything else does not.
fn quantity(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl FromIterator<(u8, f64)> for MonthlyUsage {
    fn from_iter<I: IntoIterator<Item = (u8, f64)>>(iter: I) -> Self {
        let mut months = BTreeMap::new();
        for (month, value) in iter {
            if (1..=12).contains(&month) && value.is_finite() && value >= 0.0 {
                *months.entry(month).or_insert(0.0) += value;
            }
        }
        Self(months)
    }
}
