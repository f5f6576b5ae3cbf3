//! Transaction records and the value types shared by every pipeline stage.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// FIXED-POINT AMOUNT
// =============================================================================

/// Fixed-point money amount with 4 decimal places.
/// Sums over amounts are exact, so partitioned totals always add back up.
pub type Amount = i128;

/// Conversion factor: 1 currency unit = 10_000 amount units
pub const AMOUNT_SCALE: i128 = 10_000;

/// Convert f64 to fixed-point Amount.
#[inline]
pub fn to_amount(value: f64) -> Amount {
    (value * AMOUNT_SCALE as f64).round() as Amount
}

/// Largest magnitude, in currency units, accepted from a record source.
/// Keeps every amount and every batch sum well inside `i128`.
pub const MAX_ABS_AMOUNT: f64 = 1e15;

/// Checked conversion for untrusted input: `None` for NaN, infinities and
/// magnitudes above [`MAX_ABS_AMOUNT`].
#[inline]
pub fn try_to_amount(value: f64) -> Option<Amount> {
    if value.is_finite() && value.abs() <= MAX_ABS_AMOUNT {
        Some(to_amount(value))
    } else {
        None
    }
}

/// Convert fixed-point Amount to f64.
#[inline]
pub fn from_amount(amount: Amount) -> f64 {
    amount as f64 / AMOUNT_SCALE as f64
}

/// Serde adapter that writes an [`Amount`] as a plain decimal number.
pub mod amount_serde {
    use super::{from_amount, to_amount, Amount};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(from_amount(*amount))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        f64::deserialize(deserializer).map(to_amount)
    }
}

// =============================================================================
// CALENDAR
// =============================================================================

/// Calendar month, rendered as a fixed English 3-letter abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    /// Canonical Jan→Dec ordering.
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    pub fn from_date(date: NaiveDate) -> Self {
        // month0() is always 0..=11
        Self::ALL[date.month0() as usize]
    }

    /// 1-based month number.
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn quarter(self) -> Quarter {
        match self.number().div_ceil(3) {
            1 => Quarter::Q1,
            2 => Quarter::Q2,
            3 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn as_str(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Ground-truth defect tag attached by the record source.
/// Only tests look at it; the cleaning stages never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFlag {
    #[default]
    None,
    Duplicate,
    MissingValue,
    NegativeValue,
    Outlier,
}

impl IssueFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueFlag::None => "none",
            IssueFlag::Duplicate => "duplicate",
            IssueFlag::MissingValue => "missing_value",
            IssueFlag::NegativeValue => "negative_value",
            IssueFlag::Outlier => "outlier",
        }
    }

    /// Parse a tag as written by the CSV exporter. Empty means no issue.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(IssueFlag::None),
            "duplicate" => Some(IssueFlag::Duplicate),
            "missing_value" | "missing" => Some(IssueFlag::MissingValue),
            "negative_value" | "negative" => Some(IssueFlag::NegativeValue),
            "outlier" => Some(IssueFlag::Outlier),
            _ => None,
        }
    }

    /// Like [`IssueFlag::parse`], but an unrecognized tag reads as no issue.
    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            tracing::debug!(tag = raw, "unrecognized issue_flag, reading as none");
            IssueFlag::None
        })
    }
}

/// A raw sales transaction as supplied by a record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub category: String,
    pub region: String,
    pub channel: String,
    pub customer_segment: String,
    pub quantity: i64,
    #[serde(with = "amount_serde")]
    pub unit_price: Amount,
    #[serde(with = "amount_serde")]
    pub revenue: Amount,
    #[serde(with = "amount_serde")]
    pub cost: Amount,
    #[serde(with = "amount_serde")]
    pub profit: Amount,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Rating on a 1-5 scale
    #[serde(default)]
    pub customer_satisfaction: Option<f64>,
    #[serde(default)]
    pub issue_flag: IssueFlag,
}

impl Transaction {
    pub fn has_missing_fields(&self) -> bool {
        is_missing(&self.category) || is_missing(&self.customer_segment)
    }

    pub fn has_negative_values(&self) -> bool {
        self.quantity < 0 || self.revenue < 0
    }

    /// Whether `profit == revenue - cost` still holds.
    ///
    /// Negative-value normalization flips `revenue` without touching `cost` or
    /// `profit`, so corrected records usually fail this check.
    pub fn profit_is_consistent(&self) -> bool {
        self.revenue.checked_sub(self.cost) == Some(self.profit)
    }
}

/// A string field counts as missing when it is blank after trimming.
#[inline]
pub fn is_missing(value: &str) -> bool {
    value.trim().is_empty()
}

/// A transaction that survived cleaning, with derived fields attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    /// Profit as a percentage of revenue, 2 dp. `None` when revenue is zero.
    pub profit_margin: Option<f64>,
    pub month: Month,
    pub quarter: Quarter,
}

impl CleanedTransaction {
    pub fn id(&self) -> i64 {
        self.transaction.id
    }

    pub fn date(&self) -> NaiveDate {
        self.transaction.date
    }

    pub fn revenue(&self) -> Amount {
        self.transaction.revenue
    }

    pub fn profit(&self) -> Amount {
        self.transaction.profit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_conversion() {
        assert_eq!(to_amount(1.0), AMOUNT_SCALE);
        assert_eq!(to_amount(12.345), 123_450);
        assert_eq!(to_amount(-60.0), -600_000);
        assert_eq!(from_amount(AMOUNT_SCALE / 2), 0.5);
    }

    #[test]
    fn test_try_to_amount_range() {
        assert_eq!(try_to_amount(12.5), Some(125_000));
        assert_eq!(try_to_amount(-MAX_ABS_AMOUNT), Some(to_amount(-MAX_ABS_AMOUNT)));
        assert_eq!(try_to_amount(1e34), None);
        assert_eq!(try_to_amount(f64::NAN), None);
        assert_eq!(try_to_amount(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_month_and_quarter() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(Month::from_date(date), Month::Mar);
        assert_eq!(Month::Mar.quarter(), Quarter::Q1);
        assert_eq!(Month::Apr.quarter(), Quarter::Q2);
        assert_eq!(Month::Sep.quarter(), Quarter::Q3);
        assert_eq!(Month::Oct.quarter(), Quarter::Q4);
        assert_eq!(Month::Dec.quarter(), Quarter::Q4);
        assert_eq!(Month::Dec.number(), 12);
        assert_eq!(Month::Jul.to_string(), "Jul");
    }

    #[test]
    fn test_issue_flag_parse() {
        assert_eq!(IssueFlag::parse(""), Some(IssueFlag::None));
        assert_eq!(IssueFlag::parse("Outlier"), Some(IssueFlag::Outlier));
        assert_eq!(IssueFlag::parse("bogus"), None);
        assert_eq!(IssueFlag::parse_lenient("price_error"), IssueFlag::None);
        assert_eq!(IssueFlag::parse_lenient(" duplicate "), IssueFlag::Duplicate);
    }

    #[test]
    fn test_missing_detection() {
        assert!(is_missing(""));
        assert!(is_missing("   "));
        assert!(!is_missing("Books"));
    }
}
