//! Filter layer
//!
//! A [`FilterSet`] is a tuple of predicates ANDed together. It borrows from the
//! cleaned set and never copies or mutates records, so applying the same filters
//! to the same set always yields the same working set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::dimension::{Dimension, DimensionCatalog};
use crate::error::PipelineError;
use crate::models::CleanedTransaction;

/// Equality predicate over one dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Match-all; the sentinel value maps here.
    #[default]
    All,
    Equals(String),
    OneOf(BTreeSet<String>),
}

impl Predicate {
    /// Build from selected values. No values, or any value equal to the
    /// match-all sentinel, yields [`Predicate::All`].
    pub fn from_values<I, S>(values: I, sentinel: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = BTreeSet::new();
        for value in values {
            let value = value.as_ref().trim();
            if value == sentinel {
                return Predicate::All;
            }
            selected.insert(value.to_string());
        }
        match selected.len() {
            0 => Predicate::All,
            1 => selected
                .into_iter()
                .next()
                .map(Predicate::Equals)
                .unwrap_or_default(),
            _ => Predicate::OneOf(selected),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals(expected) => expected == value,
            Predicate::OneOf(set) => set.contains(value),
        }
    }

    fn values(&self) -> Vec<&str> {
        match self {
            Predicate::All => Vec::new(),
            Predicate::Equals(value) => vec![value.as_str()],
            Predicate::OneOf(set) => set.iter().map(String::as_str).collect(),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::config(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// The full predicate tuple. Also the key of the dashboard cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    pub region: Predicate,
    pub category: Predicate,
    pub channel: Predicate,
    pub customer_segment: Predicate,
    pub date_range: Option<DateRange>,
}

impl FilterSet {
    /// No restriction at all.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, predicate: Predicate) -> Self {
        self.region = predicate;
        self
    }

    pub fn with_category(mut self, predicate: Predicate) -> Self {
        self.category = predicate;
        self
    }

    pub fn with_channel(mut self, predicate: Predicate) -> Self {
        self.channel = predicate;
        self
    }

    pub fn with_customer_segment(mut self, predicate: Predicate) -> Self {
        self.customer_segment = predicate;
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    fn predicates(&self) -> [(Dimension, &Predicate); 4] {
        [
            (Dimension::Region, &self.region),
            (Dimension::Category, &self.category),
            (Dimension::Channel, &self.channel),
            (Dimension::CustomerSegment, &self.customer_segment),
        ]
    }

    pub fn is_match_all(&self) -> bool {
        self.date_range.is_none()
            && self
                .predicates()
                .iter()
                .all(|(_, p)| matches!(p, Predicate::All))
    }

    pub fn matches(&self, record: &CleanedTransaction) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(record.date()) {
                return false;
            }
        }
        self.predicates()
            .iter()
            .all(|(dimension, predicate)| predicate.matches(dimension.key(record)))
    }

    /// The working set: every matching record, in cleaned-set order.
    pub fn apply<'a>(&self, records: &'a [CleanedTransaction]) -> Vec<&'a CleanedTransaction> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Reject predicate values the catalog has never seen.
    pub fn validate(&self, catalog: &DimensionCatalog) -> Result<(), PipelineError> {
        for (dimension, predicate) in self.predicates() {
            for value in predicate.values() {
                if !catalog.contains(dimension, value) {
                    return Err(PipelineError::UnknownDimensionValue {
                        dimension: dimension.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::{cleaned, date};

    fn sample() -> Vec<CleanedTransaction> {
        vec![
            cleaned(1, "Electronics", "North", "Online", "Premium", date(2024, 1, 5), 100.0, 20.0),
            cleaned(2, "Books", "North", "In-Store", "Budget", date(2024, 2, 5), 50.0, 10.0),
            cleaned(3, "Electronics", "South", "Online", "Regular", date(2024, 3, 5), 80.0, 16.0),
            cleaned(4, "Clothing", "East", "Mobile App", "Premium", date(2024, 4, 5), 30.0, 6.0),
        ]
    }

    fn ids(records: &[&CleanedTransaction]) -> Vec<i64> {
        records.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn test_sentinel_is_noop() {
        let records = sample();
        let filters = FilterSet::all()
            .with_region(Predicate::from_values(["All"], "All"))
            .with_category(Predicate::from_values(Vec::<String>::new(), "All"));
        assert!(filters.is_match_all());
        assert_eq!(filters.apply(&records).len(), 4);
    }

    #[test]
    fn test_predicates_are_anded() {
        let records = sample();
        let filters = FilterSet::all()
            .with_region(Predicate::Equals("North".to_string()))
            .with_category(Predicate::Equals("Electronics".to_string()));
        assert_eq!(ids(&filters.apply(&records)), vec![1]);
    }

    #[test]
    fn test_one_of_and_date_range() {
        let records = sample();
        let filters = FilterSet::all()
            .with_category(Predicate::from_values(["Electronics", "Clothing"], "All"))
            .with_date_range(DateRange::new(date(2024, 1, 5), date(2024, 3, 5)).unwrap());
        assert_eq!(ids(&filters.apply(&records)), vec![1, 3]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let records = sample();
        let filters = FilterSet::all().with_channel(Predicate::Equals("Online".to_string()));
        let first = ids(&filters.apply(&records));
        let second = ids(&filters.apply(&records));
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 3]);
    }

    #[test]
    fn test_empty_working_set() {
        let filters = FilterSet::all().with_region(Predicate::Equals("North".to_string()));
        assert!(filters.apply(&[]).is_empty());
    }

    #[test]
    fn test_validate_against_catalog() {
        let records = sample();
        let catalog = DimensionCatalog::from_records(&records);
        let ok = FilterSet::all().with_region(Predicate::Equals("South".to_string()));
        assert!(ok.validate(&catalog).is_ok());

        let bad = FilterSet::all()
            .with_category(Predicate::from_values(["Books", "Garden Gnomes"], "All"));
        assert_eq!(
            bad.validate(&catalog),
            Err(PipelineError::UnknownDimensionValue {
                dimension: "category".to_string(),
                value: "Garden Gnomes".to_string(),
            })
        );
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        assert!(DateRange::new(date(2024, 5, 1), date(2024, 4, 1)).is_err());
    }
}
