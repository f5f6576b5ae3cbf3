//! Grouping dimensions and their known value sets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::models::{CleanedTransaction, Month};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Region,
    Month,
    Channel,
    CustomerSegment,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Category,
        Dimension::Region,
        Dimension::Month,
        Dimension::Channel,
        Dimension::CustomerSegment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Region => "region",
            Dimension::Month => "month",
            Dimension::Channel => "channel",
            Dimension::CustomerSegment => "customer_segment",
        }
    }

    /// The record's value along this dimension.
    pub fn key<'a>(&self, record: &'a CleanedTransaction) -> &'a str {
        let tx = &record.transaction;
        match self {
            Dimension::Category => &tx.category,
            Dimension::Region => &tx.region,
            Dimension::Month => record.month.as_str(),
            Dimension::Channel => &tx.channel,
            Dimension::CustomerSegment => &tx.customer_segment,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "category" => Ok(Dimension::Category),
            "region" => Ok(Dimension::Region),
            "month" => Ok(Dimension::Month),
            "channel" => Ok(Dimension::Channel),
            "customer_segment" | "segment" => Ok(Dimension::CustomerSegment),
            other => Err(format!(
                "unknown dimension '{}' (expected category, region, month, channel or segment)",
                other
            )),
        }
    }
}

/// Known values per dimension, taken from a cleaned set.
///
/// Months always carry the full Jan…Dec domain regardless of data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DimensionCatalog {
    values: BTreeMap<Dimension, BTreeSet<String>>,
}

impl DimensionCatalog {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Self {
        let mut values: BTreeMap<Dimension, BTreeSet<String>> = BTreeMap::new();
        values.insert(
            Dimension::Month,
            Month::ALL.iter().map(|m| m.as_str().to_string()).collect(),
        );
        for record in records {
            for dimension in Dimension::ALL {
                if dimension == Dimension::Month {
                    continue;
                }
                let key = dimension.key(record);
                let set = values.entry(dimension).or_default();
                if !set.contains(key) {
                    set.insert(key.to_string());
                }
            }
        }
        Self { values }
    }

    pub fn contains(&self, dimension: Dimension, value: &str) -> bool {
        self.values
            .get(&dimension)
            .is_some_and(|set| set.contains(value))
    }

    /// Sorted known values; empty when the dimension never appeared.
    pub fn values(&self, dimension: Dimension) -> Vec<&str> {
        self.values
            .get(&dimension)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
