//! Seeded synthetic transactions with injected defects.
//!
//! Every draw goes through one seeded `ChaCha8Rng`, so a given
//! [`SyntheticConfig`] always yields the same batch. Each injected defect is
//! tagged in `issue_flag` for tests to check against.

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{RecordSource, SourceBatch};
use crate::config::SyntheticConfig;
use crate::error::PipelineError;
use crate::models::{from_amount, to_amount, IssueFlag, Transaction};

/// Category name with its unit price range.
const CATEGORIES: [(&str, f64, f64); 6] = [
    ("Electronics", 50.0, 1500.0),
    ("Clothing", 10.0, 200.0),
    ("Home & Garden", 15.0, 400.0),
    ("Sports", 10.0, 300.0),
    ("Books", 5.0, 60.0),
    ("Beauty", 5.0, 120.0),
];
const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];
const CHANNELS: [&str; 3] = ["Online", "In-Store", "Mobile App"];
const SEGMENTS: [&str; 4] = ["Premium", "Regular", "Budget", "Corporate"];
const PAYMENT_METHODS: [&str; 4] = ["Credit Card", "Debit Card", "Cash", "Digital Wallet"];

const FIRST_ID: i64 = 1000;

pub struct SyntheticSource {
    config: SyntheticConfig,
    start_date: NaiveDate,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let start_date = NaiveDate::parse_from_str(&config.start_date, "%Y-%m-%d")
            .map_err(|e| PipelineError::config(format!("synthetic.start_date: {}", e)))?;
        Ok(Self { config, start_date })
    }

    /// Generate the full batch: base records first, then re-emitted duplicates.
    pub fn generate(&self) -> Vec<Transaction> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut records = Vec::with_capacity(
            self.config.records + (self.config.records as f64 * self.config.duplicate_rate) as usize,
        );

        for offset in 0..self.config.records {
            let mut record = self.base_record(&mut rng, FIRST_ID + offset as i64);
            self.inject_defect(&mut rng, &mut record);
            records.push(record);
        }

        let mut duplicates = Vec::new();
        for record in &records {
            if rng.gen_bool(self.config.duplicate_rate) {
                let mut copy = record.clone();
                copy.issue_flag = IssueFlag::Duplicate;
                duplicates.push(copy);
            }
        }
        records.extend(duplicates);

        info!(
            seed = self.config.seed,
            generated = records.len(),
            "synthetic batch generated"
        );
        records
    }

    fn base_record(&self, rng: &mut ChaCha8Rng, id: i64) -> Transaction {
        let &(category, min_price, max_price) = CATEGORIES
            .choose(rng)
            .unwrap_or(&CATEGORIES[0]);
        let date = self.start_date
            + Duration::days(rng.gen_range(0..self.config.span_days) as i64);

        let quantity: i64 = rng.gen_range(1..=10);
        let unit_price = round_cents(rng.gen_range(min_price..max_price));
        let revenue = round_cents(unit_price * quantity as f64);
        let cost = round_cents(revenue * rng.gen_range(0.4..0.8));

        Transaction {
            id,
            date,
            category: category.to_string(),
            region: pick(rng, &REGIONS),
            channel: pick(rng, &CHANNELS),
            customer_segment: pick(rng, &SEGMENTS),
            quantity,
            unit_price: to_amount(unit_price),
            revenue: to_amount(revenue),
            cost: to_amount(cost),
            profit: to_amount(revenue) - to_amount(cost),
            payment_method: Some(pick(rng, &PAYMENT_METHODS)),
            customer_satisfaction: Some(rng.gen_range(1..=5) as f64),
            issue_flag: IssueFlag::None,
        }
    }

    /// At most one defect per record; the rates partition a single draw.
    fn inject_defect(&self, rng: &mut ChaCha8Rng, record: &mut Transaction) {
        let roll: f64 = rng.gen();
        let missing_cut = self.config.missing_rate;
        let negative_cut = missing_cut + self.config.negative_rate;
        let outlier_cut = negative_cut + self.config.outlier_rate;

        if roll < missing_cut {
            if rng.gen_bool(0.5) {
                record.category.clear();
            } else {
                record.customer_segment.clear();
            }
            record.issue_flag = IssueFlag::MissingValue;
        } else if roll < negative_cut {
            record.quantity = -record.quantity;
            record.revenue = -record.revenue;
            record.profit = record.revenue - record.cost;
            record.issue_flag = IssueFlag::NegativeValue;
        } else if roll < outlier_cut {
            let factor: f64 = rng.gen_range(10.0..20.0);
            record.revenue = to_amount(round_cents(from_amount(record.revenue) * factor));
            record.profit = record.revenue - record.cost;
            record.issue_flag = IssueFlag::Outlier;
        }
    }
}

impl RecordSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn load(&mut self) -> Result<Option<SourceBatch>, PipelineError> {
        Ok(Some(SourceBatch::from_records(self.generate())))
    }
}

fn pick(rng: &mut ChaCha8Rng, values: &[&str]) -> String {
    values.choose(rng).copied().unwrap_or_default().to_string()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
