//! Everything a dashboard shows for one filter tuple.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use super::aggregate::{
    by_category, by_channel, by_month, by_payment_method, by_region, by_segment, daily_revenue,
    margin_by_category, monthly_revenue, AggregateRow, DailyRevenue, MarginRow, MonthlyRevenue,
    PaymentMethodRow, ShareSlice,
};
use super::filter::FilterSet;
use super::kpi::KpiSet;
use crate::models::CleanedTransaction;

/// Summary of the working set's extent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub categories: usize,
    pub regions: usize,
}

impl DatasetInfo {
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Self {
        let mut info = Self::default();
        let mut categories = HashSet::new();
        let mut regions = HashSet::new();
        for record in records {
            info.records += 1;
            let date = record.date();
            info.first_date = Some(info.first_date.map_or(date, |d| d.min(date)));
            info.last_date = Some(info.last_date.map_or(date, |d| d.max(date)));
            categories.insert(record.transaction.category.as_str());
            regions.insert(record.transaction.region.as_str());
        }
        info.categories = categories.len();
        info.regions = regions.len();
        info
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filters: FilterSet,
    pub info: DatasetInfo,
    pub kpis: KpiSet,
    pub by_category: Vec<AggregateRow>,
    pub by_region: Vec<AggregateRow>,
    pub by_month: Vec<AggregateRow>,
    pub by_channel: Vec<ShareSlice>,
    pub by_segment: Vec<AggregateRow>,
    pub margin_by_category: Vec<MarginRow>,
    pub by_payment_method: Vec<PaymentMethodRow>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

impl DashboardView {
    /// Filter `records` and compute every summary over the result.
    pub fn build(records: &[CleanedTransaction], filters: &FilterSet) -> Self {
        let matched = filters.apply(records);
        let working = || matched.iter().copied();

        Self {
            filters: filters.clone(),
            info: DatasetInfo::compute(working()),
            kpis: KpiSet::compute(working()),
            by_category: by_category(working()),
            by_region: by_region(working()),
            by_month: by_month(working()),
            by_channel: by_channel(working()),
            by_segment: by_segment(working()),
            margin_by_category: margin_by_category(working()),
            by_payment_method: by_payment_method(working()),
            daily_revenue: daily_revenue(working()),
            monthly_revenue: monthly_revenue(working()),
        }
    }
}
