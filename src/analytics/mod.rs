//! Filter layer, aggregation engine and KPI calculator.
//!
//! All of it reads the cleaned set through shared references. Nothing here
//! holds state between calls except [`DashboardCache`], whose key is the
//! filter tuple.

pub mod aggregate;
pub mod cache;
pub mod dimension;
pub mod filter;
pub mod kpi;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{
    aggregate, AggregateRow, Aggregation, DailyRevenue, MarginRow, MonthlyRevenue,
    PaymentMethodRow, ShareSlice,
};
pub use cache::{CacheStats, DashboardCache};
pub use dimension::{Dimension, DimensionCatalog};
pub use filter::{DateRange, FilterSet, Predicate};
pub use kpi::KpiSet;
pub use view::{DashboardView, DatasetInfo};
