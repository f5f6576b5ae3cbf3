//! Keyed memoization of dashboard views.
//!
//! Key: the full [`FilterSet`]. A cache is bound to one cleaned set; swapping
//! in a new set through [`DashboardCache::reset`] drops every entry. Nothing
//! else invalidates, because the cleaned set it holds never changes.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::filter::FilterSet;
use super::view::DashboardView;
use crate::etl::EtlOutcome;
use crate::models::CleanedTransaction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct DashboardCache {
    records: Arc<[CleanedTransaction]>,
    entries: RwLock<HashMap<FilterSet, Arc<DashboardView>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DashboardCache {
    pub fn new(records: Arc<[CleanedTransaction]>) -> Self {
        Self {
            records,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_outcome(outcome: &EtlOutcome) -> Self {
        Self::new(outcome.shared_records())
    }

    pub fn records(&self) -> &[CleanedTransaction] {
        &self.records
    }

    /// Cached view for `filters`, computing it on first request.
    pub fn view(&self, filters: &FilterSet) -> Arc<DashboardView> {
        if let Some(view) = self.entries.read().get(filters) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(view);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let built = Arc::new(DashboardView::build(&self.records, filters));
        let mut entries = self.entries.write();
        // a concurrent reader may have inserted first; keep whichever landed
        let view = Arc::clone(entries.entry(filters.clone()).or_insert(built));
        debug!(entries = entries.len(), "dashboard view cached");
        view
    }

    /// Replace the cleaned set and drop every cached view.
    pub fn reset(&mut self, records: Arc<[CleanedTransaction]>) {
        self.records = records;
        self.entries.get_mut().clear();
        debug!("dashboard cache reset");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}
