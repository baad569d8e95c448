mod dates;
mod error;
mod filter;
mod params;
mod snapshot;
mod sort;
mod stats;
#[cfg(test)]
mod tests;

pub use dates::{nights_between, parse_date, parse_timestamp_ms};
pub use error::EngineError;
pub use filter::{property_display_name, FilterChain, PropertyNames};
pub use params::{filter_value, DateFilter, QueryParams, SortDirection, SortField, SortSpec};
pub use snapshot::{decode_array, FileStamp, Snapshot, BOOKINGS_FILE, PROPERTIES_FILE};
pub use sort::{comparator, sort_view, Comparator};
pub use stats::{
    aggregate, amount_or_zero, outstanding_amount, payment_label, payment_status_or_pending,
    source_label, status_label, PaymentKind, StatsPolicy, StatusKind,
};

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::model::*;

/// Everything a query depends on besides its inputs.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext {
    pub today: NaiveDate,
    pub policy: StatsPolicy,
}

impl QueryContext {
    /// Today's local date.
    pub fn current(policy: StatsPolicy) -> Self {
        Self {
            today: Local::now().date_naive(),
            policy,
        }
    }
}

/// Filter, sort and page `records`, and summarise all of them.
pub fn query_bookings(
    records: &[BookingRecord],
    properties: &[PropertyRecord],
    params: &QueryParams,
) -> QueryOutcome {
    query_bookings_in(&QueryContext::current(StatsPolicy::default()), records, properties, params)
}

pub fn query_bookings_in(
    ctx: &QueryContext,
    records: &[BookingRecord],
    properties: &[PropertyRecord],
    params: &QueryParams,
) -> QueryOutcome {
    let names = PropertyNames::new(properties);
    let chain = FilterChain::new(params, ctx.today);

    let mut view: Vec<BookingRecord> = records
        .iter()
        .filter(|r| chain.admits(r, &names))
        .cloned()
        .collect();
    sort_view(&mut view, params.sort);

    let matched = view.len();
    if params.offset > 0 || params.limit.is_some() {
        view = view
            .into_iter()
            .skip(params.offset)
            .take(params.limit.unwrap_or(usize::MAX))
            .collect();
    }

    QueryOutcome {
        view,
        matched,
        stats: aggregate(records, &ctx.policy),
    }
}

/// One tenant's dataset plus the query pipeline over it.
///
/// Queries run against whichever snapshot is current when they start. A reload swaps
/// the snapshot without disturbing queries already holding the old one.
pub struct Engine {
    dir: PathBuf,
    policy: StatsPolicy,
    current: RwLock<Arc<Snapshot>>,
}

impl Engine {
    pub fn open(dir: PathBuf, policy: StatsPolicy) -> Result<Self, EngineError> {
        let snapshot = Snapshot::load(&dir)?;
        metrics::gauge!(crate::observability::SNAPSHOT_RECORDS).set(snapshot.bookings.len() as f64);
        Ok(Self {
            dir,
            policy,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Engine over in-memory records, never reloaded from disk.
    pub fn with_snapshot(dir: PathBuf, policy: StatsPolicy, snapshot: Snapshot) -> Self {
        Self {
            dir,
            policy,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read the dataset files. On failure the previous snapshot stays current.
    /// Returns the number of bookings now loaded.
    pub fn reload(&self) -> Result<usize, EngineError> {
        let result = Snapshot::load(&self.dir);
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(crate::observability::SNAPSHOT_RELOADS_TOTAL, "status" => status).increment(1);

        let snapshot = result?;
        let count = snapshot.bookings.len();
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);
        metrics::gauge!(crate::observability::SNAPSHOT_RECORDS).set(count as f64);
        Ok(count)
    }

    pub fn is_stale(&self) -> bool {
        self.snapshot().is_stale(&self.dir)
    }

    pub fn query(&self, params: &QueryParams) -> QueryOutcome {
        self.query_in(&QueryContext::current(self.policy), params)
    }

    pub fn query_in(&self, ctx: &QueryContext, params: &QueryParams) -> QueryOutcome {
        self.query_snapshot(&self.snapshot(), ctx, params)
    }

    /// Query a snapshot the caller already holds, so related reads see the same data.
    pub fn query_snapshot(&self, snapshot: &Snapshot, ctx: &QueryContext, params: &QueryParams) -> QueryOutcome {
        let outcome = query_bookings_in(ctx, &snapshot.bookings, &snapshot.properties, params);
        debug!(
            "query over {} bookings matched {} (returned {})",
            snapshot.bookings.len(),
            outcome.matched,
            outcome.view.len()
        );
        outcome
    }

    pub fn policy(&self) -> StatsPolicy {
        self.policy
    }

    pub fn stats(&self) -> BookingStats {
        aggregate(&self.snapshot().bookings, &self.policy)
    }

    pub fn properties(&self) -> Arc<[PropertyRecord]> {
        self.snapshot().properties.clone()
    }
}
