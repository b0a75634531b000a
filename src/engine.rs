use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::aggregate;
use crate::categories;
use crate::filter::{CategoryScope, RecordFilter};
use crate::models::{
    CategoryOption, DashboardResponse, DistributionEntry, MonthlyScans, RecentDiagnosis,
    ScanRecord, SeverityBucket, SummaryStats, TrendPoint,
};
use crate::period::{PeriodWindow, TimeRange};
use crate::report;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no authenticated owner for this request")]
    Unauthenticated,

    #[error("invalid category id: {0:?}")]
    InvalidCategory(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("aggregation {pass} failed: {message}")]
    Aggregation { pass: &'static str, message: String },
}

/// Raw request parameters as they arrive from the caller.
#[derive(Debug, Clone, Default)]
pub struct DashboardRequest {
    pub owner_id: Option<Uuid>,
    pub time_range: Option<String>,
    pub category_id: Option<String>,
}

/// A request after authentication, period resolution, and category parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub owner_id: Uuid,
    pub window: PeriodWindow,
    pub scope: CategoryScope,
}

impl DashboardRequest {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedRequest, DashboardError> {
        let owner_id = self.owner_id.ok_or(DashboardError::Unauthenticated)?;
        let scope = CategoryScope::parse(self.category_id.as_deref())
            .map_err(|err| DashboardError::InvalidCategory(err.0))?;
        let range = TimeRange::parse(self.time_range.as_deref());

        Ok(ResolvedRequest {
            owner_id,
            window: PeriodWindow::resolve(range, now),
            scope,
        })
    }
}

impl ResolvedRequest {
    pub fn current_filter(&self) -> RecordFilter {
        RecordFilter::new(self.owner_id, self.window.current_start, self.scope)
    }

    pub fn previous_filter(&self) -> RecordFilter {
        RecordFilter::new(self.owner_id, self.window.previous_start, self.scope)
            .until(self.window.previous_end())
    }

    pub fn trailing_year_filter(&self) -> RecordFilter {
        RecordFilter::new(self.owner_id, self.window.trailing_year_start(), self.scope)
    }

    /// Covers every windowed filter of this request: the owner's scans from the
    /// earliest period start onward, in every category.
    pub fn snapshot_filter(&self) -> RecordFilter {
        let since = self.window.previous_start.min(self.window.trailing_year_start());
        RecordFilter::new(self.owner_id, since, CategoryScope::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    CurrentStats,
    PreviousStats,
    DiseaseTrend,
    DiseaseDistribution,
    SeverityHistogram,
    MonthlyActivity,
    RecentDiagnoses,
    Categories,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        match self {
            PassKind::CurrentStats => "current_stats",
            PassKind::PreviousStats => "previous_stats",
            PassKind::DiseaseTrend => "disease_trend",
            PassKind::DiseaseDistribution => "disease_distribution",
            PassKind::SeverityHistogram => "severity_histogram",
            PassKind::MonthlyActivity => "monthly_activity",
            PassKind::RecentDiagnoses => "recent_diagnoses",
            PassKind::Categories => "categories",
        }
    }
}

/// One named, independently schedulable aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSpec {
    pub kind: PassKind,
    pub filter: RecordFilter,
}

/// The full set of passes for one request. Each pass selects its records from
/// the request snapshot through `filter`.
pub fn plan(request: &ResolvedRequest) -> Vec<AggregationSpec> {
    let current = request.current_filter();
    let spec = |kind, filter| AggregationSpec { kind, filter };

    vec![
        spec(PassKind::CurrentStats, current),
        spec(PassKind::PreviousStats, request.previous_filter()),
        spec(PassKind::DiseaseTrend, current),
        spec(PassKind::DiseaseDistribution, current),
        spec(PassKind::SeverityHistogram, current),
        spec(PassKind::MonthlyActivity, request.trailing_year_filter()),
        spec(PassKind::RecentDiagnoses, current),
        spec(PassKind::Categories, current.with_scope(CategoryScope::All)),
    ]
}

#[derive(Debug, Clone)]
pub enum PassOutput {
    CurrentStats(SummaryStats),
    PreviousStats(SummaryStats),
    DiseaseTrend(Vec<TrendPoint>),
    DiseaseDistribution(Vec<DistributionEntry>),
    SeverityHistogram(Vec<SeverityBucket>),
    MonthlyActivity(Vec<MonthlyScans>),
    RecentDiagnoses(Vec<RecentDiagnosis>),
    Categories(Vec<CategoryOption>),
}

fn select(snapshot: &[ScanRecord], filter: &RecordFilter) -> Vec<ScanRecord> {
    snapshot
        .iter()
        .filter(|scan| filter.matches(scan))
        .cloned()
        .collect()
}

async fn run_pass(
    store: &dyn RecordStore,
    snapshot: &[ScanRecord],
    spec: AggregationSpec,
    window: PeriodWindow,
) -> Result<PassOutput, StoreError> {
    let started = Instant::now();

    let (output, records) = match spec.kind {
        PassKind::CurrentStats => {
            let scans = select(snapshot, &spec.filter);
            (PassOutput::CurrentStats(aggregate::summary_stats(&scans)), scans.len())
        }
        PassKind::PreviousStats => {
            let scans = select(snapshot, &spec.filter);
            (PassOutput::PreviousStats(aggregate::summary_stats(&scans)), scans.len())
        }
        PassKind::DiseaseTrend => {
            let scans = select(snapshot, &spec.filter);
            let series = aggregate::disease_trend(&scans, window.range.granularity());
            (PassOutput::DiseaseTrend(series), scans.len())
        }
        PassKind::DiseaseDistribution => {
            let scans = select(snapshot, &spec.filter);
            let entries = aggregate::disease_distribution(&scans);
            (PassOutput::DiseaseDistribution(entries), scans.len())
        }
        PassKind::SeverityHistogram => {
            let scans = select(snapshot, &spec.filter);
            let buckets = aggregate::severity_histogram(&scans);
            (PassOutput::SeverityHistogram(buckets), scans.len())
        }
        PassKind::MonthlyActivity => {
            let scans = select(snapshot, &spec.filter);
            let months = aggregate::monthly_activity(&scans);
            (PassOutput::MonthlyActivity(months), scans.len())
        }
        PassKind::RecentDiagnoses => {
            let recent = store
                .fetch_recent(spec.filter.owner_id, aggregate::RECENT_LIMIT)
                .await?;
            let names = categories::names_for(store, spec.filter.owner_id, &recent).await?;
            let rows = aggregate::recent_diagnoses(&recent, &names);
            (PassOutput::RecentDiagnoses(rows), recent.len())
        }
        PassKind::Categories => {
            let scans = select(snapshot, &spec.filter);
            let options = categories::synthesize(store, spec.filter.owner_id, &scans).await?;
            (PassOutput::Categories(options), scans.len())
        }
    };

    debug!(
        pass = spec.kind.name(),
        records,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "aggregation pass complete"
    );
    Ok(output)
}

/// Builds the dashboard for one request.
///
/// The owner's windowed scans are read once, then all passes run concurrently
/// over that snapshot, so every section agrees on the same set of records. The
/// first failing pass fails the whole request; dropping the join set aborts
/// whatever is still in flight.
pub async fn build_dashboard(
    store: Arc<dyn RecordStore>,
    request: &DashboardRequest,
    now: DateTime<Utc>,
) -> Result<DashboardResponse, DashboardError> {
    let started = Instant::now();
    let resolved = request.resolve(now)?;

    let snapshot = store
        .fetch_scans(&resolved.snapshot_filter())
        .await
        .map_err(|err| {
            error!(error = %err, "failed to read scan snapshot");
            DashboardError::Store(err)
        })?;
    let snapshot = Arc::new(snapshot);

    let mut tasks = JoinSet::new();
    for spec in plan(&resolved) {
        let store = Arc::clone(&store);
        let snapshot = Arc::clone(&snapshot);
        let window = resolved.window;
        tasks.spawn(async move {
            let result = run_pass(store.as_ref(), &snapshot, spec, window).await;
            (spec.kind, result)
        });
    }

    let mut outputs = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (kind, result) = joined.map_err(|err| {
            error!(error = %err, "aggregation task did not complete");
            DashboardError::Aggregation {
                pass: "task",
                message: err.to_string(),
            }
        })?;
        match result {
            Ok(output) => outputs.push(output),
            Err(err) => {
                error!(pass = kind.name(), error = %err, "aggregation pass failed");
                return Err(err.into());
            }
        }
    }

    let response = report::assemble(outputs)?;

    info!(
        owner_id = %resolved.owner_id,
        time_range = resolved.window.range.token(),
        category = ?resolved.scope.category_id(),
        snapshot_records = snapshot.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dashboard built"
    );
    Ok(response)
}
