use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use uuid::Uuid;

use crate::classify::{self, SeverityLevel};
use crate::models::{
    DistributionEntry, MonthlyScans, RecentDiagnosis, ScanRecord, SeverityBucket, SummaryStats,
    Trend, TrendPoint,
};
use crate::period::BucketGranularity;

pub const TOP_DISEASES: usize = 4;
pub const RECENT_LIMIT: usize = 5;
pub const OTHERS_LABEL: &str = "Others";
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Running mean that stays at 0 when nothing was added.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

pub fn summary_stats(records: &[ScanRecord]) -> SummaryStats {
    let mut healthy = 0usize;
    let mut severity = Mean::default();

    for record in records {
        if classify::is_healthy(record) {
            healthy += 1;
        } else if let Some(pct) = record.severity_percentage {
            severity.add(pct);
        }
    }

    SummaryStats {
        total_diagnoses: records.len(),
        diseased_plants: records.len() - healthy,
        healthy_plants: healthy,
        avg_severity: severity.value(),
    }
}

/// Period-over-period change in whole percent.
pub fn percent_change(current: f64, previous: f64) -> i64 {
    if previous > 0.0 {
        classify::round_percent((current - previous) / previous * 100.0)
    } else if current > 0.0 {
        100
    } else {
        0
    }
}

pub fn trend_of(change: i64) -> Trend {
    if change >= 0 {
        Trend::Up
    } else {
        Trend::Down
    }
}

pub fn disease_trend(records: &[ScanRecord], granularity: BucketGranularity) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<String, (usize, usize, Mean)> = BTreeMap::new();

    for record in records {
        let entry = buckets
            .entry(granularity.key(record.diagnosed_at))
            .or_default();
        if classify::is_healthy(record) {
            entry.1 += 1;
        } else {
            entry.0 += 1;
            if let Some(pct) = record.severity_percentage {
                entry.2.add(pct);
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, (diseased, healthy, severity))| TrendPoint {
            date,
            diseased,
            healthy,
            severity: classify::round_percent(severity.value()),
        })
        .collect()
}

/// Diseased records grouped by name, trimmed of surrounding whitespace but
/// otherwise compared exactly.
pub fn disease_distribution(records: &[ScanRecord]) -> Vec<DistributionEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut diseased_total = 0usize;

    for record in records {
        if classify::is_healthy(record) {
            continue;
        }
        let name = record.disease_name.as_deref().unwrap_or_default().trim();
        *counts.entry(name).or_insert(0) += 1;
        diseased_total += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let others: usize = ranked.iter().skip(TOP_DISEASES).map(|(_, count)| count).sum();
    let mut entries: Vec<DistributionEntry> = ranked
        .into_iter()
        .take(TOP_DISEASES)
        .map(|(name, value)| DistributionEntry {
            name: name.to_string(),
            value,
            percentage: classify::percent_of(value, diseased_total),
        })
        .collect();

    if others > 0 {
        entries.push(DistributionEntry {
            name: OTHERS_LABEL.to_string(),
            value: others,
            percentage: classify::percent_of(others, diseased_total),
        });
    }

    entries
}

pub fn severity_histogram(records: &[ScanRecord]) -> Vec<SeverityBucket> {
    let mut counts: HashMap<SeverityLevel, usize> = HashMap::new();

    for record in records.iter().filter(|r| !classify::is_healthy(r)) {
        if let Some(pct) = record.severity_percentage {
            *counts.entry(classify::severity_level(pct)).or_insert(0) += 1;
        }
    }

    SeverityLevel::ALL
        .iter()
        .map(|level| SeverityBucket {
            level: level.label().to_string(),
            count: counts.get(level).copied().unwrap_or(0),
            color: level.color().to_string(),
        })
        .collect()
}

/// Scan counts per calendar month, always `Jan`..`Dec`. The trailing-year
/// window touches the current month twice; both years land in the same slot.
pub fn monthly_activity(records: &[ScanRecord]) -> Vec<MonthlyScans> {
    let mut calendar = [0usize; 12];
    for record in records {
        calendar[record.diagnosed_at.month0() as usize] += 1;
    }

    MONTH_LABELS
        .iter()
        .zip(calendar)
        .map(|(month, scans)| MonthlyScans {
            month: month.to_string(),
            scans,
        })
        .collect()
}

/// Formats the newest records (newest first) as dashboard rows.
pub fn recent_diagnoses(
    records: &[ScanRecord],
    category_names: &HashMap<Uuid, String>,
) -> Vec<RecentDiagnosis> {
    let mut newest: Vec<&ScanRecord> = records.iter().collect();
    newest.sort_by(|a, b| b.diagnosed_at.cmp(&a.diagnosed_at));

    newest
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|record| {
            let healthy = classify::is_healthy(record);
            RecentDiagnosis {
                id: record.id,
                plant_name: record
                    .plant_name
                    .clone()
                    .unwrap_or_else(|| "Unknown Plant".to_string()),
                disease: if healthy {
                    "Healthy".to_string()
                } else {
                    record.disease_name.clone().unwrap_or_default()
                },
                severity: record
                    .severity_percentage
                    .map(classify::round_percent)
                    .unwrap_or(0),
                category: record
                    .category_id
                    .and_then(|id| category_names.get(&id).cloned())
                    .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_string()),
                date: record.diagnosed_at.date_naive().to_string(),
                status: classify::diagnosis_status(record).to_string(),
            }
        })
        .collect()
}
