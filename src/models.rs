use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Option<Uuid>,
    pub plant_name: Option<String>,
    pub disease_name: Option<String>,
    pub severity_percentage: Option<f64>,
    pub diagnosed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub display_name: String,
}

/// Full dashboard payload, serialized with the field names the UI expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub stats: Vec<StatCard>,
    pub categories: Vec<CategoryOption>,
    pub disease_trend_data: Vec<TrendPoint>,
    pub disease_distribution: Vec<DistributionEntry>,
    pub severity_data: Vec<SeverityBucket>,
    pub monthly_scans: Vec<MonthlyScans>,
    pub recent_diagnoses: Vec<RecentDiagnosis>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryStats {
    pub total_diagnoses: usize,
    pub diseased_plants: usize,
    pub healthy_plants: usize,
    pub avg_severity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCard {
    pub title: String,
    pub value: i64,
    pub change: i64,
    pub trend: Trend,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub diseased: usize,
    pub healthy: usize,
    pub severity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub name: String,
    pub value: usize,
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBucket {
    pub level: String,
    pub count: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyScans {
    pub month: String,
    pub scans: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDiagnosis {
    pub id: Uuid,
    pub plant_name: String,
    pub disease: String,
    pub severity: i64,
    pub category: String,
    pub date: String,
    pub status: String,
}
