use std::fmt::Write;

use crate::aggregate;
use crate::classify;
use crate::engine::{DashboardError, PassOutput};
use crate::models::{
    CategoryOption, DashboardResponse, DistributionEntry, MonthlyScans, RecentDiagnosis,
    SeverityBucket, StatCard, SummaryStats, TrendPoint,
};

struct CardStyle {
    title: &'static str,
    color: &'static str,
    icon: &'static str,
}

const TOTAL_CARD: CardStyle = CardStyle {
    title: "Total Scans",
    color: "#3b82f6",
    icon: "scan",
};
const DISEASED_CARD: CardStyle = CardStyle {
    title: "Diseased Plants",
    color: "#ef4444",
    icon: "alert-triangle",
};
const HEALTHY_CARD: CardStyle = CardStyle {
    title: "Healthy Plants",
    color: "#22c55e",
    icon: "leaf",
};
const SEVERITY_CARD: CardStyle = CardStyle {
    title: "Avg Severity",
    color: "#f59e0b",
    icon: "activity",
};

fn card(style: &CardStyle, current: f64, previous: f64) -> StatCard {
    let change = aggregate::percent_change(current, previous);
    StatCard {
        title: style.title.to_string(),
        value: classify::round_percent(current),
        change,
        trend: aggregate::trend_of(change),
        color: style.color.to_string(),
        icon: style.icon.to_string(),
    }
}

/// Metric cards comparing the current period with the one before it.
pub fn stat_cards(current: &SummaryStats, previous: &SummaryStats) -> Vec<StatCard> {
    vec![
        card(
            &TOTAL_CARD,
            current.total_diagnoses as f64,
            previous.total_diagnoses as f64,
        ),
        card(
            &DISEASED_CARD,
            current.diseased_plants as f64,
            previous.diseased_plants as f64,
        ),
        card(
            &HEALTHY_CARD,
            current.healthy_plants as f64,
            previous.healthy_plants as f64,
        ),
        card(&SEVERITY_CARD, current.avg_severity, previous.avg_severity),
    ]
}

#[derive(Default)]
struct Collected {
    current: Option<SummaryStats>,
    previous: Option<SummaryStats>,
    trend: Option<Vec<TrendPoint>>,
    distribution: Option<Vec<DistributionEntry>>,
    severity: Option<Vec<SeverityBucket>>,
    monthly: Option<Vec<MonthlyScans>>,
    recent: Option<Vec<RecentDiagnosis>>,
    categories: Option<Vec<CategoryOption>>,
}

fn missing(pass: &'static str) -> DashboardError {
    DashboardError::Aggregation {
        pass,
        message: "produced no result".to_string(),
    }
}

/// Merges pass outputs into the response. Every pass must have reported.
pub fn assemble(outputs: Vec<PassOutput>) -> Result<DashboardResponse, DashboardError> {
    let mut collected = Collected::default();
    for output in outputs {
        match output {
            PassOutput::CurrentStats(stats) => collected.current = Some(stats),
            PassOutput::PreviousStats(stats) => collected.previous = Some(stats),
            PassOutput::DiseaseTrend(points) => collected.trend = Some(points),
            PassOutput::DiseaseDistribution(entries) => collected.distribution = Some(entries),
            PassOutput::SeverityHistogram(buckets) => collected.severity = Some(buckets),
            PassOutput::MonthlyActivity(months) => collected.monthly = Some(months),
            PassOutput::RecentDiagnoses(rows) => collected.recent = Some(rows),
            PassOutput::Categories(options) => collected.categories = Some(options),
        }
    }

    let current = collected.current.ok_or_else(|| missing("current_stats"))?;
    let previous = collected.previous.ok_or_else(|| missing("previous_stats"))?;

    Ok(DashboardResponse {
        stats: stat_cards(&current, &previous),
        categories: collected.categories.ok_or_else(|| missing("categories"))?,
        disease_trend_data: collected.trend.ok_or_else(|| missing("disease_trend"))?,
        disease_distribution: collected
            .distribution
            .ok_or_else(|| missing("disease_distribution"))?,
        severity_data: collected
            .severity
            .ok_or_else(|| missing("severity_histogram"))?,
        monthly_scans: collected.monthly.ok_or_else(|| missing("monthly_activity"))?,
        recent_diagnoses: collected.recent.ok_or_else(|| missing("recent_diagnoses"))?,
    })
}

/// Plain-text digest of a dashboard for terminals.
pub fn render_summary(label: &str, dashboard: &DashboardResponse) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Plant Health Dashboard");
    let _ = writeln!(output, "Generated for {}", label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    for card in &dashboard.stats {
        let sign = if card.change >= 0 { "+" } else { "" };
        let _ = writeln!(
            output,
            "- {}: {} ({}{}% vs previous period)",
            card.title, card.value, sign, card.change
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Diseases");
    if dashboard.disease_distribution.is_empty() {
        let _ = writeln!(output, "No diseases detected in this window.");
    } else {
        for entry in &dashboard.disease_distribution {
            let _ = writeln!(
                output,
                "- {}: {} scans ({}%)",
                entry.name, entry.value, entry.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Severity");
    for bucket in &dashboard.severity_data {
        let _ = writeln!(output, "- {}: {}", bucket.level, bucket.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Diagnoses");
    if dashboard.recent_diagnoses.is_empty() {
        let _ = writeln!(output, "No scans recorded yet.");
    } else {
        for row in &dashboard.recent_diagnoses {
            let _ = writeln!(
                output,
                "- {} ({}) on {}: {} [{}]",
                row.plant_name, row.category, row.date, row.disease, row.status
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Trend;

    fn stats(total: usize, diseased: usize, avg_severity: f64) -> SummaryStats {
        SummaryStats {
            total_diagnoses: total,
            diseased_plants: diseased,
            healthy_plants: total - diseased,
            avg_severity,
        }
    }

    fn all_outputs() -> Vec<PassOutput> {
        vec![
            PassOutput::CurrentStats(stats(8, 6, 42.4)),
            PassOutput::PreviousStats(stats(10, 3, 50.0)),
            PassOutput::DiseaseTrend(Vec::new()),
            PassOutput::DiseaseDistribution(Vec::new()),
            PassOutput::SeverityHistogram(aggregate::severity_histogram(&[])),
            PassOutput::MonthlyActivity(aggregate::monthly_activity(&[])),
            PassOutput::RecentDiagnoses(Vec::new()),
            PassOutput::Categories(Vec::new()),
        ]
    }

    #[test]
    fn cards_compare_each_metric_with_previous_period() {
        let cards = stat_cards(&stats(8, 6, 42.4), &stats(10, 3, 50.0));
        let summary: Vec<(&str, i64, i64, Trend)> = cards
            .iter()
            .map(|c| (c.title.as_str(), c.value, c.change, c.trend))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Total Scans", 8, -20, Trend::Down),
                ("Diseased Plants", 6, 100, Trend::Up),
                ("Healthy Plants", 2, -71, Trend::Down),
                ("Avg Severity", 42, -15, Trend::Down),
            ]
        );
    }

    #[test]
    fn assemble_requires_every_pass() {
        assert!(assemble(all_outputs()).is_ok());

        let mut outputs = all_outputs();
        outputs.retain(|o| !matches!(o, PassOutput::MonthlyActivity(_)));
        let err = assemble(outputs).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Aggregation {
                pass: "monthly_activity",
                ..
            }
        ));
    }

    #[test]
    fn summary_lists_sections() {
        let dashboard = assemble(all_outputs()).unwrap();
        let text = render_summary("owner 42", &dashboard);
        assert!(text.contains("Generated for owner 42"));
        assert!(text.contains("- Total Scans: 8 (-20% vs previous period)"));
        assert!(text.contains("No diseases detected in this window."));
        assert!(text.contains("- Moderate: 0"));
        assert!(text.contains("No scans recorded yet."));
    }
}
