use crate::models::ScanRecord;

const HEALTHY_LABEL: &str = "healthy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeverityLevel {
    Mild,
    Moderate,
    Severe,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 3] = [
        SeverityLevel::Mild,
        SeverityLevel::Moderate,
        SeverityLevel::Severe,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SeverityLevel::Mild => "Mild",
            SeverityLevel::Moderate => "Moderate",
            SeverityLevel::Severe => "Severe",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SeverityLevel::Mild => "#10b981",
            SeverityLevel::Moderate => "#f59e0b",
            SeverityLevel::Severe => "#ef4444",
        }
    }
}

/// No disease name, or the word "healthy" in any case with surrounding
/// whitespace ignored.
pub fn is_healthy(record: &ScanRecord) -> bool {
    match record.disease_name.as_deref() {
        None => true,
        Some(name) => name.trim().eq_ignore_ascii_case(HEALTHY_LABEL),
    }
}

pub fn severity_level(percentage: f64) -> SeverityLevel {
    if percentage < 20.0 {
        SeverityLevel::Mild
    } else if percentage < 50.0 {
        SeverityLevel::Moderate
    } else {
        SeverityLevel::Severe
    }
}

/// Display status for a recent diagnosis row.
pub fn diagnosis_status(record: &ScanRecord) -> &'static str {
    if is_healthy(record) {
        return "Healthy";
    }
    match record.severity_percentage.unwrap_or(0.0) {
        s if s > 50.0 => "Active",
        s if s > 15.0 => "Monitoring",
        _ => "Treated",
    }
}

/// Half-up rounding used for every percentage shown on the dashboard.
pub fn round_percent(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    (value + 0.5).floor() as i64
}

/// `part / whole * 100`, defined as 0 when `whole` is 0.
pub fn percent_of(part: usize, whole: usize) -> i64 {
    if whole == 0 {
        return 0;
    }
    round_percent(part as f64 / whole as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn scan(disease: Option<&str>, severity: Option<f64>) -> ScanRecord {
        ScanRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            category_id: None,
            plant_name: None,
            disease_name: disease.map(str::to_string),
            severity_percentage: severity,
            diagnosed_at: Utc::now(),
        }
    }

    #[test]
    fn healthy_sentinel_is_case_insensitive() {
        assert!(is_healthy(&scan(None, None)));
        assert!(is_healthy(&scan(Some("Healthy"), None)));
        assert!(is_healthy(&scan(Some("HEALTHY"), Some(0.0))));
        assert!(!is_healthy(&scan(Some("Early Blight"), Some(12.0))));
    }

    #[test]
    fn healthy_sentinel_ignores_surrounding_whitespace_only() {
        assert!(is_healthy(&scan(Some(" Healthy "), None)));
        assert!(is_healthy(&scan(Some("healthy\n"), None)));
        assert!(!is_healthy(&scan(Some("Healthy Leaf"), None)));
        assert!(!is_healthy(&scan(Some("un healthy"), Some(5.0))));
    }

    #[test]
    fn severity_boundaries_belong_to_upper_bucket() {
        assert_eq!(severity_level(0.0), SeverityLevel::Mild);
        assert_eq!(severity_level(19.9), SeverityLevel::Mild);
        assert_eq!(severity_level(20.0), SeverityLevel::Moderate);
        assert_eq!(severity_level(49.9), SeverityLevel::Moderate);
        assert_eq!(severity_level(50.0), SeverityLevel::Severe);
        assert_eq!(severity_level(100.0), SeverityLevel::Severe);
    }

    #[test]
    fn status_follows_severity_thresholds() {
        assert_eq!(diagnosis_status(&scan(Some("healthy"), None)), "Healthy");
        assert_eq!(diagnosis_status(&scan(Some("Rust"), Some(51.0))), "Active");
        assert_eq!(diagnosis_status(&scan(Some("Rust"), Some(50.0))), "Monitoring");
        assert_eq!(diagnosis_status(&scan(Some("Rust"), Some(16.0))), "Monitoring");
        assert_eq!(diagnosis_status(&scan(Some("Rust"), Some(15.0))), "Treated");
        assert_eq!(diagnosis_status(&scan(Some("Rust"), None)), "Treated");
    }

    #[test]
    fn percentages_never_divide_by_zero() {
        assert_eq!(percent_of(3, 0), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(1, 8), 13);
        assert_eq!(round_percent(f64::NAN), 0);
        assert_eq!(round_percent(-12.5), -12);
    }
}
