use chrono::{DateTime, Duration, Months, Utc};

/// Dashboard look-back window selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRange {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

/// Calendar granularity used to key trend buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketGranularity {
    Daily,
    Monthly,
}

impl BucketGranularity {
    pub fn key(self, at: DateTime<Utc>) -> String {
        match self {
            BucketGranularity::Daily => at.format("%Y-%m-%d").to_string(),
            BucketGranularity::Monthly => at.format("%Y-%m").to_string(),
        }
    }
}

impl TimeRange {
    /// Permissive parse: anything unrecognized falls back to `30d`.
    pub fn parse(token: Option<&str>) -> Self {
        let Some(token) = token else {
            return TimeRange::default();
        };
        match token.trim().to_ascii_lowercase().as_str() {
            "7d" => TimeRange::Week,
            "30d" => TimeRange::Month,
            "90d" => TimeRange::Quarter,
            "1y" => TimeRange::Year,
            _ => TimeRange::default(),
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
            TimeRange::Year => "1y",
        }
    }

    /// Lower bound of the current period.
    pub fn start_from(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeRange::Week => now - Duration::days(7),
            TimeRange::Month => now - Duration::days(30),
            TimeRange::Quarter => now - Duration::days(90),
            TimeRange::Year => one_year_before(now),
        }
    }

    pub fn granularity(self) -> BucketGranularity {
        match self {
            TimeRange::Week | TimeRange::Month => BucketGranularity::Daily,
            TimeRange::Quarter | TimeRange::Year => BucketGranularity::Monthly,
        }
    }
}

/// Calendar year subtraction; Feb 29 clamps to Feb 28.
pub fn one_year_before(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(12))
        .unwrap_or_else(|| now - Duration::days(365))
}

/// Concrete current and previous windows for one request.
///
/// The previous window is `[previous_start, current_start)` and always spans
/// exactly the elapsed length of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub range: TimeRange,
    pub now: DateTime<Utc>,
    pub current_start: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn resolve(range: TimeRange, now: DateTime<Utc>) -> Self {
        let current_start = range.start_from(now);
        let elapsed = now - current_start;
        Self {
            range,
            now,
            current_start,
            previous_start: current_start - elapsed,
        }
    }

    pub fn previous_end(&self) -> DateTime<Utc> {
        self.current_start
    }

    /// Lower bound of the fixed trailing-year window used for monthly activity.
    pub fn trailing_year_start(&self) -> DateTime<Utc> {
        one_year_before(self.now)
    }
}
