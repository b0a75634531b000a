use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ScanRecord;

pub const ALL_CATEGORIES: &str = "all";

/// Which categories a request looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryScope {
    #[default]
    All,
    One(Uuid),
}

#[derive(Debug, thiserror::Error)]
#[error("malformed category id: {0:?}")]
pub struct MalformedCategoryId(pub String);

impl CategoryScope {
    /// `"all"` (any case) or a missing value means no category filter; any other
    /// value must be a category id.
    pub fn parse(raw: Option<&str>) -> Result<Self, MalformedCategoryId> {
        let Some(raw) = raw.map(str::trim) else {
            return Ok(CategoryScope::All);
        };
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_CATEGORIES) {
            return Ok(CategoryScope::All);
        }
        Uuid::parse_str(raw)
            .map(CategoryScope::One)
            .map_err(|_| MalformedCategoryId(raw.to_string()))
    }

    pub fn category_id(self) -> Option<Uuid> {
        match self {
            CategoryScope::All => None,
            CategoryScope::One(id) => Some(id),
        }
    }
}

/// Query predicate shared by every aggregation pass. The current and previous
/// periods differ only in their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFilter {
    pub owner_id: Uuid,
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
    pub scope: CategoryScope,
}

impl RecordFilter {
    pub fn new(owner_id: Uuid, since: DateTime<Utc>, scope: CategoryScope) -> Self {
        Self {
            owner_id,
            since,
            until: None,
            scope,
        }
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_scope(mut self, scope: CategoryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn matches(&self, record: &ScanRecord) -> bool {
        if record.owner_id != self.owner_id || record.diagnosed_at < self.since {
            return false;
        }
        if let Some(until) = self.until {
            if record.diagnosed_at >= until {
                return false;
            }
        }
        match self.scope {
            CategoryScope::All => true,
            CategoryScope::One(id) => record.category_id == Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(owner_id: Uuid, category_id: Option<Uuid>, days_ago: i64) -> ScanRecord {
        ScanRecord {
            id: Uuid::new_v4(),
            owner_id,
            category_id,
            plant_name: Some("Tomato".to_string()),
            disease_name: None,
            severity_percentage: None,
            diagnosed_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn parses_all_and_ids() {
        let id = Uuid::new_v4();
        assert_eq!(CategoryScope::parse(None).unwrap(), CategoryScope::All);
        assert_eq!(CategoryScope::parse(Some("ALL")).unwrap(), CategoryScope::All);
        assert_eq!(
            CategoryScope::parse(Some(&id.to_string())).unwrap(),
            CategoryScope::One(id)
        );
        assert!(CategoryScope::parse(Some("tomatoes")).is_err());
    }

    #[test]
    fn matches_owner_window_and_category() {
        let owner = Uuid::new_v4();
        let category = Uuid::new_v4();
        let since = Utc::now() - Duration::days(30);
        let filter = RecordFilter::new(owner, since, CategoryScope::One(category));

        assert!(filter.matches(&record(owner, Some(category), 3)));
        assert!(!filter.matches(&record(owner, Some(Uuid::new_v4()), 3)));
        assert!(!filter.matches(&record(owner, None, 3)));
        assert!(!filter.matches(&record(owner, Some(category), 45)));
        assert!(!filter.matches(&record(Uuid::new_v4(), Some(category), 3)));
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let owner = Uuid::new_v4();
        let mut scan = record(owner, None, 10);
        let since = scan.diagnosed_at - Duration::days(5);
        let filter = RecordFilter::new(owner, since, CategoryScope::All).until(scan.diagnosed_at);
        assert!(!filter.matches(&scan));
        scan.diagnosed_at -= Duration::seconds(1);
        assert!(filter.matches(&scan));
    }
}
