//! Category list derived from the scans themselves.
//!
//! The categories table is only used to put real names on groups discovered in
//! the scans; ids it does not know keep a provisional `Category N` name.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::filter::ALL_CATEGORIES;
use crate::models::{Category, CategoryOption, ScanRecord};
use crate::store::{RecordStore, StoreResult};

pub const ALL_PLANTS_LABEL: &str = "All Plants";

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredCategory {
    pub id: Uuid,
    pub name: String,
    pub count: usize,
}

/// Groups scans by category id in first-seen order. Uncategorized scans form no group.
pub fn discover(records: &[ScanRecord]) -> Vec<DiscoveredCategory> {
    let mut groups: Vec<DiscoveredCategory> = Vec::new();
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for category_id in records.iter().filter_map(|record| record.category_id) {
        match positions.get(&category_id) {
            Some(&index) => groups[index].count += 1,
            None => {
                positions.insert(category_id, groups.len());
                groups.push(DiscoveredCategory {
                    id: category_id,
                    name: format!("Category {}", groups.len() + 1),
                    count: 1,
                });
            }
        }
    }

    groups
}

/// Overwrites provisional names with display names where a category document exists.
pub fn enrich(groups: &mut [DiscoveredCategory], known: &[Category]) {
    let names: HashMap<Uuid, &str> = known
        .iter()
        .map(|category| (category.id, category.display_name.as_str()))
        .collect();

    for group in groups.iter_mut() {
        match names.get(&group.id) {
            Some(name) => group.name = (*name).to_string(),
            None => warn!(
                category_id = %group.id,
                provisional_name = %group.name,
                "scans reference a category with no category document"
            ),
        }
    }
}

/// Final option list: the synthetic "All Plants" entry followed by discovered groups.
pub fn options(groups: Vec<DiscoveredCategory>, total: usize) -> Vec<CategoryOption> {
    let mut options = Vec::with_capacity(groups.len() + 1);
    options.push(CategoryOption {
        id: ALL_CATEGORIES.to_string(),
        name: ALL_PLANTS_LABEL.to_string(),
        count: total,
    });
    options.extend(groups.into_iter().map(|group| CategoryOption {
        id: group.id.to_string(),
        name: group.name,
        count: group.count,
    }));
    options
}

/// Derive-then-enrich over `records`, the owner's scans in the current window
/// across every category, so the selector always lists every option.
pub async fn synthesize(
    store: &dyn RecordStore,
    owner_id: Uuid,
    records: &[ScanRecord],
) -> StoreResult<Vec<CategoryOption>> {
    let mut groups = discover(records);
    if !groups.is_empty() {
        let ids: Vec<Uuid> = groups.iter().map(|group| group.id).collect();
        let known = store.fetch_categories(owner_id, &ids).await?;
        enrich(&mut groups, &known);
    }

    Ok(options(groups, records.len()))
}

/// Id-to-name map for joining display names onto scans.
pub async fn names_for(
    store: &dyn RecordStore,
    owner_id: Uuid,
    records: &[ScanRecord],
) -> StoreResult<HashMap<Uuid, String>> {
    let mut ids: Vec<Uuid> = records.iter().filter_map(|r| r.category_id).collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(store
        .fetch_categories(owner_id, &ids)
        .await?
        .into_iter()
        .map(|category| (category.id, category.display_name))
        .collect())
}
