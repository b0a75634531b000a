use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::filter::RecordFilter;
use crate::models::{Category, ScanRecord};
use crate::store::{RecordStore, StoreResult};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed record store. Filters are pushed down into SQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SCAN_COLUMNS: &str = "id, owner_id, category_id, plant_name, disease_name, \
     severity_percentage, diagnosed_at";

fn scan_from_row(row: &PgRow) -> Result<ScanRecord, sqlx::Error> {
    Ok(ScanRecord {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        category_id: row.try_get("category_id")?,
        plant_name: row.try_get("plant_name")?,
        disease_name: row.try_get("disease_name")?,
        severity_percentage: row.try_get("severity_percentage")?,
        diagnosed_at: row.try_get("diagnosed_at")?,
    })
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch_scans(&self, filter: &RecordFilter) -> StoreResult<Vec<ScanRecord>> {
        let query = format!(
            "SELECT {SCAN_COLUMNS} FROM plant_dashboard.scans \
             WHERE owner_id = $1 AND diagnosed_at >= $2 \
             AND ($3::timestamptz IS NULL OR diagnosed_at < $3) \
             AND ($4::uuid IS NULL OR category_id = $4) \
             ORDER BY diagnosed_at ASC, id ASC"
        );

        let rows = sqlx::query(&query)
            .bind(filter.owner_id)
            .bind(filter.since)
            .bind(filter.until)
            .bind(filter.scope.category_id())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(scan_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn fetch_recent(&self, owner_id: Uuid, limit: usize) -> StoreResult<Vec<ScanRecord>> {
        let query = format!(
            "SELECT {SCAN_COLUMNS} FROM plant_dashboard.scans \
             WHERE owner_id = $1 ORDER BY diagnosed_at DESC, id DESC LIMIT $2"
        );

        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(scan_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn fetch_categories(&self, owner_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, display_name FROM plant_dashboard.categories \
             WHERE owner_id = $1 AND id = ANY($2)",
        )
        .bind(owner_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            categories.push(Category {
                id: row.try_get("id")?,
                owner_id: row.try_get("owner_id")?,
                display_name: row.try_get("display_name")?,
            });
        }
        Ok(categories)
    }
}

/// A scan loaded from CSV together with its idempotency key.
#[derive(Debug, Clone)]
pub struct ImportedScan {
    pub record: ScanRecord,
    pub source_key: String,
}

#[derive(Debug, Default)]
pub struct ScanImport {
    pub scans: Vec<ImportedScan>,
    pub categories: Vec<Category>,
}

/// Namespace for scan ids derived from `(owner, source_key)`.
const SCAN_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_27a4_93c8_4b5e_a0f2_1c7d_58e3_b946);

/// Stable id for a scan, so re-reading the same source yields the same records.
pub fn scan_id(owner_id: Uuid, source_key: &str) -> Uuid {
    Uuid::new_v5(&SCAN_ID_NAMESPACE, format!("{owner_id}/{source_key}").as_bytes())
}

/// Key for a row that has none: a digest of its contents, with a `#n` suffix
/// for the n-th repeat of an identical row.
fn content_key(
    owner_id: Uuid,
    category_id: Option<Uuid>,
    plant_name: Option<&str>,
    disease_name: Option<&str>,
    severity_percentage: Option<f64>,
    diagnosed_at: DateTime<Utc>,
) -> String {
    let content = format!(
        "{owner_id}|{}|{}|{}|{}|{}",
        category_id.map(|id| id.to_string()).unwrap_or_default(),
        plant_name.unwrap_or_default(),
        disease_name.unwrap_or_default(),
        severity_percentage.map(|pct| pct.to_string()).unwrap_or_default(),
        diagnosed_at.to_rfc3339(),
    );
    format!("import-{}", Uuid::new_v5(&SCAN_ID_NAMESPACE, content.as_bytes()))
}

pub fn read_scans_csv(csv_path: &Path) -> anyhow::Result<ScanImport> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        owner_id: Uuid,
        category_id: Option<Uuid>,
        category_name: Option<String>,
        plant_name: Option<String>,
        disease_name: Option<String>,
        severity_percentage: Option<f64>,
        diagnosed_at: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut scans = Vec::new();
    let mut categories: BTreeMap<Uuid, Category> = BTreeMap::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("line {line}: malformed scan row"))?;

        if let Some(pct) = row.severity_percentage {
            if !(0.0..=100.0).contains(&pct) {
                bail!("line {line}: severity_percentage {pct} is outside 0-100");
            }
        }

        if let (Some(id), Some(name)) = (row.category_id, row.category_name.as_deref()) {
            let name = name.trim();
            if !name.is_empty() {
                categories.entry(id).or_insert_with(|| Category {
                    id,
                    owner_id: row.owner_id,
                    display_name: name.to_string(),
                });
            }
        }

        let source_key = match row.source_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => key,
            None => {
                let key = content_key(
                    row.owner_id,
                    row.category_id,
                    row.plant_name.as_deref(),
                    row.disease_name.as_deref(),
                    row.severity_percentage,
                    row.diagnosed_at,
                );
                let seen = repeats.entry(key.clone()).or_default();
                *seen += 1;
                match *seen {
                    1 => key,
                    n => format!("{key}#{n}"),
                }
            }
        };

        scans.push(ImportedScan {
            record: ScanRecord {
                id: scan_id(row.owner_id, &source_key),
                owner_id: row.owner_id,
                category_id: row.category_id,
                plant_name: row.plant_name,
                disease_name: row.disease_name,
                severity_percentage: row.severity_percentage,
                diagnosed_at: row.diagnosed_at,
            },
            source_key,
        });
    }

    Ok(ScanImport {
        scans,
        categories: categories.into_values().collect(),
    })
}

async fn upsert_category(pool: &PgPool, category: &Category) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO plant_dashboard.categories (id, owner_id, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name
        "#,
    )
    .bind(category.id)
    .bind(category.owner_id)
    .bind(&category.display_name)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_scan(pool: &PgPool, scan: &ImportedScan) -> anyhow::Result<bool> {
    let record = &scan.record;
    let result = sqlx::query(
        r#"
        INSERT INTO plant_dashboard.scans
        (id, owner_id, category_id, plant_name, disease_name, severity_percentage,
         diagnosed_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.owner_id)
    .bind(record.category_id)
    .bind(&record.plant_name)
    .bind(&record.disease_name)
    .bind(record.severity_percentage)
    .bind(record.diagnosed_at)
    .bind(&scan.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let import = read_scans_csv(csv_path)?;

    for category in &import.categories {
        upsert_category(pool, category).await?;
    }

    let mut inserted = 0usize;
    for scan in &import.scans {
        if insert_scan(pool, scan).await? {
            inserted += 1;
        }
    }

    info!(
        path = %csv_path.display(),
        rows = import.scans.len(),
        inserted,
        "scan import finished"
    );
    Ok(inserted)
}

pub const DEMO_OWNER_ID: &str = "5f0c3a52-8c1e-4d3b-9a8f-2a71c6e4b901";

/// Demo data: two named categories, one category id with no document, and
/// scans spread over the past year.
pub fn demo_scans(owner_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<ScanImport> {
    let tomatoes = Uuid::parse_str("0b6a3f0e-41d2-4c55-9e0b-7d1f3c2a8e11")?;
    let herbs = Uuid::parse_str("7c9e2d14-5a3b-4f6e-8d21-c4b5a6e7f802")?;
    let orphan = Uuid::parse_str("e2d4f6a8-1b3c-4d5e-8f70-9a1b2c3d4e5f")?;

    let categories = vec![
        Category {
            id: tomatoes,
            owner_id,
            display_name: "Tomato Garden".to_string(),
        },
        Category {
            id: herbs,
            owner_id,
            display_name: "Herb Shelf".to_string(),
        },
    ];

    let plan: [(Option<Uuid>, &str, Option<&str>, Option<f64>, i64); 30] = [
        (Some(tomatoes), "Roma Tomato", Some("Early Blight"), Some(35.0), 1),
        (Some(tomatoes), "Cherry Tomato", Some("Healthy"), None, 2),
        (Some(herbs), "Basil", Some("Downy Mildew"), Some(62.0), 3),
        (Some(orphan), "Fiddle Leaf Fig", Some("Leaf Spot"), Some(12.0), 4),
        (None, "Monstera", None, None, 5),
        (Some(tomatoes), "Roma Tomato", Some("Early Blight"), Some(48.0), 6),
        (Some(herbs), "Mint", Some("Rust"), Some(18.0), 8),
        (Some(tomatoes), "Beefsteak Tomato", Some("Septoria Leaf Spot"), Some(55.0), 9),
        (Some(herbs), "Basil", Some("Healthy"), None, 11),
        (Some(tomatoes), "Cherry Tomato", Some("Late Blight"), Some(71.0), 13),
        (Some(orphan), "Fiddle Leaf Fig", Some("Healthy"), None, 16),
        (Some(tomatoes), "Roma Tomato", Some("Early Blight"), Some(22.0), 19),
        (Some(herbs), "Rosemary", Some("Powdery Mildew"), Some(9.0), 23),
        (Some(tomatoes), "Beefsteak Tomato", Some("Bacterial Spot"), Some(0.0), 27),
        (Some(tomatoes), "Cherry Tomato", Some("Healthy"), None, 34),
        (Some(herbs), "Basil", Some("Downy Mildew"), Some(40.0), 38),
        (Some(tomatoes), "Roma Tomato", Some("Late Blight"), Some(66.0), 41),
        (None, "Pothos", Some("Root Rot"), Some(58.0), 47),
        (Some(tomatoes), "Cherry Tomato", Some("Early Blight"), Some(15.0), 52),
        (Some(herbs), "Mint", Some("Healthy"), None, 58),
        (Some(tomatoes), "Roma Tomato", Some("Septoria Leaf Spot"), Some(31.0), 75),
        (Some(herbs), "Thyme", Some("Healthy"), None, 96),
        (Some(tomatoes), "Beefsteak Tomato", Some("Early Blight"), Some(44.0), 120),
        (Some(orphan), "Fiddle Leaf Fig", Some("Leaf Spot"), Some(27.0), 151),
        (Some(tomatoes), "Roma Tomato", Some("Healthy"), None, 183),
        (Some(herbs), "Basil", Some("Fusarium Wilt"), Some(80.0), 212),
        (Some(tomatoes), "Cherry Tomato", Some("Early Blight"), Some(25.0), 244),
        (None, "Snake Plant", Some("Healthy"), None, 275),
        (Some(tomatoes), "Roma Tomato", Some("Late Blight"), Some(52.0), 305),
        (Some(herbs), "Basil", Some("Downy Mildew"), Some(33.0), 340),
    ];

    let scans = plan
        .iter()
        .enumerate()
        .map(|(index, (category_id, plant, disease, severity, days_ago))| {
            let source_key = format!("seed-{:03}", index + 1);
            ImportedScan {
                record: ScanRecord {
                    id: scan_id(owner_id, &source_key),
                    owner_id,
                    category_id: *category_id,
                    plant_name: Some(plant.to_string()),
                    disease_name: (*disease).map(str::to_string),
                    severity_percentage: *severity,
                    diagnosed_at: now - Duration::days(*days_ago),
                },
                source_key,
            }
        })
        .collect();

    Ok(ScanImport { scans, categories })
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let owner_id = Uuid::parse_str(DEMO_OWNER_ID)?;
    let demo = demo_scans(owner_id, Utc::now())?;

    for category in &demo.categories {
        upsert_category(pool, category).await?;
    }
    let mut inserted = 0usize;
    for scan in &demo.scans {
        if insert_scan(pool, scan).await? {
            inserted += 1;
        }
    }

    info!(%owner_id, inserted, "demo data seeded");
    Ok(owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{build_dashboard, DashboardRequest};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::io::Write;
    use std::sync::Arc;

    fn write_csv(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("plant-dashboard-{}.csv", Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const HEADER: &str = "owner_id,category_id,category_name,plant_name,disease_name,\
                          severity_percentage,diagnosed_at,source_key\n";

    #[test]
    fn reads_optional_columns_and_categories() {
        let owner = Uuid::new_v4();
        let category = Uuid::new_v4();
        let path = write_csv(&format!(
            "{HEADER}\
             {owner},{category},Tomato Garden,Roma,Early Blight,35,2026-09-01T10:00:00Z,k1\n\
             {owner},,,Basil,,,2026-09-02T10:00:00Z,\n\
             {owner},{category},,Roma,healthy,0,2026-09-03T10:00:00Z,k3\n"
        ));

        let import = read_scans_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(import.scans.len(), 3);
        assert_eq!(import.categories.len(), 1);
        assert_eq!(import.categories[0].display_name, "Tomato Garden");
        assert_eq!(import.scans[0].source_key, "k1");
        assert_eq!(import.scans[0].record.severity_percentage, Some(35.0));
        assert!(import.scans[1].record.category_id.is_none());
        assert!(import.scans[1].record.disease_name.is_none());
        assert!(import.scans[1].source_key.starts_with("import-"));
        assert_eq!(import.scans[0].record.id, scan_id(owner, "k1"));
        assert_eq!(import.scans[2].record.severity_percentage, Some(0.0));
    }

    #[tokio::test]
    async fn rereading_a_csv_rebuilds_the_same_dashboard() {
        let owner = Uuid::new_v4();
        let (garden, orphan) = (Uuid::new_v4(), Uuid::new_v4());
        let path = write_csv(&format!(
            "{HEADER}\
             {owner},{garden},Tomato Garden,Roma,Early Blight,35,2026-10-10T09:00:00Z,\n\
             {owner},{orphan},,Fig,Leaf Spot,12,2026-10-10T09:00:00Z,\n\
             {owner},{garden},,Roma,Healthy,,2026-10-12T09:00:00Z,\n\
             {owner},,,Basil,Downy Mildew,62,2026-10-14T09:00:00Z,\n\
             {owner},,,Basil,Downy Mildew,62,2026-10-14T09:00:00Z,\n"
        ));
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let request = DashboardRequest {
            owner_id: Some(owner),
            time_range: Some("30d".to_string()),
            category_id: None,
        };

        let mut payloads = Vec::new();
        let mut keys = Vec::new();
        for _ in 0..2 {
            let import = read_scans_csv(&path).unwrap();
            keys.push(
                import
                    .scans
                    .iter()
                    .map(|scan| (scan.source_key.clone(), scan.record.id))
                    .collect::<Vec<_>>(),
            );
            let scans = import.scans.into_iter().map(|scan| scan.record).collect();
            let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new(scans, import.categories));
            let response = build_dashboard(store, &request, now).await.unwrap();
            payloads.push(serde_json::to_string(&response).unwrap());
        }
        std::fs::remove_file(&path).ok();

        assert_eq!(keys[0], keys[1]);
        assert_eq!(payloads[0], payloads[1]);
        // Identical keyless rows stay distinct scans.
        assert_ne!(keys[0][3].0, keys[0][4].0);
        assert_eq!(keys[0][4].0, format!("{}#2", keys[0][3].0));
    }

    #[test]
    fn rejects_out_of_range_severity_with_line_number() {
        let owner = Uuid::new_v4();
        let path = write_csv(&format!(
            "{HEADER}{owner},,,Roma,Blight,20,2026-09-01T10:00:00Z,a\n\
             {owner},,,Roma,Blight,140,2026-09-01T10:00:00Z,b\n"
        ));

        let err = read_scans_csv(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn demo_data_spans_the_year_with_an_orphaned_category() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let demo = demo_scans(owner, now).unwrap();

        assert_eq!(demo.scans.len(), 30);
        assert_eq!(demo.categories.len(), 2);
        let known: Vec<Uuid> = demo.categories.iter().map(|c| c.id).collect();
        assert!(demo
            .scans
            .iter()
            .any(|s| s.record.category_id.is_some_and(|id| !known.contains(&id))));
        assert!(demo
            .scans
            .iter()
            .all(|s| s.record.diagnosed_at > now - Duration::days(366)));
        assert_eq!(demo.scans[0].record.id, scan_id(owner, "seed-001"));
        assert_eq!(
            demo_scans(owner, now).unwrap().scans[5].record.id,
            demo.scans[5].record.id
        );
    }
}
