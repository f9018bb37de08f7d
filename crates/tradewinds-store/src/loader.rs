//! Idempotent batch upsert: stage rows into a transaction-scoped scratch
//! table shaped like the target, then merge with a single set-based
//! `INSERT ... ON CONFLICT`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Acquire, Postgres};
use tokio::sync::Mutex;
use uuid::Uuid;

use tradewinds_core::{Row, Value};

use crate::error::StoreError;

#[async_trait]
pub trait BatchLoader: Send + Sync {
    /// Apply `rows` to `table` so that rows sharing a conflict-key tuple
    /// converge to the last value in the list. Returns affected-row count;
    /// no-op overwrites still count. Empty input is a no-op returning 0.
    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_keys: &[String],
    ) -> Result<u64, StoreError>;
}

fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str) -> Result<(), StoreError> {
    if valid_identifier(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render a value as an untyped SQL literal so Postgres coerces it to the
/// column type of the scratch table at parse time.
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => format!("{v:?}"),
        Value::Float(_) => "NULL".to_string(),
        Value::Text(v) => quote_text(v),
        Value::Timestamp(ts) => quote_text(&ts.to_rfc3339()),
        Value::Json(v) => quote_text(&v.to_string()),
    }
}

pub(crate) fn scratch_table_name(table: &str, suffix: &str) -> String {
    format!("scratch_{table}_{suffix}")
}

pub(crate) fn create_scratch_sql(table: &str, scratch: &str) -> String {
    format!("CREATE TEMP TABLE {scratch} (LIKE {table} INCLUDING DEFAULTS) ON COMMIT DROP")
}

pub(crate) fn staging_insert_sql(scratch: &str, columns: &[&str], rows: &[&Row]) -> String {
    let tuples = rows
        .iter()
        .map(|row| {
            let literals = columns
                .iter()
                .map(|col| {
                    row.get(col)
                        .map(sql_literal)
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({literals})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {scratch} ({}) VALUES {tuples}",
        columns.join(", ")
    )
}

pub(crate) fn merge_sql(
    table: &str,
    scratch: &str,
    columns: &[&str],
    conflict_keys: &[String],
) -> String {
    let assignments = columns
        .iter()
        .filter(|col| !conflict_keys.iter().any(|k| k == *col))
        .map(|col| format!("{col}=EXCLUDED.{col}"))
        .collect::<Vec<_>>()
        .join(", ");
    let action = if assignments.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {assignments}")
    };
    format!(
        "INSERT INTO {table} ({cols}) SELECT {cols} FROM {scratch} ON CONFLICT ({keys}) {action}",
        cols = columns.join(", "),
        keys = conflict_keys.join(", "),
    )
}

/// Keep the last occurrence per conflict-key tuple, preserving first-seen
/// order. The merge statement rejects a batch that touches one target row
/// twice, so intra-batch convergence happens here.
fn dedupe_last_wins<'a>(rows: &'a [Row], conflict_keys: &[String]) -> Vec<&'a Row> {
    let mut by_key: BTreeMap<String, usize> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let key = row.conflict_key(conflict_keys);
        if by_key.insert(key.clone(), idx).is_none() {
            order.push(key);
        }
    }
    order.iter().map(|key| &rows[by_key[key]]).collect()
}

/// Postgres implementation over one pooled connection, shared with the run
/// audit log for the duration of a single adapter run.
pub struct PgLoader {
    conn: Arc<Mutex<PoolConnection<Postgres>>>,
}

impl PgLoader {
    pub fn new(conn: Arc<Mutex<PoolConnection<Postgres>>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl BatchLoader for PgLoader {
    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_keys: &[String],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        check_identifier(table)?;
        let first = &rows[0];
        let columns = first.column_names();
        for col in &columns {
            check_identifier(col)?;
        }
        for key in conflict_keys {
            if !first.has_column(key) {
                return Err(StoreError::MissingConflictKey(key.clone()));
            }
        }

        let deduped = dedupe_last_wins(rows, conflict_keys);
        let suffix = Uuid::new_v4().simple().to_string();
        let scratch = scratch_table_name(table, &suffix);

        let mut guard = self.conn.lock().await;
        let mut tx = guard.begin().await?;
        sqlx::query(&create_scratch_sql(table, &scratch))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&staging_insert_sql(&scratch, &columns, &deduped))
            .execute(&mut *tx)
            .await?;
        let merged = sqlx::query(&merge_sql(table, &scratch, &columns, conflict_keys))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(merged.rows_affected())
    }
}

/// In-memory loader with the same conflict-key semantics; backs scheduler
/// and adapter tests that have no live Postgres.
#[derive(Default)]
pub struct MemoryLoader {
    tables: Mutex<BTreeMap<String, BTreeMap<String, Row>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.tables.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BatchLoader for MemoryLoader {
    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_keys: &[String],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for key in conflict_keys {
            if !rows[0].has_column(key) {
                return Err(StoreError::MissingConflictKey(key.clone()));
            }
        }
        let mut tables = self.tables.lock().await;
        let entry = tables.entry(table.to_string()).or_default();
        let deduped = dedupe_last_wins(rows, conflict_keys);
        let affected = deduped.len() as u64;
        for row in deduped {
            entry.insert(row.conflict_key(conflict_keys), row.clone());
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradewinds_core::Value;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merge_sql_updates_non_key_columns() {
        let sql = merge_sql(
            "metrics_ts",
            "scratch_metrics_ts_ab",
            &["series_id", "ts", "value"],
            &keys(&["series_id", "ts"]),
        );
        assert_eq!(
            sql,
            "INSERT INTO metrics_ts (series_id, ts, value) \
             SELECT series_id, ts, value FROM scratch_metrics_ts_ab \
             ON CONFLICT (series_id, ts) DO UPDATE SET value=EXCLUDED.value"
        );
    }

    #[test]
    fn merge_sql_with_only_key_columns_does_nothing_on_conflict() {
        let sql = merge_sql("seen_ids", "scratch_seen_ids_ab", &["id"], &keys(&["id"]));
        assert!(sql.ends_with("ON CONFLICT (id) DO NOTHING"));
    }

    #[test]
    fn staging_sql_escapes_text_and_renders_null_for_missing_columns() {
        let row = Row::new()
            .set("title", "O'Brien's rule")
            .set("severity", Value::Null);
        let sql = staging_insert_sql("scratch_policy_events_ab", &["title", "severity", "url"], &[&row]);
        assert_eq!(
            sql,
            "INSERT INTO scratch_policy_events_ab (title, severity, url) \
             VALUES ('O''Brien''s rule', NULL, NULL)"
        );
    }

    #[test]
    fn identifier_validation_rejects_injection_shapes() {
        assert!(valid_identifier("metrics_ts"));
        assert!(valid_identifier("_scratch"));
        assert!(!valid_identifier("metrics ts"));
        assert!(!valid_identifier("1table"));
        assert!(!valid_identifier("t;DROP TABLE x"));
        assert!(!valid_identifier(""));
    }

    #[test]
    fn intra_batch_duplicates_converge_to_the_last_row() {
        let rows = vec![
            Row::new().set("k", 1).set("v", "a"),
            Row::new().set("k", 2).set("v", "b"),
            Row::new().set("k", 1).set("v", "c"),
        ];
        let deduped = dedupe_last_wins(&rows, &keys(&["k"]));
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].get("v"), Some(&Value::Text("c".into())));
        assert_eq!(deduped[1].get("v"), Some(&Value::Text("b".into())));
    }

    #[tokio::test]
    async fn memory_loader_is_idempotent() {
        let loader = MemoryLoader::new();
        let rows = vec![
            Row::new().set("series_id", "effr").set("ts", "2024-01-01").set("value", 5.33),
            Row::new().set("series_id", "effr").set("ts", "2024-01-02").set("value", 5.31),
        ];
        let conflict = keys(&["series_id", "ts"]);
        loader.upsert("metrics_ts", &rows, &conflict).await.unwrap();
        loader.upsert("metrics_ts", &rows, &conflict).await.unwrap();
        assert_eq!(loader.row_count("metrics_ts").await, 2);
    }

    #[tokio::test]
    async fn memory_loader_last_write_wins() {
        let loader = MemoryLoader::new();
        let conflict = keys(&["k"]);
        loader
            .upsert("t", &[Row::new().set("k", 1).set("v", "a")], &conflict)
            .await
            .unwrap();
        loader
            .upsert("t", &[Row::new().set("k", 1).set("v", "b")], &conflict)
            .await
            .unwrap();
        let rows = loader.rows("t").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("v"), Some(&Value::Text("b".into())));
    }

    #[tokio::test]
    async fn empty_input_is_a_noop() {
        let loader = MemoryLoader::new();
        let affected = loader.upsert("t", &[], &keys(&["k"])).await.unwrap();
        assert_eq!(affected, 0);
        assert!(loader.table_names().await.is_empty());
    }

    #[tokio::test]
    async fn missing_conflict_key_is_reported() {
        let loader = MemoryLoader::new();
        let err = loader
            .upsert("t", &[Row::new().set("v", 1)], &keys(&["k"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingConflictKey(k) if k == "k"));
    }
}
