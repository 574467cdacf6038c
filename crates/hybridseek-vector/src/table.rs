//! LanceDB connection and housekeeping helpers.
//!
//! Provides database open functions, an ensure helper for tables, and a simple
//! key/value metadata table that backs the index catalog.

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::collections::BTreeMap;
use std::sync::Arc;

use hybridseek_core::error::{Error, Result};

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri)
        .execute()
        .await
        .map_err(|e| Error::upstream("lancedb", format!("cannot open '{uri}': {e}")))
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(Error::storage)?;
    Ok(names.iter().any(|n| n == name))
}

/// Create an empty table unless it exists. Returns whether it was created.
/// Losing a creation race to another writer counts as "exists".
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<bool> {
    if table_exists(conn, name).await? {
        return Ok(false);
    }
    match conn.create_empty_table(name, schema).execute().await {
        Ok(_) => Ok(true),
        Err(lancedb::Error::TableAlreadyExists { .. }) => Ok(false),
        Err(e) => Err(Error::storage(e)),
    }
}

// Simple key/value meta table, used for the index catalog
pub async fn ensure_meta_table(conn: &Connection, name: &str) -> Result<()> {
    ensure_table(conn, name, build_meta_schema()).await.map(|_| ())
}

pub async fn set_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
    ensure_meta_table(conn, table).await?;
    let t = conn.open_table(table).execute().await.map_err(Error::storage)?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )
    .map_err(Error::storage)?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // Upsert behavior via merge_insert: key is unique
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(Error::storage)?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, table).await? {
        return Ok(None);
    }
    let t = conn.open_table(table).execute().await.map_err(Error::storage)?;
    let mut stream = t
        .query()
        .only_if(format!("key = '{}'", key.replace('\'', "''")))
        .execute()
        .await
        .map_err(Error::storage)?;
    while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
        if batch.num_rows() == 0 {
            continue;
        }
        let val = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::storage("meta.value column missing"))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

/// All `(key, value)` pairs whose key starts with `prefix`, sorted by key.
/// Concurrent first writes of one key can both insert; such a key is
/// reported once.
pub async fn list_meta(conn: &Connection, table: &str, prefix: &str) -> Result<Vec<(String, String)>> {
    if !table_exists(conn, table).await? {
        return Ok(vec![]);
    }
    let t = conn.open_table(table).execute().await.map_err(Error::storage)?;
    let mut stream = t.query().execute().await.map_err(Error::storage)?;
    let mut out = BTreeMap::new();
    while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
        let keys = batch
            .column_by_name("key")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::storage("meta.key column missing"))?;
        let vals = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::storage("meta.value column missing"))?;
        for i in 0..batch.num_rows() {
            if keys.value(i).starts_with(prefix) {
                out.insert(keys.value(i).to_string(), vals.value(i).to_string());
            }
        }
    }
    Ok(out.into_iter().collect())
}
