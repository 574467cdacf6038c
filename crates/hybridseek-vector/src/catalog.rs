//! Index catalog persisted in the LanceDB `meta` table.
//!
//! Each index descriptor is stored as JSON under `index:<name>`. The catalog
//! is the source of truth for whether an index "exists"; physical structures
//! (the chunk table, Tantivy directories) are created alongside.

use lancedb::Connection;

use hybridseek_core::error::{Error, Result};
use hybridseek_core::types::IndexDescriptor;

use crate::table::{get_meta, list_meta, set_meta};

pub const META_TABLE: &str = "meta";
const KEY_PREFIX: &str = "index:";

#[derive(Clone)]
pub struct IndexCatalog {
    db: Connection,
}

impl IndexCatalog {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }

    pub async fn get(&self, name: &str) -> Result<Option<IndexDescriptor>> {
        let Some(raw) = get_meta(&self.db, META_TABLE, &key(name)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::storage(format!("corrupt catalog entry for '{name}': {e}")))
    }

    pub async fn put(&self, descriptor: &IndexDescriptor) -> Result<()> {
        let raw = serde_json::to_string(descriptor).map_err(Error::storage)?;
        set_meta(&self.db, META_TABLE, &key(&descriptor.name), &raw).await
    }

    pub async fn list(&self) -> Result<Vec<IndexDescriptor>> {
        list_meta(&self.db, META_TABLE, KEY_PREFIX)
            .await?
            .into_iter()
            .map(|(k, raw)| {
                serde_json::from_str(&raw).map_err(|e| Error::storage(format!("corrupt catalog entry '{k}': {e}")))
            })
            .collect()
    }
}

fn key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}
