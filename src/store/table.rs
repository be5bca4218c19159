use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// On-disk layout. `next_id` only ever grows, so ids are never handed out
/// twice even after rows are removed.
#[derive(Serialize)]
struct Snapshot<'a, T> {
    next_id: u64,
    rows: &'a BTreeMap<u64, T>,
}

#[derive(Deserialize)]
struct StoredTable<T> {
    #[serde(default)]
    next_id: u64,
    rows: BTreeMap<u64, T>,
}

/// A map of id -> row persisted as one JSON file. Rows iterate in ascending
/// id order.
#[derive(Debug)]
pub struct Table<T> {
    path: PathBuf,
    next_id: u64,
    rows: BTreeMap<u64, T>,
}

impl<T> Table<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Loads `<dir>/<name>.json`, starting empty when the file does not exist.
    pub async fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(format!("{name}.json"));
        let stored = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoredTable {
                next_id: 1,
                rows: BTreeMap::new(),
            },
            Err(err) => return Err(err.into()),
        };
        let floor = stored.rows.keys().next_back().map_or(1, |max| max + 1);
        let next_id = stored.next_id.max(floor);
        debug!(path = %path.display(), next_id, "Loaded table");
        Ok(Self {
            path,
            next_id,
            rows: stored.rows,
        })
    }

    /// Writes the table to a temporary file, then renames it into place.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&Snapshot {
            next_id: self.next_id,
            rows: &self.rows,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Reserves a fresh id. Removing or clearing rows never lowers the
    /// counter.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    pub fn insert(&mut self, id: u64, row: T) {
        self.next_id = self.next_id.max(id.saturating_add(1));
        self.rows.insert(id, row);
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.rows.remove(&id)
    }

    pub fn clear(&mut self) -> usize {
        let count = self.rows.len();
        self.rows.clear();
        count
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
