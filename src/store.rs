//! In-memory mock resource store: one record, many IDs.
//!
//! Records live in an arena keyed by a monotonic handle; an ID index and a
//! base-path index both point at handles, so aliases never form ownership
//! cycles and deleting by any alias removes all of them. All operations run
//! under one readers-writer lock and never await while holding it, so each
//! mutation is atomic to observers.

use crate::error::MockError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A stored mock resource: the body of the POST/PUT that created it plus
/// enough metadata to serve it back.
#[derive(Debug, Clone)]
pub struct MockRecord {
    /// Alias set, in assignment order. Every ID resolves to this record.
    pub ids: Vec<String>,
    /// URL path of the creating request, trailing `/` stripped.
    pub base_path: String,
    pub content_type: String,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
struct StoreInner {
    next_handle: u64,
    records: HashMap<u64, MockRecord>,
    by_id: HashMap<String, u64>,
    by_path: HashMap<String, Vec<u64>>,
}

/// Keyed storage of mock resources with multi-ID aliasing and path lookup.
#[derive(Debug, Default)]
pub struct MockStore {
    inner: RwLock<StoreInner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under every ID in `record.ids`. Fails with `Conflict`
    /// if any of them is already taken; on failure nothing is stored.
    pub async fn create(&self, record: MockRecord) -> Result<(), MockError> {
        let mut g = self.inner.write().await;
        for id in &record.ids {
            if g.by_id.contains_key(id) {
                return Err(MockError::Conflict(format!("id {id:?} already exists")));
            }
        }
        let handle = g.next_handle;
        g.next_handle += 1;
        for id in &record.ids {
            g.by_id.insert(id.clone(), handle);
        }
        g.by_path
            .entry(record.base_path.clone())
            .or_default()
            .push(handle);
        g.records.insert(handle, record);
        Ok(())
    }

    /// Replace the body, content type, and location of the record aliased by
    /// `id`. The alias set and base path are preserved.
    pub async fn update(
        &self,
        id: &str,
        body: Vec<u8>,
        content_type: String,
        location: Option<String>,
    ) -> Result<MockRecord, MockError> {
        let mut g = self.inner.write().await;
        let handle = *g.by_id.get(id).ok_or(MockError::NotFound)?;
        let record = g
            .records
            .get_mut(&handle)
            .ok_or_else(|| MockError::Internal(format!("dangling id index entry {id:?}")))?;
        record.body = body;
        record.content_type = content_type;
        record.location = location;
        Ok(record.clone())
    }

    pub async fn get(&self, id: &str) -> Option<MockRecord> {
        let g = self.inner.read().await;
        let handle = g.by_id.get(id)?;
        g.records.get(handle).cloned()
    }

    /// Records whose base path equals `prefix` or lives under `prefix + "/"`,
    /// in insertion order.
    pub async fn get_by_path(&self, prefix: &str) -> Vec<MockRecord> {
        let g = self.inner.read().await;
        let mut handles = collect_by_prefix(&g, prefix);
        handles.sort_unstable();
        handles
            .iter()
            .filter_map(|h| g.records.get(h).cloned())
            .collect()
    }

    /// Remove the record aliased by `id` along with its entire alias set.
    pub async fn delete(&self, id: &str) -> Result<(), MockError> {
        let mut g = self.inner.write().await;
        let handle = *g.by_id.get(id).ok_or(MockError::NotFound)?;
        remove_handle(&mut g, handle);
        Ok(())
    }

    /// Remove every record under `prefix` (same containment rule as
    /// `get_by_path`). Returns how many records were removed.
    pub async fn delete_by_path(&self, prefix: &str) -> usize {
        let mut g = self.inner.write().await;
        let handles = collect_by_prefix(&g, prefix);
        for handle in &handles {
            remove_handle(&mut g, *handle);
        }
        handles.len()
    }
}

fn collect_by_prefix(inner: &StoreInner, prefix: &str) -> Vec<u64> {
    let child_prefix = format!("{prefix}/");
    inner
        .by_path
        .iter()
        .filter(|(path, _)| *path == prefix || path.starts_with(&child_prefix))
        .flat_map(|(_, handles)| handles.iter().copied())
        .collect()
}

fn remove_handle(inner: &mut StoreInner, handle: u64) {
    let Some(record) = inner.records.remove(&handle) else {
        return;
    };
    for id in &record.ids {
        inner.by_id.remove(id);
    }
    let now_empty = match inner.by_path.get_mut(&record.base_path) {
        Some(handles) => {
            handles.retain(|h| *h != handle);
            handles.is_empty()
        }
        None => false,
    };
    if now_empty {
        inner.by_path.remove(&record.base_path);
    }
}
