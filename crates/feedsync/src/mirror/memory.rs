use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::sync::CycleSummary;

use super::errors::Result;
use super::{CycleRecord, MirrorRecord, MirrorSnapshot, MirrorStore};

#[derive(Default)]
struct MemoryState {
    records: HashMap<(String, String), MirrorRecord>,
    cycles: Vec<CycleRecord>,
    writes: usize,
}

/// In-process mirror store.
///
/// Backs dry runs against a copied snapshot and the engine's tests. Clones
/// share the same state.
#[derive(Clone, Default)]
pub struct MemoryMirrorStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records(records: impl IntoIterator<Item = MirrorRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for record in records {
                state
                    .records
                    .insert((record.channel.clone(), record.sku.clone()), record);
            }
        }
        store
    }

    /// Number of upserts and deletes applied since creation.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MirrorStore for MemoryMirrorStore {
    async fn load(&self, channel: &str) -> Result<MirrorSnapshot> {
        let state = self.lock();
        Ok(state
            .records
            .values()
            .filter(|r| r.channel == channel)
            .map(|r| (r.sku.clone(), r.clone()))
            .collect())
    }

    async fn upsert(&self, record: &MirrorRecord) -> Result<()> {
        let mut state = self.lock();
        let key = (record.channel.clone(), record.sku.clone());
        let mut stored = record.clone();
        stored.updated_at = Utc::now();
        if let Some(existing) = state.records.get(&key) {
            stored.created_at = existing.created_at;
        }
        state.records.insert(key, stored);
        state.writes += 1;
        Ok(())
    }

    async fn delete(&self, channel: &str, sku: &str) -> Result<bool> {
        let mut state = self.lock();
        let removed = state
            .records
            .remove(&(channel.to_string(), sku.to_string()))
            .is_some();
        if removed {
            state.writes += 1;
        }
        Ok(removed)
    }

    async fn record_cycle(&self, summary: &CycleSummary) -> Result<()> {
        self.lock().cycles.push(CycleRecord::from(summary));
        Ok(())
    }

    async fn recent_cycles(&self, channel: &str, limit: u64) -> Result<Vec<CycleRecord>> {
        let state = self.lock();
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(state
            .cycles
            .iter()
            .rev()
            .filter(|c| c.channel == channel)
            .take(limit)
            .cloned()
            .collect())
    }
}
