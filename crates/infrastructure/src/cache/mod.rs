use httpdns_domain::{HostRecord, RecordFamily};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    a: HashMap<String, HostRecord>,
    aaaa: HashMap<String, HostRecord>,
}

impl Tables {
    fn table(&self, family: RecordFamily) -> &HashMap<String, HostRecord> {
        match family {
            RecordFamily::A => &self.a,
            RecordFamily::Aaaa => &self.aaaa,
        }
    }

    fn table_mut(&mut self, family: RecordFamily) -> &mut HashMap<String, HostRecord> {
        match family {
            RecordFamily::A => &mut self.a,
            RecordFamily::Aaaa => &mut self.aaaa,
        }
    }
}

/// Thread-safe TTL store: one map per record family behind a single mutex.
/// A cache key maps to at most one live entry per family. Readers get
/// clones, so no caller ever observes a write half-applied and mutating a
/// returned record cannot touch the stored one.
///
/// Expiry is the caller's concern: `get` returns stale entries too, because
/// the allow-expired-IP policy needs them.
pub struct RecordCache {
    tables: Mutex<Tables>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    pub fn get(&self, key: &str, family: RecordFamily) -> Option<HostRecord> {
        let tables = self.tables.lock().expect("cache mutex poisoned");
        tables.table(family).get(key).cloned()
    }

    /// Insert or atomically replace the entry for (key, family). The old
    /// entry is dropped after the lock is released.
    pub fn add(&self, record: HostRecord) {
        let old = {
            let mut tables = self.tables.lock().expect("cache mutex poisoned");
            tables
                .table_mut(record.family)
                .insert(record.cache_key.clone(), record)
        };
        drop(old);
    }

    pub fn delete(&self, key: &str, family: RecordFamily) {
        let removed = {
            let mut tables = self.tables.lock().expect("cache mutex poisoned");
            tables.table_mut(family).remove(key)
        };
        drop(removed);
    }

    /// Drain both maps under the lock, then drop the drained entries after
    /// releasing it, so destruction never blocks other cache operations.
    pub fn clear(&self) {
        let drained: Vec<HostRecord> = {
            let mut guard = self.tables.lock().expect("cache mutex poisoned");
            let tables = &mut *guard;
            tables
                .a
                .drain()
                .chain(tables.aaaa.drain())
                .map(|(_, record)| record)
                .collect()
        };
        debug!(entries = drained.len(), "cache cleared");
        drop(drained);
    }

    /// Keys whose cache key equals their host, i.e. everything except
    /// entries created under a caller-supplied custom key. Batch
    /// cache-renewal on network change uses this so parameterized queries
    /// are not blindly re-issued.
    pub fn list_keys(&self, family: RecordFamily, exclude_custom: bool) -> Vec<String> {
        let tables = self.tables.lock().expect("cache mutex poisoned");
        tables
            .table(family)
            .iter()
            .filter(|(key, record)| !exclude_custom || **key == record.host)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        let tables = self.tables.lock().expect("cache mutex poisoned");
        tables.a.len() + tables.aaaa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}
