use std::collections::HashMap;

use crate::model::SecurityKey;

/// Last observed price per (security, user) pair.
///
/// Mutated only from within a monitoring cycle, which runs on a single
/// logical worker at a time, so no internal locking is needed. Entries are
/// never evicted; growth is bounded by the number of distinct pairs seen.
#[derive(Debug, Default)]
pub struct PriceHistory {
    entries: HashMap<(SecurityKey, i64), f64>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SecurityKey, user_id: i64) -> Option<f64> {
        self.entries.get(&(key.clone(), user_id)).copied()
    }

    pub fn set(&mut self, key: SecurityKey, user_id: i64, price: f64) {
        self.entries.insert((key, user_id), price);
    }

    // Entry count; the hook for a future pruning/maintenance operation.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
