use std::collections::HashMap;

use serde_json::Value;

pub const USERS_LIST: &str = "users.list";
pub const USERS_STATS: &str = "users.stats";

/// Memoized query results keyed by `"{query}:{params}"`. Writers invalidate
/// by query name so the next read goes back to the store.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<String, Value>,
}

impl QueryCache {
    pub fn key(query: &str, params: &Value) -> String {
        format!("{query}:{params}")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn invalidate(&mut self, query: &str) -> usize {
        let prefix = format!("{query}:");
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(&prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
