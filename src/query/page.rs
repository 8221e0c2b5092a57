//! Paginated results

use serde::Serialize;
use serde_json::Value;

/// One page of rows plus the total size of the filtered set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentPage {
    /// Size of the filtered set, independent of pagination
    pub total: u64,
    pub rows: Vec<Value>,
}

impl EquipmentPage {
    pub fn new(total: u64, rows: Vec<Value>) -> Self {
        Self { total, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column across the page
    pub fn column(&self, key: &str) -> Vec<&Value> {
        self.rows.iter().filter_map(|row| row.get(key)).collect()
    }
}
