//! Typed reads of scalar fields from named global tables, with defaults.
//!
//! A missing table, a non-table global, a missing key or a wrong dynamic
//! type all fall back to the caller-supplied default.

use skald_script::Value;

use crate::runtime::Runtime;

impl Runtime {
    pub fn read_i32(&self, table: &str, key: &str, default: i32) -> i32 {
        self.read_num(table, key).map(|n| n as i32).unwrap_or(default)
    }

    pub fn read_u32(&self, table: &str, key: &str, default: u32) -> u32 {
        self.read_num(table, key).map(|n| n as u32).unwrap_or(default)
    }

    pub fn read_f32(&self, table: &str, key: &str, default: f32) -> f32 {
        self.read_num(table, key).map(|n| n as f32).unwrap_or(default)
    }

    /// Strings pass through; numbers coerce via the VM's formatting rule.
    pub fn read_str(&self, table: &str, key: &str, default: &str) -> String {
        self.read_field(table, key)
            .and_then(|v| v.coerce_str())
            .unwrap_or_else(|| default.to_string())
    }

    fn read_num(&self, table: &str, key: &str) -> Option<f64> {
        self.read_field(table, key).and_then(|v| v.as_num())
    }

    fn read_field(&self, table: &str, key: &str) -> Option<Value> {
        match self.vm.get_global(table) {
            Some(Value::Table(t)) => t.borrow().get(key),
            _ => None,
        }
    }
}
