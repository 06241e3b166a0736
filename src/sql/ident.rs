//! Identifier quoting and the parameterized-SQL accumulator.
//!
//! Every column reference the engine emits is table-qualified; a bare
//! column identifier breaks silently as soon as any later join introduces
//! the same name, so `qualified` is the only way columns are rendered.

use serde_json::Value;

/// Quote an identifier for PostgreSQL (safe: names come from validated schemas).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Render `"table"."column"`.
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quoted(table), quoted(column))
}

/// SQL text plus positional params, bound in push order.
#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Register a param and return its 1-based placeholder number.
    pub fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder for a param, with an optional SQL cast (`$3::numeric`).
    pub fn placeholder(&mut self, v: Value, cast: Option<&str>) -> String {
        let n = self.push_param(v);
        match cast {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

impl Default for QueryBuf {
    fn default() -> Self {
        Self::new()
    }
}
