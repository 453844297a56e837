use serde_json::Value;

use crate::error::Result;
use crate::table::Table;

/// All entries of a fully paginated query, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<Value>,
    declared: u64,
    pages: usize,
}

impl ResultSet {
    pub(crate) fn new(entries: Vec<Value>, declared: u64, pages: usize) -> Self {
        Self {
            entries,
            declared,
            pages,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit count announced by the service.
    pub fn declared_count(&self) -> u64 {
        self.declared
    }

    /// Number of non-empty pages received.
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<Value> {
        self.entries
    }

    pub fn into_table<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Result<Table> {
        Table::from_entries(columns, self.entries)
    }
}

impl IntoIterator for ResultSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
