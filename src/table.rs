use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

use crate::error::{Error, Result};
use crate::page::json_kind;

static NULL: Value = Value::Null;

/// Column-titled rows of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from selected rows or raw entries.
    ///
    /// Array rows are positional; shorter ones are padded with nulls.
    /// Object rows are read by column title.
    pub fn from_entries<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        entries: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let mut table = Self::new(columns);
        for entry in entries {
            match entry {
                Value::Array(row) => table.push_row(row)?,
                Value::Object(obj) => {
                    let row = table
                        .columns
                        .iter()
                        .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    table.rows.push(row);
                }
                other => {
                    return Err(Error::Shape(format!(
                        "cannot make a table row from a {}",
                        json_kind(&other)
                    )));
                }
            }
        }
        Ok(table)
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(Error::Shape(format!(
                "{} column(s) passed, row has {} value(s)",
                self.columns.len(),
                row.len()
            )));
        }
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.get(idx).unwrap_or(&NULL)).collect())
    }

    /// Numeric view of a column; non-numbers become `None`.
    pub fn column_f64(&self, name: &str) -> Option<Vec<Option<f64>>> {
        Some(self.column(name)?.into_iter().map(Value::as_f64).collect())
    }

    /// Keeps only the given columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let idx = names
            .iter()
            .map(|n| {
                self.column_index(n.as_ref())
                    .ok_or_else(|| Error::Shape(format!("no column `{}`", n.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r.get(i).cloned().unwrap_or(Value::Null)).collect())
                .collect(),
        })
    }

    /// Keeps the rows for which `keep` holds.
    pub fn filter(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(csv_cell))?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Export(e.to_string()))
    }
}

pub(crate) fn csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
