use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use super::error::StorageError;

/// One table row as a flat field map.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// Table binding: name, primary key and the typed column list.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [Column],
    /// Written on insert, never on update.
    pub insert_only: &'static [&'static str],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Result<&Column, StorageError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StorageError::UnknownColumn {
                table: self.name.to_string(),
                column: name.to_string(),
            })
    }
}

/// A typed record persisted as one row of its table.
pub trait Entity:
    Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const SCHEMA: TableSchema;

    /// Name used in user-facing messages ("Post with id ...").
    const LABEL: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Refreshes auto-managed timestamps before a write.
    fn touch(&mut self, now: NaiveDateTime, is_new: bool);

    fn validate(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Every field, unset ones as `null`.
    fn to_data(&self) -> Result<Row, StorageError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Database(format!(
                "{} did not serialize to a row: {}",
                Self::LABEL,
                other
            ))),
        }
    }

    /// Set fields only; unset fields are left out of the row.
    fn to_row(&self) -> Result<Row, StorageError> {
        Ok(self
            .to_data()?
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect())
    }

    fn from_row(row: Row) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}
