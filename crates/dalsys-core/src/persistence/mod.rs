//! The storage contract the stores are written against.
//!
//! Records cross this boundary as `Fields`: an ordered map from column name
//! to a plain `Value`. Dates travel as ISO `YYYY-MM-DD` text, booleans as
//! `0`/`1` and license classes as `1`/`2`, so any relational backend can hold
//! them without custom types.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryPersistence;
pub use sqlite::SqlitePersistence;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DalsysError, Result};
use crate::types::LicenseClass;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Drones,
    Operators,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Drones => "drones",
            Table::Operators => "operators",
        }
    }

    /// Writable columns, excluding the `id` primary key.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Drones => &["name", "class_type", "rescue", "operator_id"],
            Table::Operators => &[
                "first_name",
                "family_name",
                "date_of_birth",
                "drone_license",
                "rescue_endorsement",
                "operations",
                "drone_id",
            ],
        }
    }

    /// Rejects any column name this table does not have. `id` is allowed so
    /// it can be used as an order key.
    pub fn check_column(self, column: &str) -> Result<()> {
        if column == "id" || self.columns().contains(&column) {
            Ok(())
        } else {
            Err(DalsysError::UnknownColumn {
                table: self.as_str(),
                column: column.to_string(),
            })
        }
    }

    pub fn check_fields(self, fields: &Fields) -> Result<()> {
        fields.keys().try_for_each(|c| self.check_column(c))
    }

    /// Singular name used in `NotFound` errors.
    pub fn entity(self) -> &'static str {
        match self {
            Table::Drones => "drone",
            Table::Operators => "operator",
        }
    }

    pub fn not_found(self, id: u64) -> DalsysError {
        DalsysError::NotFound {
            entity: self.entity(),
            id,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Value / Fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Text(v.format(DATE_FORMAT).to_string())
    }
}

impl From<LicenseClass> for Value {
    fn from(v: LicenseClass) -> Self {
        Value::Integer(v.code())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

pub type Fields = BTreeMap<String, Value>;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Typed reads out of a fetched row. Absent columns read as `Null`.
pub struct Row<'a> {
    table: Table,
    id: u64,
    fields: &'a Fields,
}

impl<'a> Row<'a> {
    pub fn new(table: Table, id: u64, fields: &'a Fields) -> Self {
        Self { table, id, fields }
    }

    fn value(&self, column: &str) -> &Value {
        self.fields.get(column).unwrap_or(&Value::Null)
    }

    fn corrupt(&self, column: &str, expected: &str) -> DalsysError {
        DalsysError::CorruptRecord {
            table: self.table.as_str(),
            id: self.id,
            reason: format!("column '{column}' is not {expected}"),
        }
    }

    pub fn text(&self, column: &str) -> Result<Option<String>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Integer(_) => Err(self.corrupt(column, "text")),
        }
    }

    pub fn integer(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            Value::Text(_) => Err(self.corrupt(column, "an integer")),
        }
    }

    pub fn id(&self, column: &str) -> Result<Option<u64>> {
        self.integer(column)?
            .map(|i| u64::try_from(i).map_err(|_| self.corrupt(column, "a valid id")))
            .transpose()
    }

    pub fn flag(&self, column: &str) -> Result<bool> {
        Ok(self.integer(column)?.unwrap_or(0) != 0)
    }

    pub fn count(&self, column: &str) -> Result<u32> {
        let raw = self.integer(column)?.unwrap_or(0);
        u32::try_from(raw).map_err(|_| self.corrupt(column, "a non-negative count"))
    }

    pub fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        self.text(column)?
            .map(|s| {
                NaiveDate::parse_from_str(&s, DATE_FORMAT)
                    .map_err(|_| self.corrupt(column, "a YYYY-MM-DD date"))
            })
            .transpose()
    }

    pub fn class(&self, column: &str) -> Result<Option<LicenseClass>> {
        self.integer(column)?
            .map(|code| {
                LicenseClass::from_code(code).ok_or_else(|| self.corrupt(column, "class 1 or 2"))
            })
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Write / Persistence
// ---------------------------------------------------------------------------

/// One write inside an all-or-nothing batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Update { table: Table, id: u64, fields: Fields },
    Delete { table: Table, id: u64 },
}

/// Record storage used by the drone and operator stores.
///
/// Ids are assigned by the implementation from a monotonic sequence and are
/// never reused within one database.
pub trait Persistence {
    /// Insert a new row and return its assigned id.
    fn insert_record(&mut self, table: Table, fields: &Fields) -> Result<u64>;

    /// Overwrite the supplied columns of row `id`. Fails with `NotFound` if
    /// the row does not exist.
    fn update_record(&mut self, table: Table, id: u64, fields: &Fields) -> Result<()>;

    /// Fails with `NotFound` if the row does not exist.
    fn delete_record(&mut self, table: Table, id: u64) -> Result<()>;

    fn fetch_by_id(&self, table: Table, id: u64) -> Result<Option<Fields>>;

    /// All rows as `(id, fields)`, ascending by `order_key` then by id. Text
    /// keys compare without ASCII case.
    fn fetch_all(&self, table: Table, order_key: &str) -> Result<Vec<(u64, Fields)>>;

    /// Apply every write or none of them.
    fn write_batch(&mut self, writes: &[Write]) -> Result<()>;
}
