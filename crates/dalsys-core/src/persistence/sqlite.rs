//! SQLite storage via rusqlite.
//!
//! One table per record kind; every column other than `id` is nullable so a
//! candidate's absent fields persist as `NULL`. Ids come from
//! `AUTOINCREMENT`, which never hands out a deleted row's id again.

use std::path::Path;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use crate::error::{DalsysError, Result};

use super::{Fields, Persistence, Table, Value, Write};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS operators (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name         TEXT,
    family_name        TEXT,
    date_of_birth      TEXT,
    drone_license      INTEGER,
    rescue_endorsement INTEGER NOT NULL DEFAULT 0,
    operations         INTEGER NOT NULL DEFAULT 0,
    drone_id           INTEGER
);
CREATE TABLE IF NOT EXISTS drones (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT,
    class_type  INTEGER,
    rescue      INTEGER NOT NULL DEFAULT 0,
    operator_id INTEGER REFERENCES operators(id)
);
";

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Text(s) => ToSqlOutput::Borrowed(s.as_str().into()),
        })
    }
}

pub struct SqlitePersistence {
    conn: Connection,
}

impl SqlitePersistence {
    /// Open or create the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys=ON;", [])?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

// ---------------------------------------------------------------------------
// Statement helpers (shared by the plain connection and batch transactions)
// ---------------------------------------------------------------------------

fn update(conn: &Connection, table: Table, id: u64, fields: &Fields) -> Result<()> {
    table.check_fields(fields)?;
    if fields.is_empty() {
        return match exists(conn, table, id)? {
            true => Ok(()),
            false => Err(table.not_found(id)),
        };
    }
    let assignments: Vec<String> = fields
        .keys()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE {table} SET {} WHERE id = ?{}",
        assignments.join(", "),
        fields.len() + 1
    );
    let mut params: Vec<Value> = fields.values().cloned().collect();
    params.push(Value::Integer(sql_id(id)));

    let changed = conn.execute(&sql, params_from_iter(params))?;
    if changed == 0 {
        return Err(table.not_found(id));
    }
    Ok(())
}

fn delete(conn: &Connection, table: Table, id: u64) -> Result<()> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [sql_id(id)])?;
    if changed == 0 {
        return Err(table.not_found(id));
    }
    Ok(())
}

fn exists(conn: &Connection, table: Table, id: u64) -> Result<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            [sql_id(id)],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn select_list(table: Table) -> String {
    let mut columns = vec!["id"];
    columns.extend_from_slice(table.columns());
    columns.join(", ")
}

fn read_row(table: Table, row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, Vec<SqlValue>)> {
    let id: i64 = row.get(0)?;
    let values = (0..table.columns().len())
        .map(|i| row.get::<_, SqlValue>(i + 1))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((id, values))
}

fn into_fields(table: Table, raw_id: i64, values: Vec<SqlValue>) -> Result<(u64, Fields)> {
    let id = u64::try_from(raw_id).map_err(|_| DalsysError::CorruptRecord {
        table: table.as_str(),
        id: 0,
        reason: format!("negative id {raw_id}"),
    })?;
    let mut fields = Fields::new();
    for (column, value) in table.columns().iter().zip(values) {
        let value = match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(i),
            SqlValue::Text(s) => Value::Text(s),
            SqlValue::Real(_) | SqlValue::Blob(_) => {
                return Err(DalsysError::CorruptRecord {
                    table: table.as_str(),
                    id,
                    reason: format!("column '{column}' has an unsupported type"),
                })
            }
        };
        fields.insert((*column).to_string(), value);
    }
    Ok((id, fields))
}

fn sql_id(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Persistence for SqlitePersistence {
    fn insert_record(&mut self, table: Table, fields: &Fields) -> Result<u64> {
        table.check_fields(fields)?;
        if fields.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {table} DEFAULT VALUES"), [])?;
        } else {
            let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
            let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            );
            self.conn.execute(&sql, params_from_iter(fields.values()))?;
        }
        let id = self.conn.last_insert_rowid();
        u64::try_from(id).map_err(|_| DalsysError::CorruptRecord {
            table: table.as_str(),
            id: 0,
            reason: format!("negative id {id}"),
        })
    }

    fn update_record(&mut self, table: Table, id: u64, fields: &Fields) -> Result<()> {
        update(&self.conn, table, id, fields)
    }

    fn delete_record(&mut self, table: Table, id: u64) -> Result<()> {
        delete(&self.conn, table, id)
    }

    fn fetch_by_id(&self, table: Table, id: u64) -> Result<Option<Fields>> {
        let sql = format!("SELECT {} FROM {table} WHERE id = ?1", select_list(table));
        let raw = self
            .conn
            .query_row(&sql, [sql_id(id)], |row| read_row(table, row))
            .optional()?;
        raw.map(|(raw_id, values)| into_fields(table, raw_id, values).map(|(_, f)| f))
            .transpose()
    }

    fn fetch_all(&self, table: Table, order_key: &str) -> Result<Vec<(u64, Fields)>> {
        table.check_column(order_key)?;
        let sql = format!(
            "SELECT {} FROM {table} ORDER BY {order_key} COLLATE NOCASE, id",
            select_list(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map([], |row| read_row(table, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter()
            .map(|(raw_id, values)| into_fields(table, raw_id, values))
            .collect()
    }

    fn write_batch(&mut self, writes: &[Write]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for write in writes {
            match write {
                Write::Update { table, id, fields } => update(&tx, *table, *id, fields)?,
                Write::Delete { table, id } => delete(&tx, *table, *id)?,
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn operator_fields(family: &str) -> Fields {
        let mut f = Fields::new();
        f.insert("first_name".into(), Value::from("Ada"));
        f.insert("family_name".into(), Value::from(family));
        f.insert("drone_license".into(), Value::Integer(2));
        f
    }

    #[test]
    fn insert_fetch_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dalsys.db");
        let id = {
            let mut db = SqlitePersistence::open(&path).unwrap();
            db.insert_record(Table::Operators, &operator_fields("Lovelace"))
                .unwrap()
        };

        let db = SqlitePersistence::open(&path).unwrap();
        let row = db.fetch_by_id(Table::Operators, id).unwrap().unwrap();
        assert_eq!(row.get("family_name"), Some(&Value::from("Lovelace")));
        assert_eq!(row.get("date_of_birth"), Some(&Value::Null));
        assert_eq!(row.get("operations"), Some(&Value::Integer(0)));
    }

    #[test]
    fn fetch_all_orders_by_key() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        db.insert_record(Table::Operators, &operator_fields("Turing"))
            .unwrap();
        db.insert_record(Table::Operators, &operator_fields("Hopper"))
            .unwrap();

        let names: Vec<Value> = db
            .fetch_all(Table::Operators, "family_name")
            .unwrap()
            .into_iter()
            .map(|(_, f)| f["family_name"].clone())
            .collect();
        assert_eq!(names, vec![Value::from("Hopper"), Value::from("Turing")]);
    }

    #[test]
    fn fetch_all_ignores_case() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        for family in ["Zed", "de Vries", "Abbot"] {
            db.insert_record(Table::Operators, &operator_fields(family))
                .unwrap();
        }
        let names: Vec<Value> = db
            .fetch_all(Table::Operators, "family_name")
            .unwrap()
            .into_iter()
            .map(|(_, f)| f["family_name"].clone())
            .collect();
        assert_eq!(
            names,
            vec![Value::from("Abbot"), Value::from("de Vries"), Value::from("Zed")]
        );
    }

    #[test]
    fn update_and_delete_unknown_id_are_not_found() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        assert!(matches!(
            db.update_record(Table::Operators, 5, &operator_fields("X")),
            Err(DalsysError::NotFound { id: 5, .. })
        ));
        assert!(matches!(
            db.delete_record(Table::Drones, 5),
            Err(DalsysError::NotFound { id: 5, .. })
        ));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        let a = db.insert_record(Table::Operators, &operator_fields("A")).unwrap();
        db.delete_record(Table::Operators, a).unwrap();
        let b = db.insert_record(Table::Operators, &operator_fields("B")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn failed_batch_rolls_back() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        let id = db
            .insert_record(Table::Operators, &operator_fields("Lovelace"))
            .unwrap();
        let writes = vec![
            Write::Update {
                table: Table::Operators,
                id,
                fields: operator_fields("Byron"),
            },
            Write::Update {
                table: Table::Drones,
                id: 77,
                fields: Fields::new(),
            },
        ];
        assert!(db.write_batch(&writes).is_err());

        let row = db.fetch_by_id(Table::Operators, id).unwrap().unwrap();
        assert_eq!(row.get("family_name"), Some(&Value::from("Lovelace")));
    }

    #[test]
    fn unknown_column_is_rejected_before_sql() {
        let mut db = SqlitePersistence::open_in_memory().unwrap();
        let mut fields = Fields::new();
        fields.insert("nickname".into(), Value::from("x"));
        assert!(matches!(
            db.insert_record(Table::Drones, &fields),
            Err(DalsysError::UnknownColumn { .. })
        ));
    }
}
