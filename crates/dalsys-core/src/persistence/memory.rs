use std::collections::BTreeMap;

use crate::error::Result;

use super::{Fields, Persistence, Table, Value, Write};

#[derive(Debug, Clone, Default)]
struct TableData {
    rows: BTreeMap<u64, Fields>,
    last_id: u64,
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    tables: BTreeMap<Table, TableData>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: Table) -> Option<&TableData> {
        self.tables.get(&table)
    }

    fn table_mut(&mut self, table: Table) -> &mut TableData {
        self.tables.entry(table).or_default()
    }

    fn apply(&mut self, write: &Write) -> Result<()> {
        match write {
            Write::Update { table, id, fields } => self.update_record(*table, *id, fields),
            Write::Delete { table, id } => self.delete_record(*table, *id),
        }
    }
}

/// Text compares without ASCII case, like SQLite's `NOCASE` collation.
fn sort_key(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Text(s)) => Value::Text(s.to_ascii_lowercase()),
        Some(v) => v.clone(),
        None => Value::Null,
    }
}

impl Persistence for MemoryPersistence {
    fn insert_record(&mut self, table: Table, fields: &Fields) -> Result<u64> {
        table.check_fields(fields)?;
        let data = self.table_mut(table);
        data.last_id += 1;
        let id = data.last_id;
        data.rows.insert(id, fields.clone());
        Ok(id)
    }

    fn update_record(&mut self, table: Table, id: u64, fields: &Fields) -> Result<()> {
        table.check_fields(fields)?;
        let row = self
            .table_mut(table)
            .rows
            .get_mut(&id)
            .ok_or_else(|| table.not_found(id))?;
        for (column, value) in fields {
            row.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    fn delete_record(&mut self, table: Table, id: u64) -> Result<()> {
        self.table_mut(table)
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| table.not_found(id))
    }

    fn fetch_by_id(&self, table: Table, id: u64) -> Result<Option<Fields>> {
        Ok(self.table(table).and_then(|t| t.rows.get(&id)).cloned())
    }

    fn fetch_all(&self, table: Table, order_key: &str) -> Result<Vec<(u64, Fields)>> {
        table.check_column(order_key)?;
        let mut rows: Vec<(u64, Fields)> = self
            .table(table)
            .map(|t| t.rows.iter().map(|(id, f)| (*id, f.clone())).collect())
            .unwrap_or_default();

        if order_key != "id" {
            // Stable sort keeps id order among equal keys.
            rows.sort_by_cached_key(|(_, f)| sort_key(f.get(order_key)));
        }
        Ok(rows)
    }

    fn write_batch(&mut self, writes: &[Write]) -> Result<()> {
        let mut staged = self.clone();
        for write in writes {
            staged.apply(write)?;
        }
        *self = staged;
        Ok(())
    }
}
