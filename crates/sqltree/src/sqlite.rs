//! SQLite backend over `rusqlite`.
//!
//! Uses a plain `Mutex<rusqlite::Connection>`; there is no pooling.

use crate::client::Connection;
use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;
use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, ValueRef};
use std::path::Path;
use tracing::debug;

/// A single SQLite connection usable from multiple threads.
pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        debug!(target: "sqltree.sql", path = %path.display(), "opening SQLite database");
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> OrmResult<Self> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a batch of `;`-separated statements without parameters (schema setup).
    pub fn execute_batch(&self, sql: &str) -> OrmResult<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Run `f` with the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> OrmResult<T>) -> OrmResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(sqlite_row) = rows.next()? {
            let mut row = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                row.push(name.clone(), value_from_ref(sqlite_row.get_ref(idx)?));
            }
            out.push(row);
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let affected = self
            .conn
            .lock()
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin(&self) -> OrmResult<()> {
        self.execute_batch("BEGIN")
    }

    fn commit(&self) -> OrmResult<()> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&self) -> OrmResult<()> {
        self.execute_batch("ROLLBACK")
    }

    fn last_insert_id(&self) -> Option<i64> {
        match self.conn.lock().last_insert_rowid() {
            0 => None,
            id => Some(id),
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Int(n) => ToSqlOutput::Owned(Sql::Integer(*n)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Timestamp(ts) => ToSqlOutput::Owned(Sql::Text(ts.to_rfc3339())),
            Value::Uuid(id) => ToSqlOutput::Owned(Sql::Text(id.to_string())),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> SqliteConnection {
        let db = SqliteConnection::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, price REAL, data BLOB);",
        )
        .unwrap();
        db
    }

    #[test]
    fn round_trips_values() {
        let db = db();
        let affected = db
            .execute(
                "INSERT INTO items (name, price, data) VALUES (?, ?, ?)",
                &[Value::from("pen"), Value::Float(1.5), Value::Bytes(vec![1, 2])],
            )
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(db.last_insert_id(), Some(1));

        let rows = db.query("SELECT * FROM items WHERE name = ?", &[Value::from("pen")]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("price"), Some(&Value::Float(1.5)));
        assert_eq!(rows[0].get("data"), Some(&Value::Bytes(vec![1, 2])));
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), ["id", "name", "price", "data"]);
    }

    #[test]
    fn nested_begin_surfaces_native_error() {
        let db = db();
        db.begin().unwrap();
        let err = db.begin().unwrap_err();
        assert!(err.is_backend());
        db.rollback().unwrap();
        assert!(db.commit().unwrap_err().is_backend());
    }

    #[test]
    fn syntax_errors_are_backend_errors() {
        let err = db().query("SELEC nope", &[]).unwrap_err();
        assert!(err.is_backend());
    }
}
