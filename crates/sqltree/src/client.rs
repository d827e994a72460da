//! Backend connection trait.

use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;

/// Cursor over result rows, pulled one at a time.
pub type RowIter<'a> = Box<dyn Iterator<Item = OrmResult<Row>> + 'a>;

/// A database backend that executes `?`-placeholder SQL with positional values.
///
/// Implementations must surface their native errors: a nested `begin` or a
/// `commit` outside a transaction is reported, not absorbed.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Execute a query and return a cursor over its rows.
    ///
    /// The default implementation materializes the rows with [`Connection::query`].
    fn query_iter<'a>(&'a self, sql: &str, params: &[Value]) -> OrmResult<RowIter<'a>> {
        let rows = self.query(sql, params)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64>;

    /// SQL dialect spoken by this backend.
    fn dialect(&self) -> Dialect {
        Dialect::Generic
    }

    fn begin(&self) -> OrmResult<()> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    fn commit(&self) -> OrmResult<()> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    fn rollback(&self) -> OrmResult<()> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }

    /// Row id generated by the last successful INSERT, when the backend tracks one.
    fn last_insert_id(&self) -> Option<i64> {
        None
    }
}
