#![allow(dead_code)]

use parking_lot::Mutex;
use sqltree::{Connection, Dialect, OrmError, OrmResult, Row, Value};

/// In-memory backend that answers queries from a script and records every call.
#[derive(Default)]
pub struct ScriptedConnection {
    rules: Vec<(String, Vec<Row>)>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    in_transaction: Mutex<bool>,
    dialect: Dialect,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries whose SQL contains `fragment` with `rows`. First match wins.
    pub fn on(mut self, fragment: &str, rows: Vec<Row>) -> Self {
        self.rules.push((fragment.to_string(), rows));
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls whose SQL contains `fragment`.
    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(sql, _)| sql.contains(fragment))
            .count()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.calls.lock().push((sql.to_string(), params.to_vec()));
    }
}

impl Connection for ScriptedConnection {
    fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(sql, params);
        if sql.contains("FAIL") {
            return Err(OrmError::backend(format!("no such table in: {sql}")));
        }
        Ok(self
            .rules
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.record(sql, params);
        Ok(1)
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn begin(&self) -> OrmResult<()> {
        self.record("BEGIN", &[]);
        let mut active = self.in_transaction.lock();
        if *active {
            return Err(OrmError::backend("cannot start a transaction within a transaction"));
        }
        *active = true;
        Ok(())
    }

    fn commit(&self) -> OrmResult<()> {
        self.record("COMMIT", &[]);
        let mut active = self.in_transaction.lock();
        if !*active {
            return Err(OrmError::backend("cannot commit - no transaction is active"));
        }
        *active = false;
        Ok(())
    }

    fn rollback(&self) -> OrmResult<()> {
        self.record("ROLLBACK", &[]);
        let mut active = self.in_transaction.lock();
        if !*active {
            return Err(OrmError::backend("cannot rollback - no transaction is active"));
        }
        *active = false;
        Ok(())
    }
}

pub fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    Row::from_pairs(pairs)
}
