//! Backend-specific SQL syntax.

use crate::error::OrmError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect used when compiling limit/offset clauses and DDL keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ANSI-ish `LIMIT ? OFFSET ?`.
    #[default]
    Generic,
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlserver")]
    SqlServer,
    Sqlite,
}

/// MySQL has no bare OFFSET; the documented workaround is the max u64 row count.
const MYSQL_UNBOUNDED: &str = "18446744073709551615";

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Render a limit/offset clause with its bind values in placeholder order.
    ///
    /// Returns `None` when neither is set.
    pub fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<(String, Vec<Value>)> {
        let (sql, values): (&str, Vec<u64>) = match (self, limit, offset) {
            (_, None, None) => return None,

            (Dialect::MySql, Some(l), Some(o)) => ("LIMIT ?, ?", vec![o, l]),
            (Dialect::MySql, Some(l), None) => ("LIMIT ?", vec![l]),
            (Dialect::MySql, None, Some(o)) => {
                return Some((format!("LIMIT ?, {MYSQL_UNBOUNDED}"), vec![row_count(o)]));
            }

            (Dialect::SqlServer, Some(l), Some(o)) => {
                ("OFFSET ? ROWS FETCH NEXT ? ROWS ONLY", vec![o, l])
            }
            (Dialect::SqlServer, Some(l), None) => ("OFFSET 0 ROWS FETCH NEXT ? ROWS ONLY", vec![l]),
            (Dialect::SqlServer, None, Some(o)) => ("OFFSET ? ROWS", vec![o]),

            (Dialect::Postgres, None, Some(o)) => ("LIMIT ALL OFFSET ?", vec![o]),
            (Dialect::Generic | Dialect::Sqlite, None, Some(o)) => ("LIMIT -1 OFFSET ?", vec![o]),

            (_, Some(l), Some(o)) => ("LIMIT ? OFFSET ?", vec![l, o]),
            (_, Some(l), None) => ("LIMIT ?", vec![l]),
        };
        Some((sql.to_string(), values.into_iter().map(row_count).collect()))
    }

    /// Keyword for an auto-incrementing primary key column.
    pub fn auto_increment(&self) -> &'static str {
        match self {
            Dialect::Generic | Dialect::MySql => "AUTO_INCREMENT",
            Dialect::Sqlite => "AUTOINCREMENT",
            Dialect::Postgres => "GENERATED BY DEFAULT AS IDENTITY",
            Dialect::SqlServer => "IDENTITY(1,1)",
        }
    }
}

/// Bind a row count. Counts past `i64::MAX` mean "no bound" to every backend,
/// so they saturate instead of failing.
fn row_count(n: u64) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "ansi" => Ok(Dialect::Generic),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(OrmError::Config(format!("unknown dialect '{other}'"))),
        }
    }
}
