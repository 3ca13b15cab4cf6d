//! Read-only SQLite access for verifying frontend side effects

use crate::digest::ResultSetDigest;
use crate::types::{ResultSet, Value};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database handle used to confirm what a UI action persisted.
///
/// The handle only ever runs queries; statements that would modify the
/// database are rejected before they reach the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open an existing database file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        info!("Opened verification database at {:?}", path.as_ref());
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection opened elsewhere
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a query and collect every row
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        ensure_read_only(sql)?;
        debug!("query: {}", sql);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(Error::InvalidQuery(format!("statement is not read-only: {}", sql)));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(Value::from(row.get_ref(i)?));
            }
            rows.push(values);
        }

        Ok(ResultSet { columns, rows })
    }

    /// Number of rows the query returns
    pub fn count(&self, sql: &str) -> Result<usize> {
        Ok(self.query(sql)?.len())
    }

    /// First row, if any
    pub fn row(&self, sql: &str) -> Result<Option<Vec<Value>>> {
        Ok(self.query(sql)?.rows.into_iter().next())
    }

    /// First column of the first row
    pub fn value(&self, sql: &str) -> Result<Value> {
        self.row(sql)?
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| Error::NoRows(sql.to_string()))
    }

    /// Digest of the full result set.
    ///
    /// Include an `ORDER BY` unless the row order is fixed by the query
    /// itself, otherwise two captures of unchanged data may differ.
    pub fn hash(&self, sql: &str) -> Result<ResultSetDigest> {
        Ok(ResultSetDigest::of(&self.query(sql)?))
    }
}

fn ensure_read_only(sql: &str) -> Result<()> {
    let head = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match head.as_str() {
        "SELECT" | "WITH" | "VALUES" => Ok(()),
        "" => Err(Error::InvalidQuery("empty query".to_string())),
        _ => Err(Error::InvalidQuery(format!("only read queries are allowed: {}", sql))),
    }
}
