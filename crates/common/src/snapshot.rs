//! Before/after digests over a set of queries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::Database;
use crate::digest::ResultSetDigest;
use crate::Result;

/// Digests of several queries captured at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    digests: BTreeMap<String, ResultSetDigest>,
}

impl Snapshot {
    /// Hash every query now
    pub fn capture<I, S>(db: &Database, queries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut digests = BTreeMap::new();
        for sql in queries {
            let sql = sql.into();
            let digest = db.hash(&sql)?;
            digests.insert(sql, digest);
        }
        Ok(Self { digests })
    }

    /// Re-run the same queries against the database
    pub fn recapture(&self, db: &Database) -> Result<Self> {
        Self::capture(db, self.digests.keys().cloned())
    }

    /// Queries whose digest differs in `later`. A query missing from
    /// `later` counts as changed.
    pub fn changed(&self, later: &Snapshot) -> Vec<String> {
        self.digests
            .iter()
            .filter(|(sql, digest)| later.digests.get(*sql) != Some(digest))
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.digests.keys().map(String::as_str)
    }

    pub fn digest(&self, sql: &str) -> Option<&ResultSetDigest> {
        self.digests.get(sql)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}
