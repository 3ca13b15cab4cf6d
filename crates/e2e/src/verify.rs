//! Database-side assertions

use frontcheck_common::{Database, Snapshot};

use crate::error::{E2eError, E2eResult};

/// The query must return exactly `expected` rows
pub fn assert_count(db: &Database, sql: &str, expected: usize) -> E2eResult<()> {
    let actual = db.count(sql)?;
    if actual == expected {
        return Ok(());
    }
    Err(E2eError::Assertion(format!(
        "expected {} row(s), got {}: {}",
        expected, actual, sql
    )))
}

/// Every query in the snapshot must still hash the same
pub fn assert_unchanged(db: &Database, before: &Snapshot) -> E2eResult<()> {
    let after = before.recapture(db)?;
    let changed = before.changed(&after);
    if changed.is_empty() {
        return Ok(());
    }
    Err(E2eError::Assertion(format!(
        "data changed for {} quer{}: {}",
        changed.len(),
        if changed.len() == 1 { "y" } else { "ies" },
        changed.join(" | ")
    )))
}

/// At least one query in the snapshot must hash differently now
pub fn assert_changed(db: &Database, before: &Snapshot) -> E2eResult<()> {
    let after = before.recapture(db)?;
    if !before.changed(&after).is_empty() {
        return Ok(());
    }
    Err(E2eError::Assertion(format!(
        "expected a change, but all {} queries hash the same",
        before.len()
    )))
}
