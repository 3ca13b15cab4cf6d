//! List tables
//!
//! Frontend list pages render rows in a `<table>` with a header row. A
//! [`Table`] is a plain copy of the cell texts; rows are looked up by the
//! text of a key column, so tests never depend on row order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::matcher::normalize;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLocators {
    /// Header cells, relative to the table
    pub header_cells: Locator,
    /// Body rows, relative to the table
    pub rows: Locator,
    /// Cells, relative to a row
    pub cells: Locator,
}

impl Default for TableLocators {
    fn default() -> Self {
        Self {
            header_cells: Locator::css("thead th"),
            rows: Locator::css("tbody tr"),
            cells: Locator::css("td"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_position(&self, column: &str) -> E2eResult<usize> {
        let wanted = normalize(column);
        self.headers
            .iter()
            .position(|h| normalize(h) == wanted)
            .ok_or_else(|| E2eError::ColumnNotFound {
                column: column.to_string(),
                available: self.headers.join(", "),
            })
    }

    /// All values of one column, in row order. Short rows yield "".
    pub fn column(&self, column: &str) -> E2eResult<Vec<String>> {
        let index = self.column_position(column)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect())
    }

    /// Index rows by the text of `column`.
    ///
    /// Rows whose key cell is empty (for example "no data found" rows that
    /// span the whole table) are not indexed. Two rows with the same key
    /// are an error, since a lookup could not tell them apart.
    pub fn index_by_column(&self, column: &str) -> E2eResult<IndexedTable> {
        let index = self.column_position(column)?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut rows = BTreeMap::new();
        for row in &self.rows {
            let key = match row.get(index) {
                Some(cell) if !cell.trim().is_empty() => normalize(cell),
                _ => continue,
            };
            *counts.entry(key.clone()).or_default() += 1;

            let values = self
                .headers
                .iter()
                .enumerate()
                .map(|(i, h)| (normalize(h), row.get(i).map(|c| normalize(c)).unwrap_or_default()))
                .collect();
            rows.insert(key, values);
        }

        if let Some((key, count)) = counts.into_iter().filter(|(_, n)| *n > 1).min() {
            return Err(E2eError::DuplicateKey {
                column: column.to_string(),
                key,
                count,
            });
        }

        Ok(IndexedTable {
            column: column.to_string(),
            rows,
        })
    }

    /// Check several rows at once: key -> (column -> expected cell)
    pub fn assert_rows(
        &self,
        column: &str,
        expected: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> E2eResult<()> {
        let indexed = self.index_by_column(column)?;
        for (key, cells) in expected {
            indexed.assert_row(key, cells)?;
        }
        Ok(())
    }
}

/// Rows keyed by one column's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTable {
    column: String,
    rows: BTreeMap<String, BTreeMap<String, String>>,
}

impl IndexedTable {
    /// Full row for a key; absent keys are an error, never an empty row
    pub fn get(&self, key: &str) -> E2eResult<&BTreeMap<String, String>> {
        self.rows.get(&normalize(key)).ok_or_else(|| E2eError::RowNotFound {
            column: self.column.clone(),
            key: key.to_string(),
        })
    }

    /// One cell of the row for `key`
    pub fn cell(&self, key: &str, column: &str) -> E2eResult<&str> {
        let row = self.get(key)?;
        row.get(&normalize(column))
            .map(String::as_str)
            .ok_or_else(|| E2eError::ColumnNotFound {
                column: column.to_string(),
                available: row.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(&normalize(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Compare expected cells of the row for `key`. Every mismatch is
    /// reported, not only the first.
    pub fn assert_row(&self, key: &str, expected: &BTreeMap<String, String>) -> E2eResult<()> {
        let row = self.get(key)?;
        let mut mismatches = Vec::new();
        for (column, want) in expected {
            match row.get(&normalize(column)) {
                Some(got) if *got == normalize(want) => {}
                Some(got) => mismatches.push(format!("{}: {:?} != {:?}", column, got, want)),
                None => {
                    return Err(E2eError::ColumnNotFound {
                        column: column.clone(),
                        available: row.keys().cloned().collect::<Vec<_>>().join(", "),
                    })
                }
            }
        }

        if mismatches.is_empty() {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "row {} = {:?}: {}",
            self.column,
            key,
            mismatches.join("; ")
        )))
    }
}

impl<D: Driver> Session<D> {
    /// Read the first table matching `locator`
    pub async fn table(&self, locator: &Locator, layout: &TableLocators) -> E2eResult<Table> {
        let table = self.find(locator).await?;

        let mut headers = Vec::new();
        for cell in self.find_in(&table, &layout.header_cells).await? {
            headers.push(self.driver().text(&cell).await?.trim().to_string());
        }

        let mut rows = Vec::new();
        for row in self.find_in(&table, &layout.rows).await? {
            let mut values = Vec::new();
            for cell in self.find_in(&row, &layout.cells).await? {
                values.push(self.driver().text(&cell).await?.trim().to_string());
            }
            rows.push(values);
        }

        Ok(Table { headers, rows })
    }

    /// Read a table and check one row by key
    pub async fn assert_table_row(
        &self,
        locator: &Locator,
        layout: &TableLocators,
        column: &str,
        key: &str,
        expected: &BTreeMap<String, String>,
    ) -> E2eResult<()> {
        self.table(locator, layout)
            .await?
            .index_by_column(column)?
            .assert_row(key, expected)
    }
}
