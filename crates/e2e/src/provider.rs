//! Data providers
//!
//! A provider is a finite list of named input rows that one scenario body
//! runs against, once per row. Providers are plain values: iterating one
//! does not consume it, so the same cases can be run again.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;

use crate::error::{E2eError, E2eResult};

/// One named input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case<R> {
    pub name: String,
    #[serde(flatten)]
    pub row: R,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataProvider<R> {
    cases: Vec<Case<R>>,
}

impl<R> Default for DataProvider<R> {
    fn default() -> Self {
        Self { cases: Vec::new() }
    }
}

impl<R> DataProvider<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case(mut self, name: impl Into<String>, row: R) -> Self {
        self.cases.push(Case {
            name: name.into(),
            row,
        });
        self
    }

    pub fn cases(&self) -> &[Case<R>] {
        &self.cases
    }

    pub fn into_cases(self) -> Vec<Case<R>> {
        self.cases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Case<R>> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Case names must be non-empty and unique, since they name test units
    pub fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.name.trim().is_empty() {
                return Err(E2eError::ScenarioParse("case with an empty name".to_string()));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(E2eError::ScenarioParse(format!(
                    "duplicate case name {:?}",
                    case.name
                )));
            }
        }
        Ok(())
    }
}

impl<R: DeserializeOwned> DataProvider<R> {
    /// Load a YAML list of cases, each a mapping with `name` plus the row's
    /// fields.
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let cases: Vec<Case<R>> = serde_yaml::from_str(yaml)?;
        let provider = Self { cases };
        provider.validate()?;
        Ok(provider)
    }
}

impl<R> FromIterator<Case<R>> for DataProvider<R> {
    fn from_iter<I: IntoIterator<Item = Case<R>>>(iter: I) -> Self {
        Self {
            cases: iter.into_iter().collect(),
        }
    }
}

impl<'a, R> IntoIterator for &'a DataProvider<R> {
    type Item = &'a Case<R>;
    type IntoIter = std::slice::Iter<'a, Case<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}

/// Failures across the cases of one provider, for running a provider
/// inline in a single test function.
#[derive(Debug, Default)]
pub struct CaseFailures {
    failures: Vec<(String, String)>,
    checked: usize,
}

impl CaseFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<T, E: Display>(&mut self, case: &str, result: Result<T, E>) {
        self.checked += 1;
        if let Err(e) = result {
            self.failures.push((case.to_string(), e.to_string()));
        }
    }

    pub fn failed(&self) -> Vec<&str> {
        self.failures.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fail with every failed case and its error
    pub fn into_result(self) -> E2eResult<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let lines: Vec<String> = self
            .failures
            .iter()
            .map(|(name, error)| format!("  {}: {}", name, error))
            .collect();
        Err(E2eError::Assertion(format!(
            "{} of {} cases failed:\n{}",
            self.failures.len(),
            self.checked,
            lines.join("\n")
        )))
    }
}
