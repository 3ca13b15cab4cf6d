//! Text matching over rendered page content
//!
//! Everything here works on plain strings so it can be checked without a
//! browser; [`crate::session::Session`] feeds it the page text.

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Generic markers of a server-side failure leaking into a page
pub const DEFAULT_FORBIDDEN: &[&str] = &[
    "pg_query",
    "Error in",
    "expects parameter",
    "Undefined index",
    "Undefined variable",
    "Undefined offset",
    "Undefined array key",
    "Fatal error",
    "Call to undefined method",
    "Invalid argument supplied",
    "Missing argument",
    "Warning:",
    "PHP notice",
    "PHP warning",
    "Use of undefined",
    "DEBUG INFO",
    "Cannot modify header",
    "Parse error",
    "syntax error",
    "Try to read inaccessible property",
    "Illegal string offset",
    "must be an array",
];

/// Text that must never / always appear on a page, checked after every
/// page transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagePolicy {
    pub forbidden: Vec<String>,
    pub required: Vec<String>,
}

impl Default for PagePolicy {
    fn default() -> Self {
        Self {
            forbidden: DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect(),
            required: Vec::new(),
        }
    }
}

impl PagePolicy {
    /// A policy that checks nothing
    pub fn permissive() -> Self {
        Self {
            forbidden: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn with_forbidden(mut self, marker: impl Into<String>) -> Self {
        self.forbidden.push(marker.into());
        self
    }

    pub fn with_required(mut self, marker: impl Into<String>) -> Self {
        self.required.push(marker.into());
        self
    }

    /// Fail when a forbidden marker is present or a required one missing
    pub fn check(&self, url: &str, page_text: &str) -> E2eResult<()> {
        let found = present_texts(page_text, &self.forbidden);
        let missing = missing_texts(page_text, &self.required);

        if found.is_empty() && missing.is_empty() {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !found.is_empty() {
            problems.push(format!("error markers present: {}", quote_all(&found)));
        }
        if !missing.is_empty() {
            problems.push(format!("required markers missing: {}", quote_all(&missing)));
        }

        Err(E2eError::Assertion(format!(
            "page {} failed the page policy: {}",
            url,
            problems.join("; ")
        )))
    }
}

/// Collapse whitespace runs to single spaces so line wrapping in the
/// rendered page does not affect matching.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Expected strings not found in the page
pub fn missing_texts<'a, S: AsRef<str>>(page_text: &str, expected: &'a [S]) -> Vec<&'a str> {
    let page = normalize(page_text);
    expected
        .iter()
        .map(|s| AsRef::<str>::as_ref(s))
        .filter(|s| !page.contains(&normalize(s)))
        .collect()
}

/// Forbidden strings found in the page
pub fn present_texts<'a, S: AsRef<str>>(page_text: &str, forbidden: &'a [S]) -> Vec<&'a str> {
    let page = normalize(page_text);
    forbidden
        .iter()
        .map(|s| AsRef::<str>::as_ref(s))
        .filter(|s| page.contains(&normalize(s)))
        .collect()
}

/// Default error markers present in the page
pub fn fatal_markers(page_text: &str) -> Vec<&'static str> {
    present_texts(page_text, DEFAULT_FORBIDDEN)
}

pub fn quote_all(items: &[&str]) -> String {
    items
        .iter()
        .map(|s| format!("{:?}", s))
        .collect::<Vec<_>>()
        .join(", ")
}
