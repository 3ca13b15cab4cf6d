//! Browser automation seam
//!
//! [`Driver`] is the narrow set of remote-browser operations the harness
//! needs. [`crate::webdriver::WebDriverClient`] implements it over a
//! `thirtyfour` session; tests substitute an in-process fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::E2eResult;
use crate::locator::Locator;

/// Opaque reference to an element in the current browsing context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Load a URL and block until the browser reports navigation complete
    async fn navigate(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn title(&self) -> E2eResult<String>;

    /// All elements matching the locator; empty when nothing matches
    async fn find_elements(&self, locator: &Locator) -> E2eResult<Vec<ElementId>>;

    /// Elements matching the locator inside `parent`
    async fn find_child_elements(
        &self,
        parent: &ElementId,
        locator: &Locator,
    ) -> E2eResult<Vec<ElementId>>;

    async fn click(&self, element: &ElementId) -> E2eResult<()>;

    async fn clear(&self, element: &ElementId) -> E2eResult<()>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> E2eResult<()>;

    /// Rendered (visible) text of the element
    async fn text(&self, element: &ElementId) -> E2eResult<String>;

    async fn attribute(&self, element: &ElementId, name: &str) -> E2eResult<Option<String>>;

    /// DOM property, e.g. `value` or `checked`
    async fn property(&self, element: &ElementId, name: &str) -> E2eResult<Option<serde_json::Value>>;

    async fn is_displayed(&self, element: &ElementId) -> E2eResult<bool>;

    /// Run a synchronous script in the page and return its result
    async fn execute(&self, script: &str, args: Vec<serde_json::Value>) -> E2eResult<serde_json::Value>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> E2eResult<Vec<u8>>;

    async fn delete_all_cookies(&self) -> E2eResult<()>;

    /// End the browser session
    async fn quit(&self) -> E2eResult<()>;
}
