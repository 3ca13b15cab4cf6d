//! Browser session adapter
//!
//! [`Session`] is what scenarios talk to. It resolves relative URLs against
//! the frontend base URL, turns locators into elements, and treats every
//! `open` and `click` as a page transition: it waits for the page to be
//! ready and then runs the [`PagePolicy`] check before returning.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::driver::{Driver, ElementId};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::matcher::PagePolicy;
use crate::wait::{poll_until, Condition, Timeouts};

/// Locators for page furniture the session relies on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLocators {
    /// Element whose text is the page text
    pub body: Locator,
    /// Page header
    pub header: Locator,
    /// Shown while the frontend is still loading data
    pub loading: Locator,
}

impl Default for PageLocators {
    fn default() -> Self {
        Self {
            body: Locator::css("body"),
            header: Locator::css("h1"),
            loading: Locator::css(".is-loading"),
        }
    }
}

pub struct Session<D: Driver> {
    driver: D,
    base_url: Url,
    policy: PagePolicy,
    timeouts: Timeouts,
    page: PageLocators,
    transitions: u64,
}

impl<D: Driver> Session<D> {
    pub fn new(driver: D, base_url: &str) -> E2eResult<Self> {
        // A base without a trailing slash would make `join` drop its last segment.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| E2eError::Url(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            driver,
            base_url,
            policy: PagePolicy::default(),
            timeouts: Timeouts::default(),
            page: PageLocators::default(),
            transitions: 0,
        })
    }

    pub fn with_policy(mut self, policy: PagePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_page_locators(mut self, page: PageLocators) -> Self {
        self.page = page;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn policy(&self) -> &PagePolicy {
        &self.policy
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Number of page transitions that passed the page policy check
    pub fn transitions_checked(&self) -> u64 {
        self.transitions
    }

    /// Absolute URL for a path relative to the frontend
    pub fn resolve(&self, url: &str) -> E2eResult<String> {
        self.base_url
            .join(url)
            .map(|u| u.to_string())
            .map_err(|e| E2eError::Url(format!("{}: {}", url, e)))
    }

    /// Open a page and verify it rendered cleanly
    pub async fn open(&mut self, url: &str) -> E2eResult<()> {
        let target = self.resolve(url)?;
        debug!("open {}", target);
        self.driver.navigate(&target).await?;
        self.after_transition().await
    }

    /// Click the first displayed element matching the locator
    pub async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let element = self.find_interactable(locator).await?;
        debug!("click {}", locator);
        self.driver.click(&element).await?;
        self.after_transition().await
    }

    /// Replace the content of an input
    pub async fn type_text(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        let element = self.find_interactable(locator).await?;
        debug!("type {:?} into {}", text, locator);
        self.driver.clear(&element).await?;
        if !text.is_empty() {
            self.driver.send_keys(&element, text).await?;
        }
        Ok(())
    }

    /// Pick an option by its visible text
    pub async fn select(&self, locator: &Locator, option_text: &str) -> E2eResult<()> {
        let control = self.find_interactable(locator).await?;
        debug!("select {:?} in {}", option_text, locator);

        let options = self.driver.find_child_elements(&control, &Locator::css("option")).await?;
        if let Some(option) = self.element_with_text(&options, option_text).await? {
            return self.driver.click(&option).await;
        }

        // Custom dropdowns only render their list after being opened.
        if options.is_empty() {
            self.driver.click(&control).await?;
            let items = self.driver.find_child_elements(&control, &Locator::css("li")).await?;
            if let Some(item) = self.element_with_text(&items, option_text).await? {
                return self.driver.click(&item).await;
            }
        }

        Err(E2eError::ElementNotFound(format!(
            "option {:?} in {}",
            option_text, locator
        )))
    }

    /// Tick a checkbox; no-op when already checked
    pub async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.set_checked(locator, true).await
    }

    /// Clear a checkbox; no-op when already clear
    pub async fn uncheck(&self, locator: &Locator) -> E2eResult<()> {
        self.set_checked(locator, false).await
    }

    async fn set_checked(&self, locator: &Locator, wanted: bool) -> E2eResult<()> {
        let element = self.find_interactable(locator).await?;
        let checked = self
            .driver
            .property(&element, "checked")
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if checked != wanted {
            self.driver.click(&element).await?;
        }
        Ok(())
    }

    /// First element matching the locator
    pub async fn find(&self, locator: &Locator) -> E2eResult<ElementId> {
        self.driver
            .find_elements(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::ElementNotFound(locator.to_string()))
    }

    /// All elements matching the locator, possibly none
    pub async fn find_all(&self, locator: &Locator) -> E2eResult<Vec<ElementId>> {
        self.driver.find_elements(locator).await
    }

    /// Elements matching `locator` inside `parent`
    pub async fn find_in(&self, parent: &ElementId, locator: &Locator) -> E2eResult<Vec<ElementId>> {
        self.driver.find_child_elements(parent, locator).await
    }

    /// Prefer a displayed element when several match, so hidden templates
    /// and collapsed duplicates are never clicked.
    async fn find_interactable(&self, locator: &Locator) -> E2eResult<ElementId> {
        let elements = self.driver.find_elements(locator).await?;
        if elements.len() > 1 {
            for element in &elements {
                if self.driver.is_displayed(element).await? {
                    return Ok(element.clone());
                }
            }
        }
        elements
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::ElementNotFound(locator.to_string()))
    }

    async fn element_with_text(&self, elements: &[ElementId], text: &str) -> E2eResult<Option<ElementId>> {
        for element in elements {
            if self.driver.text(element).await?.trim() == text {
                return Ok(Some(element.clone()));
            }
        }
        Ok(None)
    }

    pub async fn exists(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(!self.driver.find_elements(locator).await?.is_empty())
    }

    pub async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        for element in self.driver.find_elements(locator).await? {
            if self.driver.is_displayed(&element).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rendered text of the whole page
    pub async fn page_text(&self) -> E2eResult<String> {
        let body = self.find(&self.page.body).await?;
        self.driver.text(&body).await
    }

    pub async fn title(&self) -> E2eResult<String> {
        self.driver.title().await
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    /// Text of the page header
    pub async fn header(&self) -> E2eResult<String> {
        let header = self.find(&self.page.header).await?;
        Ok(self.driver.text(&header).await?.trim().to_string())
    }

    pub async fn text_of(&self, locator: &Locator) -> E2eResult<String> {
        let element = self.find(locator).await?;
        self.driver.text(&element).await
    }

    /// Current `value` of a form field
    pub async fn field_value(&self, locator: &Locator) -> E2eResult<String> {
        let element = self.find(locator).await?;
        let value = self.driver.property(&element, "value").await?;
        Ok(match value {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
    }

    pub async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let element = self.find(locator).await?;
        self.driver.attribute(&element, name).await
    }

    /// Wait for a condition with an explicit budget
    pub async fn wait_for(&self, condition: &Condition, timeout: Duration) -> E2eResult<()> {
        let what = condition.to_string();
        poll_until(&what, timeout, self.timeouts.poll(), || self.evaluate(condition)).await
    }

    /// Wait for a condition with the default budget
    pub async fn wait(&self, condition: &Condition) -> E2eResult<()> {
        self.wait_for(condition, self.timeouts.wait()).await
    }

    pub async fn wait_until_ready(&self) -> E2eResult<()> {
        self.wait(&Condition::PageReady).await
    }

    /// Evaluate a condition once
    pub async fn evaluate(&self, condition: &Condition) -> E2eResult<bool> {
        let result = match condition {
            Condition::Present { locator } => self.exists(locator).await,
            Condition::Absent { locator } => self.exists(locator).await.map(|found| !found),
            Condition::Visible { locator } => self.is_visible(locator).await,
            Condition::Hidden { locator } => self.is_visible(locator).await.map(|shown| !shown),
            Condition::TextPresent { text } => self
                .page_text()
                .await
                .map(|page| crate::matcher::missing_texts(&page, &[text]).is_empty()),
            Condition::TextAbsent { text } => self
                .page_text()
                .await
                .map(|page| crate::matcher::present_texts(&page, &[text]).is_empty()),
            Condition::TitleIs { title } => self.title().await.map(|t| t.trim() == title),
            Condition::PageReady => self.page_ready().await,
        };

        match result {
            // The DOM changed under us between lookup and read; try again.
            Err(E2eError::WebDriver { code, .. }) if code == "stale element reference" => Ok(false),
            // The page is mid-navigation and has no body yet.
            Err(E2eError::ElementNotFound(_)) if matches!(condition, Condition::TextPresent { .. } | Condition::TextAbsent { .. }) => Ok(false),
            other => other,
        }
    }

    async fn page_ready(&self) -> E2eResult<bool> {
        let state = self.driver.execute("return document.readyState;", Vec::new()).await?;
        if state.as_str() != Some("complete") {
            return Ok(false);
        }
        Ok(!self.is_visible(&self.page.loading).await?)
    }

    /// Run the page policy against the current page
    pub async fn check_page(&mut self) -> E2eResult<()> {
        let url = self.driver.current_url().await?;
        let text = self.page_text().await?;
        self.policy.check(&url, &text)?;
        self.transitions += 1;
        Ok(())
    }

    async fn after_transition(&mut self) -> E2eResult<()> {
        self.wait_until_ready().await?;
        self.check_page().await
    }

    /// Drop cookies so the next page load starts a fresh frontend session
    pub async fn reset(&self) -> E2eResult<()> {
        self.driver.delete_all_cookies().await
    }

    pub async fn quit(self) -> E2eResult<()> {
        self.driver.quit().await
    }
}
