//! Page assertions

use regex::Regex;

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::matcher::{missing_texts, normalize, present_texts, quote_all};
use crate::session::Session;

impl<D: Driver> Session<D> {
    /// Every string must appear in the page text
    pub async fn assert_text_present<S: AsRef<str> + Sync>(&self, texts: &[S]) -> E2eResult<()> {
        let page = self.page_text().await?;
        let missing = missing_texts(&page, texts);
        if missing.is_empty() {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "text not found on page: {}",
            quote_all(&missing)
        )))
    }

    /// No string may appear in the page text
    pub async fn assert_text_absent<S: AsRef<str> + Sync>(&self, texts: &[S]) -> E2eResult<()> {
        let page = self.page_text().await?;
        let found = present_texts(&page, texts);
        if found.is_empty() {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "unexpected text on page: {}",
            quote_all(&found)
        )))
    }

    /// Page text must contain a match for the regular expression
    pub async fn assert_text_matches(&self, pattern: &str) -> E2eResult<()> {
        let re = Regex::new(pattern)?;
        let page = normalize(&self.page_text().await?);
        if re.is_match(&page) {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "no text on page matches /{}/",
            pattern
        )))
    }

    pub async fn assert_title_equals(&self, expected: &str) -> E2eResult<()> {
        let title = self.title().await?;
        if title.trim() == expected {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "title is {:?}, expected {:?}",
            title.trim(),
            expected
        )))
    }

    pub async fn assert_header_equals(&self, expected: &str) -> E2eResult<()> {
        let header = self.header().await?;
        if header == expected {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "header is {:?}, expected {:?}",
            header, expected
        )))
    }

    pub async fn assert_field_value(&self, locator: &Locator, expected: &str) -> E2eResult<()> {
        let value = self.field_value(locator).await?;
        if value == expected {
            return Ok(());
        }
        Err(E2eError::Assertion(format!(
            "field {} has value {:?}, expected {:?}",
            locator, value, expected
        )))
    }

    pub async fn assert_element_present(&self, locator: &Locator) -> E2eResult<()> {
        if self.exists(locator).await? {
            return Ok(());
        }
        Err(E2eError::Assertion(format!("element {} is not present", locator)))
    }

    pub async fn assert_element_absent(&self, locator: &Locator) -> E2eResult<()> {
        if !self.exists(locator).await? {
            return Ok(());
        }
        Err(E2eError::Assertion(format!("element {} is present", locator)))
    }

    pub async fn assert_visible(&self, locator: &Locator) -> E2eResult<()> {
        if self.is_visible(locator).await? {
            return Ok(());
        }
        Err(E2eError::Assertion(format!("element {} is not visible", locator)))
    }

    pub async fn assert_not_visible(&self, locator: &Locator) -> E2eResult<()> {
        if !self.is_visible(locator).await? {
            return Ok(());
        }
        Err(E2eError::Assertion(format!("element {} is visible", locator)))
    }

    /// Attribute must be present with exactly this value
    pub async fn assert_attribute(&self, locator: &Locator, name: &str, expected: &str) -> E2eResult<()> {
        match self.attribute(locator, name).await? {
            Some(value) if value == expected => Ok(()),
            Some(value) => Err(E2eError::Assertion(format!(
                "attribute {} of {} is {:?}, expected {:?}",
                name, locator, value, expected
            ))),
            None => Err(E2eError::Assertion(format!(
                "attribute {} of {} is not set",
                name, locator
            ))),
        }
    }
}
