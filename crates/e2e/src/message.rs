//! Success/error message banners
//!
//! After a form submit the frontend shows one banner: a "good" banner with
//! a title such as `Group added`, or a "bad" banner with a title such as
//! `Cannot add group` followed by detail lines.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::matcher::{normalize, quote_all};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Good,
    Bad,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Good => write!(f, "good"),
            MessageKind::Bad => write!(f, "bad"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerLocators {
    pub good: Locator,
    pub bad: Locator,
    /// Title element, relative to the banner
    pub title: Locator,
    /// Detail lines, relative to the banner
    pub details: Locator,
}

impl Default for BannerLocators {
    fn default() -> Self {
        Self {
            good: Locator::css("output.msg-good"),
            bad: Locator::css("output.msg-bad"),
            title: Locator::css("span"),
            details: Locator::css(".msg-details li"),
        }
    }
}

/// A banner as read from the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub title: String,
    pub details: Vec<String>,
}

impl Message {
    /// Compare against an expectation. Every expected detail must appear in
    /// some detail line; extra detail lines are allowed.
    pub fn verify(&self, kind: MessageKind, title: &str, details: &[String]) -> E2eResult<()> {
        if self.kind != kind {
            return Err(E2eError::Assertion(format!(
                "expected a {} message {:?}, found a {} message {:?} (details: {})",
                kind,
                title,
                self.kind,
                self.title,
                quote_all(&self.details.iter().map(String::as_str).collect::<Vec<_>>())
            )));
        }

        if normalize(&self.title) != normalize(title) {
            return Err(E2eError::Assertion(format!(
                "message title is {:?}, expected {:?}",
                self.title, title
            )));
        }

        let lines: Vec<String> = self.details.iter().map(|d| normalize(d)).collect();
        let missing: Vec<&str> = details
            .iter()
            .map(String::as_str)
            .filter(|expected| {
                let expected = normalize(expected);
                !lines.iter().any(|line| line.contains(&expected))
            })
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(E2eError::Assertion(format!(
            "message {:?} lacks details {}; shown: {}",
            self.title,
            quote_all(&missing),
            quote_all(&self.details.iter().map(String::as_str).collect::<Vec<_>>())
        )))
    }
}

impl<D: Driver> Session<D> {
    /// The banner currently shown, if any
    pub async fn message(&self, banners: &BannerLocators) -> E2eResult<Option<Message>> {
        for (kind, locator) in [(MessageKind::Good, &banners.good), (MessageKind::Bad, &banners.bad)] {
            let Some(banner) = self.find_all(locator).await?.into_iter().next() else {
                continue;
            };

            let title = match self.find_in(&banner, &banners.title).await?.first() {
                Some(element) => self.driver().text(element).await?,
                None => String::new(),
            };

            let mut details = Vec::new();
            for line in self.find_in(&banner, &banners.details).await? {
                details.push(self.driver().text(&line).await?.trim().to_string());
            }

            return Ok(Some(Message {
                kind,
                title: title.trim().to_string(),
                details,
            }));
        }
        Ok(None)
    }

    /// A banner of `kind` with this title and (at least) these details
    pub async fn assert_message<S: AsRef<str> + Sync>(
        &self,
        banners: &BannerLocators,
        kind: MessageKind,
        title: &str,
        details: &[S],
    ) -> E2eResult<()> {
        let details: Vec<String> = details.iter().map(|d| d.as_ref().to_string()).collect();
        match self.message(banners).await? {
            Some(message) => message.verify(kind, title, &details),
            None => Err(E2eError::Assertion(format!(
                "expected a {} message {:?}, but no message is shown",
                kind, title
            ))),
        }
    }

    pub async fn assert_no_message(&self, banners: &BannerLocators) -> E2eResult<()> {
        match self.message(banners).await? {
            None => Ok(()),
            Some(message) => Err(E2eError::Assertion(format!(
                "unexpected {} message {:?}",
                message.kind, message.title
            ))),
        }
    }
}
