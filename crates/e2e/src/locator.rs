//! Element locators
//!
//! Locators are written as `strategy:value` strings so they can live in
//! TOML config and YAML scenarios: `id:create`, `name:groupids[]`,
//! `xpath://button[text()="Add"]`, `link:Sign out`. A string without a
//! known prefix is a CSS selector.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::E2eError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    Id(String),
    Name(String),
    Css(String),
    XPath(String),
    LinkText(String),
    PartialLinkText(String),
    ClassName(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn link(value: impl Into<String>) -> Self {
        Locator::LinkText(value.into())
    }

    /// The raw selector, without the strategy prefix
    pub fn value(&self) -> &str {
        match self {
            Locator::Id(v)
            | Locator::Name(v)
            | Locator::Css(v)
            | Locator::XPath(v)
            | Locator::LinkText(v)
            | Locator::PartialLinkText(v)
            | Locator::ClassName(v) => v,
        }
    }

    /// W3C WebDriver `using`/`value` pair.
    ///
    /// The protocol has no id, name or class strategies, so those are
    /// expressed as CSS attribute selectors.
    pub fn to_webdriver(&self) -> (&'static str, String) {
        match self {
            Locator::Id(v) => ("css selector", format!("[id=\"{}\"]", css_escape(v))),
            Locator::Name(v) => ("css selector", format!("[name=\"{}\"]", css_escape(v))),
            Locator::ClassName(v) => ("css selector", format!("[class~=\"{}\"]", css_escape(v))),
            Locator::Css(v) => ("css selector", v.clone()),
            Locator::XPath(v) => ("xpath", v.clone()),
            Locator::LinkText(v) => ("link text", v.clone()),
            Locator::PartialLinkText(v) => ("partial link text", v.clone()),
        }
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id:{}", v),
            Locator::Name(v) => write!(f, "name:{}", v),
            Locator::Css(v) => write!(f, "css:{}", v),
            Locator::XPath(v) => write!(f, "xpath:{}", v),
            Locator::LinkText(v) => write!(f, "link:{}", v),
            Locator::PartialLinkText(v) => write!(f, "partial:{}", v),
            Locator::ClassName(v) => write!(f, "class:{}", v),
        }
    }
}

impl FromStr for Locator {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(E2eError::ScenarioParse("empty locator".to_string()));
        }

        // A leading '/' or '(' can only be XPath.
        if s.starts_with('/') || s.starts_with("(/") {
            return Ok(Locator::XPath(s.to_string()));
        }

        let Some((strategy, value)) = s.split_once(':') else {
            return Ok(Locator::Css(s.to_string()));
        };

        let value = value.to_string();
        let locator = match strategy {
            "id" => Locator::Id(value),
            "name" => Locator::Name(value),
            "css" => Locator::Css(value),
            "xpath" => Locator::XPath(value),
            "link" => Locator::LinkText(value),
            "partial" => Locator::PartialLinkText(value),
            "class" => Locator::ClassName(value),
            // Pseudo-classes such as `a:hover` or `li:nth-child(2)`.
            _ => Locator::Css(s.to_string()),
        };

        if locator.value().is_empty() {
            return Err(E2eError::ScenarioParse(format!("locator has no value: {}", s)));
        }

        Ok(locator)
    }
}

impl TryFrom<String> for Locator {
    type Error = E2eError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}
