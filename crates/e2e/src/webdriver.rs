//! WebDriver-backed [`Driver`]
//!
//! A [`WebDriverClient`] owns one `thirtyfour` session against chromedriver,
//! geckodriver or a Selenium server. Elements found through it are kept in
//! a registry keyed by their protocol id, which is what the rest of the
//! harness passes around as [`ElementId`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use thirtyfour::prelude::{By, WebDriver, WebDriverError, WebElement};
use tracing::{debug, info, warn};

use crate::driver::{Driver, ElementId};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        }
    }

    /// Default driver binary for this browser
    pub fn driver_binary(&self) -> &'static str {
        match self {
            Browser::Chrome => "chromedriver",
            Browser::Firefox => "geckodriver",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Browser::Chrome),
            "firefox" => Ok(Browser::Firefox),
            other => Err(E2eError::Config(format!("unsupported browser: {}", other))),
        }
    }
}

/// Options for a new browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// WebDriver server endpoint
    pub url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Browser-side limit for a page load or script
    pub page_load_timeout_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4444".to_string(),
            browser: Browser::Chrome,
            headless: true,
            viewport_width: 1280,
            viewport_height: 1024,
            page_load_timeout_ms: 30_000,
        }
    }
}

/// One browser session
pub struct WebDriverClient {
    driver: WebDriver,
    elements: Mutex<HashMap<String, WebElement>>,
}

impl WebDriverClient {
    /// Open a new browser session on the driver at `config.url`
    pub async fn connect(config: &WebDriverConfig) -> E2eResult<Self> {
        info!("Starting {} session via {}", config.browser.as_str(), config.url);

        let driver = WebDriver::new(&config.url, capabilities(config))
            .await
            .map_err(|e| E2eError::DriverStartup(e.to_string()))?;

        let limit = Duration::from_millis(config.page_load_timeout_ms);
        driver.set_implicit_wait_timeout(Duration::ZERO).await?;
        driver.set_page_load_timeout(limit).await?;
        driver.set_script_timeout(limit).await?;

        debug!("WebDriver session ready");
        Ok(Self {
            driver,
            elements: Mutex::new(HashMap::new()),
        })
    }

    fn register(&self, found: Vec<WebElement>) -> Vec<ElementId> {
        let mut elements = self.elements.lock();
        found
            .into_iter()
            .map(|element| {
                let id = element.element_id().to_string();
                elements.insert(id.clone(), element);
                ElementId(id)
            })
            .collect()
    }

    fn element(&self, id: &ElementId) -> E2eResult<WebElement> {
        self.elements.lock().get(&id.0).cloned().ok_or_else(|| E2eError::WebDriver {
            code: "stale element reference".to_string(),
            message: format!("element {} is not on the current page", id),
        })
    }
}

/// `alwaysMatch` capabilities for the configured browser
pub fn capabilities(config: &WebDriverConfig) -> Map<String, Value> {
    let window = format!("--window-size={},{}", config.viewport_width, config.viewport_height);

    let (options_key, args) = match config.browser {
        Browser::Chrome => {
            let mut args = vec![window, "--no-sandbox".to_string(), "--disable-dev-shm-usage".to_string()];
            if config.headless {
                args.push("--headless=new".to_string());
            }
            ("goog:chromeOptions", args)
        }
        Browser::Firefox => {
            let mut args = vec![
                format!("--width={}", config.viewport_width),
                format!("--height={}", config.viewport_height),
            ];
            if config.headless {
                args.push("-headless".to_string());
            }
            ("moz:firefoxOptions", args)
        }
    };

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!(config.browser.as_str()));
    caps.insert(options_key.to_string(), json!({ "args": args }));
    caps
}

fn by(locator: &Locator) -> By {
    let (using, value) = locator.to_webdriver();
    match using {
        "xpath" => By::XPath(&value),
        "link text" => By::LinkText(&value),
        "partial link text" => By::PartialLinkText(&value),
        _ => By::Css(&value),
    }
}

/// W3C error code of a driver error
fn error_code(error: &WebDriverError) -> &'static str {
    match error {
        WebDriverError::NoSuchElement(..) => "no such element",
        WebDriverError::StaleElementReference(..) => "stale element reference",
        WebDriverError::Timeout(..) => "timeout",
        WebDriverError::ScriptTimeout(..) => "script timeout",
        WebDriverError::InvalidSessionId(..) => "invalid session id",
        _ => "unknown error",
    }
}

/// Map a W3C error code onto the harness taxonomy
fn classify(code: &str, message: String) -> E2eError {
    match code {
        "no such element" => E2eError::ElementNotFound(message),
        "timeout" | "script timeout" => E2eError::Timeout(message),
        _ => E2eError::WebDriver {
            code: code.to_string(),
            message,
        },
    }
}

impl From<WebDriverError> for E2eError {
    fn from(error: WebDriverError) -> Self {
        classify(error_code(&error), error.to_string())
    }
}

#[async_trait]
impl Driver for WebDriverClient {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        self.driver.goto(url).await?;
        self.elements.lock().clear();
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.driver.title().await?)
    }

    async fn find_elements(&self, locator: &Locator) -> E2eResult<Vec<ElementId>> {
        let found = self.driver.find_all(by(locator)).await?;
        Ok(self.register(found))
    }

    async fn find_child_elements(&self, parent: &ElementId, locator: &Locator) -> E2eResult<Vec<ElementId>> {
        let found = self.element(parent)?.find_all(by(locator)).await?;
        Ok(self.register(found))
    }

    async fn click(&self, element: &ElementId) -> E2eResult<()> {
        Ok(self.element(element)?.click().await?)
    }

    async fn clear(&self, element: &ElementId) -> E2eResult<()> {
        Ok(self.element(element)?.clear().await?)
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> E2eResult<()> {
        Ok(self.element(element)?.send_keys(text).await?)
    }

    async fn text(&self, element: &ElementId) -> E2eResult<String> {
        Ok(self.element(element)?.text().await?)
    }

    async fn attribute(&self, element: &ElementId, name: &str) -> E2eResult<Option<String>> {
        Ok(self.element(element)?.attr(name).await?)
    }

    async fn property(&self, element: &ElementId, name: &str) -> E2eResult<Option<Value>> {
        // Read through a script so booleans such as `checked` keep their JSON type.
        let element = self.element(element)?.to_json()?;
        let value = self.execute("return arguments[0][arguments[1]];", vec![element, json!(name)]).await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn is_displayed(&self, element: &ElementId) -> E2eResult<bool> {
        Ok(self.element(element)?.is_displayed().await?)
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        let ret = self.driver.execute(script, args).await?;
        Ok(ret.json().clone())
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        Ok(self.driver.screenshot_as_png().await?)
    }

    async fn delete_all_cookies(&self) -> E2eResult<()> {
        self.driver.delete_all_cookies().await?;
        self.elements.lock().clear();
        Ok(())
    }

    async fn quit(&self) -> E2eResult<()> {
        info!("Closing WebDriver session");
        self.elements.lock().clear();
        match self.driver.clone().quit().await {
            Ok(()) => Ok(()),
            Err(e) if error_code(&e) == "invalid session id" => {
                warn!("WebDriver session was already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
