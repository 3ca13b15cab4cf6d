//! Harness configuration
//!
//! Loaded from a TOML file, then overridden from `FRONTCHECK_*`
//! environment variables, then from command-line flags. Every field has a
//! default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::auth::{Credentials, LoginPage};
use crate::error::{E2eError, E2eResult};
use crate::matcher::PagePolicy;
use crate::message::BannerLocators;
use crate::session::PageLocators;
use crate::table::TableLocators;
use crate::wait::Timeouts;
use crate::webdriver::WebDriverConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Frontend under test
    pub frontend: FrontendConfig,

    /// WebDriver session options
    pub webdriver: WebDriverConfig,

    /// Spawn this driver binary instead of using a running server
    pub driver_binary: Option<PathBuf>,

    /// SQLite database of the frontend, opened read-only
    pub database: Option<PathBuf>,

    /// JSON-RPC endpoint used for fixtures
    pub api_url: Option<String>,

    pub timeouts: Timeouts,

    pub policy: PagePolicy,

    pub login: LoginPage,

    pub banners: BannerLocators,

    pub tables: TableLocators,

    pub page: PageLocators,

    /// Directory searched for YAML scenarios
    pub specs_dir: PathBuf,

    /// Report and failure diagnostics
    pub output_dir: PathBuf,

    /// Take a screenshot when a unit fails
    pub screenshots: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            frontend: FrontendConfig::default(),
            webdriver: WebDriverConfig::default(),
            driver_binary: None,
            database: None,
            api_url: None,
            timeouts: Timeouts::default(),
            policy: PagePolicy::default(),
            login: LoginPage::default(),
            banners: BannerLocators::default(),
            tables: TableLocators::default(),
            page: PageLocators::default(),
            specs_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            screenshots: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Base URL; page paths are joined onto it
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        let credentials = Credentials::default();
        Self {
            url: "http://localhost/".to_string(),
            username: credentials.username,
            password: credentials.password,
        }
    }
}

impl FrontendConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)
                .map_err(|e| E2eError::Config(format!("{}: {}", path.display(), e)))?;
            debug!("loaded configuration from {}", path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `FRONTCHECK_*` variables from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("FRONTCHECK_URL") {
            self.frontend.url = url;
        }
        if let Some(url) = get("FRONTCHECK_WEBDRIVER_URL") {
            self.webdriver.url = url;
        }
        if let Some(path) = get("FRONTCHECK_DB") {
            self.database = Some(PathBuf::from(path));
        }
        if let Some(username) = get("FRONTCHECK_USERNAME") {
            self.frontend.username = username;
        }
        if let Some(password) = get("FRONTCHECK_PASSWORD") {
            self.frontend.password = password;
        }
        if let Some(url) = get("FRONTCHECK_API_URL") {
            self.api_url = Some(url);
        }
        self
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.frontend.url.trim().is_empty() {
            return Err(E2eError::Config("frontend.url is empty".to_string()));
        }
        if self.timeouts.poll_ms > self.timeouts.wait_ms {
            return Err(E2eError::Config(format!(
                "timeouts.poll_ms ({}) exceeds timeouts.wait_ms ({})",
                self.timeouts.poll_ms, self.timeouts.wait_ms
            )));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| E2eError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
