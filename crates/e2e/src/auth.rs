//! Login and logout against the frontend login form

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::session::Session;
use crate::wait::Condition;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("Admin", "zabbix")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the login form and the sign-out control live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPage {
    pub url: String,
    pub username: Locator,
    pub password: Locator,
    pub submit: Locator,
    /// Error text shown by the form after a rejected attempt
    pub error: Locator,
    pub sign_out: Locator,
}

impl Default for LoginPage {
    fn default() -> Self {
        Self {
            url: "index.php".to_string(),
            username: Locator::id("name"),
            password: Locator::id("password"),
            submit: Locator::id("enter"),
            error: Locator::css(".red"),
            sign_out: Locator::css(".top-nav-signout"),
        }
    }
}

impl<D: Driver> Session<D> {
    /// Whether the login form is absent from the current page
    pub async fn is_authenticated(&self, page: &LoginPage) -> E2eResult<bool> {
        Ok(!self.exists(&page.username).await?)
    }

    /// Log in, then optionally open `target`.
    ///
    /// When the login page shows no form the session is already logged in
    /// and nothing is submitted. A rejected attempt fails with
    /// [`E2eError::Authentication`] carrying the form's error text.
    pub async fn login(
        &mut self,
        page: &LoginPage,
        credentials: &Credentials,
        target: Option<&str>,
    ) -> E2eResult<()> {
        self.open(&page.url).await?;

        if self.is_authenticated(page).await? {
            debug!("already logged in");
        } else {
            info!("logging in as {}", credentials.username);
            self.type_text(&page.username, &credentials.username).await?;
            self.type_text(&page.password, &credentials.password).await?;
            self.click(&page.submit).await?;

            if !self.is_authenticated(page).await? {
                let reason = match self.find_all(&page.error).await?.first() {
                    Some(element) => self.driver().text(element).await?.trim().to_string(),
                    None => String::new(),
                };
                let reason = if reason.is_empty() {
                    format!("login form still shown for {}", credentials.username)
                } else {
                    reason
                };
                return Err(E2eError::Authentication(reason));
            }
        }

        if let Some(target) = target {
            self.open(target).await?;
        }
        Ok(())
    }

    /// Sign out and wait for the login form to come back
    pub async fn logout(&mut self, page: &LoginPage) -> E2eResult<()> {
        info!("logging out");
        self.click(&page.sign_out).await?;
        self.wait(&Condition::Present {
            locator: page.username.clone(),
        })
        .await
    }
}
