//! Condition polling
//!
//! The harness never sleeps for a fixed time; every wait names the
//! condition it is waiting for and fails with [`E2eError::Timeout`] when the
//! budget runs out.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Something the page can be waited on to reach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "until", rename_all = "snake_case")]
pub enum Condition {
    /// At least one element matches
    Present { locator: Locator },
    /// No element matches
    Absent { locator: Locator },
    /// At least one matching element is displayed
    Visible { locator: Locator },
    /// No matching element is displayed (or none exists)
    Hidden { locator: Locator },
    /// Page text contains the string
    TextPresent { text: String },
    /// Page text no longer contains the string
    TextAbsent { text: String },
    /// Document title equals the string
    TitleIs { title: String },
    /// Document finished loading and no loading indicator is shown
    PageReady,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Present { locator } => write!(f, "{} to be present", locator),
            Condition::Absent { locator } => write!(f, "{} to be absent", locator),
            Condition::Visible { locator } => write!(f, "{} to be visible", locator),
            Condition::Hidden { locator } => write!(f, "{} to be hidden", locator),
            Condition::TextPresent { text } => write!(f, "text {:?} to be present", text),
            Condition::TextAbsent { text } => write!(f, "text {:?} to be absent", text),
            Condition::TitleIs { title } => write!(f, "title to be {:?}", title),
            Condition::PageReady => write!(f, "page to be ready"),
        }
    }
}

/// Wait budgets shared by a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Default budget for explicit waits and page-ready checks
    pub wait_ms: u64,
    /// Delay between two checks
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wait_ms: 10_000,
            poll_ms: 100,
        }
    }
}

impl Timeouts {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

/// Call `check` until it returns `true` or `timeout` elapses.
///
/// The check always runs at least once, so a zero timeout still checks the
/// condition. Errors from the check abort the wait immediately.
pub async fn poll_until<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> E2eResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if check().await? {
            debug!("{} satisfied after {} check(s)", what, attempts);
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(E2eError::Timeout(format!(
                "{} (gave up after {} ms, {} checks)",
                what,
                timeout.as_millis(),
                attempts
            )));
        }

        sleep(interval).await;
    }
}
