//! Failure diagnostics
//!
//! When a unit fails the runner saves what the browser showed at that
//! moment: the current URL, the page text and, when the driver can take
//! one, a screenshot. Capture problems are logged and never mask the
//! original failure.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::driver::Driver;
use crate::error::E2eResult;
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub url: Option<String>,
    pub page_text: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    /// SHA-256 of the screenshot PNG
    pub screenshot_sha256: Option<String>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.page_text.is_none() && self.screenshot.is_none()
    }
}

pub struct DiagnosticsWriter {
    dir: PathBuf,
    screenshots: bool,
}

impl DiagnosticsWriter {
    /// Files go to `<output>/failures/`
    pub fn new(output_dir: &Path) -> Self {
        Self {
            dir: output_dir.join("failures"),
            screenshots: true,
        }
    }

    pub fn without_screenshots(mut self) -> Self {
        self.screenshots = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save whatever can be saved for `unit`
    pub async fn capture<D: Driver>(&self, session: &Session<D>, unit: &str) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("cannot create {}: {}", self.dir.display(), e);
            return diagnostics;
        }
        let stem = file_stem(unit);

        match session.current_url().await {
            Ok(url) => diagnostics.url = Some(url),
            Err(e) => warn!("no URL for {}: {}", unit, e),
        }

        match session.page_text().await {
            Ok(text) => {
                let path = self.dir.join(format!("{}.txt", stem));
                match std::fs::write(&path, text) {
                    Ok(()) => diagnostics.page_text = Some(path),
                    Err(e) => warn!("cannot write {}: {}", path.display(), e),
                }
            }
            Err(e) => warn!("no page text for {}: {}", unit, e),
        }

        if self.screenshots {
            match self.save_screenshot(session, &stem).await {
                Ok((path, hash)) => {
                    diagnostics.screenshot = Some(path);
                    diagnostics.screenshot_sha256 = Some(hash);
                }
                Err(e) => warn!("no screenshot for {}: {}", unit, e),
            }
        }

        if !diagnostics.is_empty() {
            info!("diagnostics for {} saved to {}", unit, self.dir.display());
        }
        diagnostics
    }

    async fn save_screenshot<D: Driver>(&self, session: &Session<D>, stem: &str) -> E2eResult<(PathBuf, String)> {
        let png = session.driver().screenshot().await?;
        let path = self.dir.join(format!("{}.png", stem));
        std::fs::write(&path, &png)?;
        Ok((path, hash_bytes(&png)))
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Unit names contain `/` and spaces; keep file names portable.
///
/// Sanitizing can map two names onto the same text, so the stem ends with
/// a short hash of the full name.
pub fn file_stem(unit: &str) -> String {
    let readable: String = unit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let readable = if readable.is_empty() { "unit" } else { readable.as_str() };
    let hash = hash_bytes(unit.as_bytes());
    format!("{}-{}", readable, &hash[..8])
}
