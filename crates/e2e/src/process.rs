//! Locally spawned WebDriver (chromedriver, geckodriver)
//!
//! The child is spawned with `kill_on_drop`, so an early return never leaves
//! a driver behind. [`DriverProcess::shutdown`] is the orderly path: SIGTERM,
//! then a kill once the grace period runs out.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DriverProcessConfig {
    pub binary_path: PathBuf,
    /// `None` picks a free local port
    pub port: Option<u16>,
    pub extra_args: Vec<String>,
    /// How long `/status` may take to report ready
    pub startup_timeout: Duration,
    /// How long the driver gets to exit after SIGTERM
    pub shutdown_grace: Duration,
}

impl Default for DriverProcessConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("chromedriver"),
            port: None,
            extra_args: Vec::new(),
            startup_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

pub struct DriverProcess {
    child: Child,
    url: String,
    shutdown_grace: Duration,
}

impl DriverProcess {
    /// Start the binary and wait until its `/status` endpoint reports ready
    pub async fn spawn(config: DriverProcessConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => free_port()?,
        };

        let child = Command::new(&config.binary_path)
            .arg(format!("--port={}", port))
            .args(&config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::DriverStartup(format!("{}: {}", config.binary_path.display(), e)))?;

        info!(binary = %config.binary_path.display(), port, "spawned WebDriver");

        let mut process = Self {
            child,
            url: format!("http://127.0.0.1:{}", port),
            shutdown_grace: config.shutdown_grace,
        };
        process.await_ready(config.startup_timeout).await?;

        info!(url = %process.url, "WebDriver ready");
        Ok(process)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn await_ready(&mut self, limit: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(2)).build()?;
        let status_url = format!("{}/status", self.url);
        let mut attempts = 0usize;

        let polled = timeout(limit, async {
            loop {
                attempts += 1;
                match self.child.try_wait() {
                    Ok(Some(status)) => {
                        return Err(E2eError::DriverStartup(format!("driver exited during startup ({})", status)));
                    }
                    Ok(None) => {}
                    Err(e) => return Err(E2eError::from(e)),
                }
                if status_ready(&client, &status_url).await {
                    return Ok(());
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;

        match polled {
            Ok(result) => result,
            Err(_) => Err(E2eError::DriverHealthCheck(attempts)),
        }
    }

    /// Stop the driver: SIGTERM, then kill after the grace period
    pub async fn shutdown(mut self) -> E2eResult<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    debug!("SIGTERM to {} failed: {}", pid, e);
                }
            }
        }

        match timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(%status, "WebDriver stopped");
            }
            Err(_) => {
                warn!("WebDriver still running after {:?}, killing it", self.shutdown_grace);
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

/// One `/status` request; connection errors are expected while the driver boots
async fn status_ready(client: &reqwest::Client, status_url: &str) -> bool {
    match client.get(status_url).send().await {
        Ok(response) => match response.json::<serde_json::Value>().await {
            Ok(body) => is_ready(&body),
            Err(e) => {
                debug!("unreadable /status body: {}", e);
                false
            }
        },
        Err(e) => {
            if !e.is_connect() {
                warn!("status check failed: {}", e);
            }
            false
        }
    }
}

/// `/status` body: `{"value": {"ready": true, "message": ...}}`
fn is_ready(body: &serde_json::Value) -> bool {
    body.get("value")
        .and_then(|v| v.get("ready"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

fn free_port() -> E2eResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
