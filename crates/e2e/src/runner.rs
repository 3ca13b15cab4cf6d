//! Scenario runner
//!
//! Scenarios are expanded into units (one per scenario, or one per case
//! for table scenarios, named `scenario/case`) and run sequentially on a
//! single [`Context`]. A failing unit never stops the suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::diagnostics::{Diagnostics, DiagnosticsWriter};
use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::scenario::{Context, Scenario, TableScenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// Result of one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<UnitResult>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitResult> {
        self.results.iter().filter(|r| r.outcome == Outcome::Failed)
    }

    /// Write `test-results.json` into `output_dir`
    pub fn write(&self, output_dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Which units to run and where failures go
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Substring of the unit name
    pub filter: Option<String>,
    /// Run units carrying any of these tags; empty runs everything
    pub tags: Vec<String>,
    /// Failure diagnostics go under `<output_dir>/failures/`
    pub output_dir: Option<PathBuf>,
    pub screenshots: bool,
}

#[async_trait]
trait UnitBody<D: Driver>: Send + Sync {
    async fn setup(&self, ctx: &mut Context<D>) -> E2eResult<()>;
    async fn run(&self, ctx: &mut Context<D>) -> E2eResult<()>;
    async fn teardown(&self, ctx: &mut Context<D>) -> E2eResult<()>;
}

struct Single<S>(Arc<S>);

#[async_trait]
impl<D: Driver, S: Scenario<D>> UnitBody<D> for Single<S> {
    async fn setup(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.0.setup(ctx).await
    }

    async fn run(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.0.run(ctx).await
    }

    async fn teardown(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.0.teardown(ctx).await
    }
}

struct TableCase<T, R> {
    scenario: Arc<T>,
    row: R,
}

#[async_trait]
impl<D, T> UnitBody<D> for TableCase<T, <T as TableScenario<D>>::Row>
where
    D: Driver,
    T: TableScenario<D>,
{
    async fn setup(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.scenario.setup(ctx, &self.row).await
    }

    async fn run(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.scenario.run(ctx, &self.row).await
    }

    async fn teardown(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.scenario.teardown(ctx, &self.row).await
    }
}

struct Unit<D: Driver> {
    name: String,
    tags: Vec<String>,
    body: Box<dyn UnitBody<D>>,
}

pub struct ScenarioRunner<D: Driver> {
    units: Vec<Unit<D>>,
    options: RunnerOptions,
}

impl<D: Driver + 'static> Default for ScenarioRunner<D> {
    fn default() -> Self {
        Self::new(RunnerOptions::default())
    }
}

impl<D: Driver + 'static> ScenarioRunner<D> {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            units: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Register a single-run scenario
    pub fn add<S: Scenario<D> + 'static>(&mut self, scenario: S) -> E2eResult<()> {
        let name = scenario.name().to_string();
        self.ensure_unique(&name)?;
        self.units.push(Unit {
            name,
            tags: scenario.tags(),
            body: Box::new(Single(Arc::new(scenario))),
        });
        Ok(())
    }

    /// Register a table scenario, one unit per case
    pub fn add_table<T: TableScenario<D> + 'static>(&mut self, scenario: T) -> E2eResult<()> {
        let provider = scenario.cases()?;
        provider.validate()?;

        let scenario = Arc::new(scenario);
        let tags = scenario.tags();
        for case in provider.into_cases() {
            let name = format!("{}/{}", scenario.name(), case.name);
            self.ensure_unique(&name)?;
            self.units.push(Unit {
                name,
                tags: tags.clone(),
                body: Box::new(TableCase {
                    scenario: Arc::clone(&scenario),
                    row: case.row,
                }),
            });
        }
        Ok(())
    }

    fn ensure_unique(&self, name: &str) -> E2eResult<()> {
        if self.units.iter().any(|u| u.name == name) {
            return Err(E2eError::ScenarioParse(format!("duplicate unit name {:?}", name)));
        }
        Ok(())
    }

    fn selected(&self, unit: &Unit<D>) -> bool {
        let name_ok = match &self.options.filter {
            Some(filter) => unit.name.contains(filter.as_str()),
            None => true,
        };
        let tag_ok = self.options.tags.is_empty() || unit.tags.iter().any(|t| self.options.tags.contains(t));
        name_ok && tag_ok
    }

    /// Names and tags of the units a run would execute
    pub fn list(&self) -> Vec<(&str, &[String])> {
        self.units
            .iter()
            .filter(|u| self.selected(u))
            .map(|u| (u.name.as_str(), u.tags.as_slice()))
            .collect()
    }

    /// Run every selected unit in registration order
    pub async fn run(&self, ctx: &mut Context<D>) -> SuiteReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let selected: Vec<&Unit<D>> = self.units.iter().filter(|u| self.selected(u)).collect();

        info!("Running {} unit(s)...", selected.len());

        let mut results = Vec::with_capacity(selected.len());
        for unit in selected {
            let result = self.run_unit(unit, ctx).await;
            match result.outcome {
                Outcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                Outcome::Skipped => info!(
                    "- {} skipped: {}",
                    result.name,
                    result.error.as_deref().unwrap_or("")
                ),
                Outcome::Failed => error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            }
            results.push(result);
        }

        let count = |o: Outcome| results.iter().filter(|r| r.outcome == o).count();
        let report = SuiteReport {
            started_at,
            total: results.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            skipped: count(Outcome::Skipped),
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        };

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            report.passed, report.failed, report.skipped, report.duration_ms
        );
        report
    }

    async fn run_unit(&self, unit: &Unit<D>, ctx: &mut Context<D>) -> UnitResult {
        let start = Instant::now();
        debug!("Running unit: {}", unit.name);

        let result = match ctx.session.reset().await {
            Ok(()) => Self::execute(unit, ctx).await,
            Err(e) => Err(e),
        };

        let (outcome, error) = match result {
            Ok(()) => (Outcome::Passed, None),
            Err(E2eError::Skipped(reason)) => (Outcome::Skipped, Some(reason)),
            Err(e) => (Outcome::Failed, Some(e.to_string())),
        };

        let diagnostics = match (&self.options.output_dir, outcome) {
            (Some(dir), Outcome::Failed) => {
                let mut writer = DiagnosticsWriter::new(dir);
                if !self.options.screenshots {
                    writer = writer.without_screenshots();
                }
                Some(writer.capture(&ctx.session, &unit.name).await)
            }
            _ => None,
        };

        UnitResult {
            name: unit.name.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
            error,
            diagnostics,
        }
    }

    /// setup, run, then teardown whenever setup succeeded. A body failure
    /// wins over a teardown failure.
    async fn execute(unit: &Unit<D>, ctx: &mut Context<D>) -> E2eResult<()> {
        unit.body.setup(ctx).await?;
        let outcome = unit.body.run(ctx).await;
        let cleanup = unit.body.teardown(ctx).await;

        match (outcome, cleanup) {
            (Err(e), Err(t)) => {
                warn!("teardown of {} also failed: {}", unit.name, t);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(t)) => Err(t),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}
