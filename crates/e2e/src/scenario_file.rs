//! Declarative YAML scenarios
//!
//! ```yaml
//! name: host-groups-create
//! tags: [hostgroups]
//! cases:
//!   - name: new group
//!     group: Test Group
//! steps:
//!   - action: open
//!     url: hostgroups.php?form=create
//!   - action: type
//!     locator: id:name
//!     text: "{{group}}"
//!   - action: click
//!     locator: id:add
//!   - action: assert_message
//!     kind: good
//!     title: Group added
//!   - action: db_count
//!     sql: SELECT NULL FROM hstgrp WHERE name = '{{group}}'
//!     expected: 1
//! ```
//!
//! `{{var}}` placeholders are replaced from the case row before the steps
//! are parsed, so a variable may hold a whole locator (`id:create`). A
//! placeholder with no matching variable is rejected when the file is
//! loaded. Values are substituted verbatim, including into SQL.

use async_trait::async_trait;
use frontcheck_common::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::auth::Credentials;
use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::matcher::normalize;
use crate::message::MessageKind;
use crate::provider::{Case, DataProvider};
use crate::runner::ScenarioRunner;
use crate::scenario::{Context, Scenario, TableScenario};
use crate::verify;
use crate::wait::Condition;

/// Variables of one case
pub type Vars = BTreeMap<String, String>;

/// A scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Log in with the configured credentials before the first step
    #[serde(default = "default_login")]
    pub login: bool,

    /// One run per case; a file without cases runs once
    #[serde(default)]
    pub cases: Vec<Case<BTreeMap<String, serde_yaml::Value>>>,

    /// Step templates, parsed into [`Step`]s once placeholders are filled
    pub steps: Vec<serde_yaml::Value>,

    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_login() -> bool {
    true
}

fn default_table() -> Locator {
    Locator::css("table.list-table")
}

/// A single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Open {
        url: String,
    },
    Click {
        locator: Locator,
    },
    Type {
        locator: Locator,
        text: String,
    },
    Select {
        locator: Locator,
        option: String,
    },
    Check {
        locator: Locator,
    },
    Uncheck {
        locator: Locator,
    },
    Wait {
        condition: Condition,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    AssertTextPresent {
        texts: Vec<String>,
    },
    AssertTextAbsent {
        texts: Vec<String>,
    },
    AssertTextMatches {
        pattern: String,
    },
    AssertTitle {
        title: String,
    },
    AssertHeader {
        header: String,
    },
    AssertField {
        locator: Locator,
        value: String,
    },
    AssertMessage {
        kind: MessageKind,
        title: String,
        #[serde(default)]
        details: Vec<String>,
    },
    AssertTableRow {
        #[serde(default = "default_table")]
        table: Locator,
        column: String,
        key: String,
        #[serde(default)]
        cells: BTreeMap<String, String>,
    },
    DbCount {
        sql: String,
        expected: usize,
    },
    /// Hash these queries now; `assert_unchanged` compares against them
    Snapshot {
        queries: Vec<String>,
    },
    AssertUnchanged,
    Login {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        target: Option<String>,
        /// The login form must reject the attempt with this text
        #[serde(default)]
        expect_error: Option<String>,
    },
    Logout,
}

impl ScenarioFile {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let file: Self = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut file = Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", path.display(), e)))?;
        file.source = Some(path.to_path_buf());
        Ok(file)
    }

    /// Load every `.yaml`/`.yml` file under `dir`, in path order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::ScenarioParse(format!(
                "{}: not a scenario directory",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| E2eError::ScenarioParse(format!("{}: {}", dir.display(), e)))?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if entry.file_type().is_file() && is_yaml {
                files.push(Self::from_file(entry.path())?);
            }
        }

        debug!("loaded {} scenario file(s) from {}", files.len(), dir.display());
        Ok(files)
    }

    /// Case variables as strings
    pub fn variables(&self) -> E2eResult<DataProvider<Vars>> {
        let mut cases = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            let mut vars = Vars::new();
            for (key, value) in &case.row {
                vars.insert(key.clone(), scalar(&self.name, key, value)?);
            }
            cases.push(Case {
                name: case.name.clone(),
                row: vars,
            });
        }
        Ok(cases.into_iter().collect())
    }

    /// Steps with every placeholder replaced
    pub fn resolve(&self, vars: &Vars) -> E2eResult<Vec<Step>> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, template)| {
                let step = interpolate_value(template.clone(), vars)?;
                serde_yaml::from_value(step)
                    .map_err(|e| E2eError::ScenarioParse(format!("step {}: {}", index + 1, e)))
            })
            .collect()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.steps.is_empty() {
            return Err(E2eError::ScenarioParse(format!("{}: no steps", self.name)));
        }
        let provider = self.variables()?;
        provider.validate()?;
        if provider.is_empty() {
            let steps = self.resolve(&Vars::new())?;
            check_step_order(&steps).map_err(|e| E2eError::ScenarioParse(format!("{}: {}", self.name, e)))?;
        }
        for case in provider.iter() {
            self.resolve(&case.row)
                .and_then(|steps| check_step_order(&steps))
                .map_err(|e| E2eError::ScenarioParse(format!("{}/{}: {}", self.name, case.name, e)))?;
        }
        Ok(())
    }

    /// Filter files by tag
    pub fn filter_by_tag<'a>(files: &'a [Self], tag: &str) -> Vec<&'a Self> {
        files.iter().filter(|f| f.tags.iter().any(|t| t == tag)).collect()
    }
}

/// `assert_unchanged` compares against an earlier `snapshot` step
fn check_step_order(steps: &[Step]) -> E2eResult<()> {
    let mut snapshot_taken = false;
    for (index, step) in steps.iter().enumerate() {
        match step {
            Step::Snapshot { .. } => snapshot_taken = true,
            Step::AssertUnchanged if !snapshot_taken => {
                return Err(E2eError::ScenarioParse(format!(
                    "step {}: assert_unchanged before any snapshot step",
                    index + 1
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn scalar(scenario: &str, key: &str, value: &serde_yaml::Value) -> E2eResult<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        _ => Err(E2eError::ScenarioParse(format!(
            "{}: variable {} must be a scalar",
            scenario, key
        ))),
    }
}

/// Replace `{{name}}` placeholders in `template`
pub fn interpolate(template: &str, vars: &Vars) -> E2eResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| E2eError::ScenarioParse(format!("unclosed placeholder in {:?}", template)))?;
        let name = after[..end].trim();
        let value = vars
            .get(name)
            .ok_or_else(|| E2eError::ScenarioParse(format!("unknown variable {{{{{}}}}}", name)))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn interpolate_value(value: serde_yaml::Value, vars: &Vars) -> E2eResult<serde_yaml::Value> {
    use serde_yaml::Value;

    Ok(match value {
        Value::String(s) => Value::String(interpolate(&s, vars)?),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|v| interpolate_value(v, vars))
                .collect::<E2eResult<_>>()?,
        ),
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (key, v) in map {
                out.insert(interpolate_value(key, vars)?, interpolate_value(v, vars)?);
            }
            Value::Mapping(out)
        }
        other => other,
    })
}

/// Run resolved steps in order, stopping at the first failure
pub async fn execute_steps<D: Driver>(ctx: &mut Context<D>, steps: &[Step]) -> E2eResult<()> {
    let mut snapshot: Option<Snapshot> = None;
    for (index, step) in steps.iter().enumerate() {
        debug!("step {}: {:?}", index + 1, step);
        execute_step(ctx, step, &mut snapshot).await?;
    }
    Ok(())
}

async fn execute_step<D: Driver>(
    ctx: &mut Context<D>,
    step: &Step,
    snapshot: &mut Option<Snapshot>,
) -> E2eResult<()> {
    match step {
        Step::Open { url } => ctx.session.open(url).await,
        Step::Click { locator } => ctx.session.click(locator).await,
        Step::Type { locator, text } => ctx.session.type_text(locator, text).await,
        Step::Select { locator, option } => ctx.session.select(locator, option).await,
        Step::Check { locator } => ctx.session.check(locator).await,
        Step::Uncheck { locator } => ctx.session.uncheck(locator).await,
        Step::Wait { condition, timeout_ms } => match timeout_ms {
            Some(ms) => {
                ctx.session
                    .wait_for(condition, std::time::Duration::from_millis(*ms))
                    .await
            }
            None => ctx.session.wait(condition).await,
        },
        Step::AssertTextPresent { texts } => ctx.session.assert_text_present(texts).await,
        Step::AssertTextAbsent { texts } => ctx.session.assert_text_absent(texts).await,
        Step::AssertTextMatches { pattern } => ctx.session.assert_text_matches(pattern).await,
        Step::AssertTitle { title } => ctx.session.assert_title_equals(title).await,
        Step::AssertHeader { header } => ctx.session.assert_header_equals(header).await,
        Step::AssertField { locator, value } => ctx.session.assert_field_value(locator, value).await,
        Step::AssertMessage { kind, title, details } => ctx.assert_message(*kind, title, details).await,
        Step::AssertTableRow {
            table,
            column,
            key,
            cells,
        } => {
            ctx.session
                .assert_table_row(table, &ctx.tables, column, key, cells)
                .await
        }
        Step::DbCount { sql, expected } => ctx.assert_count(sql, *expected),
        Step::Snapshot { queries } => {
            *snapshot = Some(ctx.snapshot(queries.iter().cloned())?);
            Ok(())
        }
        Step::AssertUnchanged => {
            let before = snapshot
                .as_ref()
                .ok_or_else(|| E2eError::ScenarioParse("assert_unchanged without a snapshot step".to_string()))?;
            verify::assert_unchanged(ctx.db()?, before)
        }
        Step::Login {
            username,
            password,
            target,
            expect_error,
        } => {
            let credentials = Credentials::new(
                username.clone().unwrap_or_else(|| ctx.credentials.username.clone()),
                password.clone().unwrap_or_else(|| ctx.credentials.password.clone()),
            );
            let result = ctx.login_as(&credentials, target.as_deref()).await;
            match (expect_error, result) {
                (None, result) => result,
                (Some(expected), Err(E2eError::Authentication(actual))) => {
                    if normalize(&actual).contains(&normalize(expected)) {
                        Ok(())
                    } else {
                        Err(E2eError::Assertion(format!(
                            "login rejected with {:?}, expected {:?}",
                            actual, expected
                        )))
                    }
                }
                (Some(expected), Ok(())) => Err(E2eError::Assertion(format!(
                    "login as {} succeeded, expected {:?}",
                    credentials.username, expected
                ))),
                (Some(_), Err(e)) => Err(e),
            }
        }
        Step::Logout => ctx.logout().await,
    }
}

/// A [`ScenarioFile`] as a runnable scenario
pub struct YamlScenario {
    file: ScenarioFile,
}

impl YamlScenario {
    pub fn new(file: ScenarioFile) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &ScenarioFile {
        &self.file
    }

    async fn run_with<D: Driver>(&self, ctx: &mut Context<D>, vars: &Vars) -> E2eResult<()> {
        let steps = self.file.resolve(vars)?;
        if self.file.login {
            ctx.login(None).await?;
        }
        execute_steps(ctx, &steps).await
    }
}

#[async_trait]
impl<D: Driver> Scenario<D> for YamlScenario {
    fn name(&self) -> &str {
        &self.file.name
    }

    fn tags(&self) -> Vec<String> {
        self.file.tags.clone()
    }

    async fn run(&self, ctx: &mut Context<D>) -> E2eResult<()> {
        self.run_with(ctx, &Vars::new()).await
    }
}

#[async_trait]
impl<D: Driver> TableScenario<D> for YamlScenario {
    type Row = Vars;

    fn name(&self) -> &str {
        &self.file.name
    }

    fn tags(&self) -> Vec<String> {
        self.file.tags.clone()
    }

    fn cases(&self) -> E2eResult<DataProvider<Vars>> {
        self.file.variables()
    }

    async fn run(&self, ctx: &mut Context<D>, vars: &Vars) -> E2eResult<()> {
        self.run_with(ctx, vars).await
    }
}

impl<D: Driver + 'static> ScenarioRunner<D> {
    /// Register a YAML scenario: once, or once per case
    pub fn add_file(&mut self, file: ScenarioFile) -> E2eResult<()> {
        if file.cases.is_empty() {
            self.add(YamlScenario::new(file))
        } else {
            self.add_table(YamlScenario::new(file))
        }
    }
}
