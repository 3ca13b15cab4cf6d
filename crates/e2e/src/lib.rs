//! frontcheck E2E harness
//!
//! This crate drives a real browser against a monitoring frontend and
//! verifies the outcome on the page and in the database:
//! - Talks W3C WebDriver to chromedriver/geckodriver (optionally spawning it)
//! - Treats every page load and click as a transition checked against a page policy
//! - Logs in and out through the frontend's own login form
//! - Reads message banners and list tables
//! - Runs scenarios once, or once per data-provider case, with their own setup/teardown
//! - Parses declarative YAML scenarios
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner<D: Driver>                  │
//! │    ├── add(Scenario) / add_table(TableScenario)             │
//! │    ├── add_file(ScenarioFile)       (YAML, {{var}} cases)   │
//! │    └── run(&mut Context) -> SuiteReport                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Context                                                    │
//! │    ├── session: Session<D>                                  │
//! │    │     ├── open / click  -> wait page ready -> PagePolicy │
//! │    │     ├── type_text / select / check / uncheck           │
//! │    │     ├── wait_for(Condition, timeout)                   │
//! │    │     ├── login / logout             (auth)              │
//! │    │     ├── assert_* / table / message (matchers)          │
//! │    │     └── driver: WebDriverClient | test fake            │
//! │    ├── db: Database        (read-only SQL, digests)         │
//! │    └── api: ApiClient      (JSON-RPC fixtures)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assert;
pub mod auth;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod locator;
pub mod matcher;
pub mod message;
pub mod process;
pub mod provider;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod scenario_file;
pub mod session;
pub mod table;
pub mod verify;
pub mod wait;
pub mod webdriver;

pub use api::ApiClient;
pub use auth::{Credentials, LoginPage};
pub use driver::{Driver, ElementId};
pub use error::{E2eError, E2eResult};
pub use locator::Locator;
pub use matcher::PagePolicy;
pub use message::{BannerLocators, MessageKind};
pub use provider::{Case, CaseFailures, DataProvider};
pub use runner::{Outcome, RunnerOptions, ScenarioRunner, SuiteReport, UnitResult};
pub use scenario::{Context, Scenario, TableScenario};
pub use scenario_file::{ScenarioFile, Step};
pub use session::Session;
pub use table::{IndexedTable, Table};
pub use wait::{Condition, Timeouts};
pub use webdriver::{WebDriverClient, WebDriverConfig};
