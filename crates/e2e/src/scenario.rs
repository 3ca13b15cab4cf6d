//! Scenario contract
//!
//! A scenario owns its fixtures: `setup` creates what the body needs,
//! `teardown` removes it. Nothing is shared between scenarios except the
//! [`Context`], and the runner resets the browser session between units.

use async_trait::async_trait;
use frontcheck_common::{Database, Snapshot};

use crate::api::ApiClient;
use crate::auth::{Credentials, LoginPage};
use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::message::{BannerLocators, MessageKind};
use crate::provider::DataProvider;
use crate::session::Session;
use crate::table::TableLocators;
use crate::verify;

/// Everything a scenario can touch
pub struct Context<D: Driver> {
    pub session: Session<D>,
    pub db: Option<Database>,
    pub api: Option<ApiClient>,
    pub login_page: LoginPage,
    pub credentials: Credentials,
    pub banners: BannerLocators,
    pub tables: TableLocators,
}

impl<D: Driver> Context<D> {
    pub fn new(session: Session<D>) -> Self {
        Self {
            session,
            db: None,
            api: None,
            login_page: LoginPage::default(),
            credentials: Credentials::default(),
            banners: BannerLocators::default(),
            tables: TableLocators::default(),
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_login_page(mut self, page: LoginPage) -> Self {
        self.login_page = page;
        self
    }

    pub fn with_banners(mut self, banners: BannerLocators) -> Self {
        self.banners = banners;
        self
    }

    pub fn with_tables(mut self, tables: TableLocators) -> Self {
        self.tables = tables;
        self
    }

    pub fn db(&self) -> E2eResult<&Database> {
        self.db
            .as_ref()
            .ok_or_else(|| E2eError::Config("no database configured".to_string()))
    }

    pub fn api(&self) -> E2eResult<&ApiClient> {
        self.api
            .as_ref()
            .ok_or_else(|| E2eError::Config("no API endpoint configured".to_string()))
    }

    /// Log in with the default credentials
    pub async fn login(&mut self, target: Option<&str>) -> E2eResult<()> {
        self.session
            .login(&self.login_page, &self.credentials, target)
            .await
    }

    pub async fn login_as(&mut self, credentials: &Credentials, target: Option<&str>) -> E2eResult<()> {
        self.session.login(&self.login_page, credentials, target).await
    }

    pub async fn logout(&mut self) -> E2eResult<()> {
        self.session.logout(&self.login_page).await
    }

    pub async fn assert_message<S: AsRef<str> + Sync>(
        &self,
        kind: MessageKind,
        title: &str,
        details: &[S],
    ) -> E2eResult<()> {
        self.session
            .assert_message(&self.banners, kind, title, details)
            .await
    }

    pub fn count(&self, sql: &str) -> E2eResult<usize> {
        Ok(self.db()?.count(sql)?)
    }

    pub fn assert_count(&self, sql: &str, expected: usize) -> E2eResult<()> {
        verify::assert_count(self.db()?, sql, expected)
    }

    pub fn snapshot<I, S>(&self, queries: I) -> E2eResult<Snapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Snapshot::capture(self.db()?, queries)?)
    }

    pub fn assert_unchanged(&self, before: &Snapshot) -> E2eResult<()> {
        verify::assert_unchanged(self.db()?, before)
    }
}

/// A scenario that runs once
#[async_trait]
pub trait Scenario<D: Driver>: Send + Sync {
    fn name(&self) -> &str;

    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    async fn setup(&self, _ctx: &mut Context<D>) -> E2eResult<()> {
        Ok(())
    }

    async fn run(&self, ctx: &mut Context<D>) -> E2eResult<()>;

    /// Runs whenever `setup` succeeded, whatever `run` returned
    async fn teardown(&self, _ctx: &mut Context<D>) -> E2eResult<()> {
        Ok(())
    }
}

/// A scenario body run once per case of its data provider
#[async_trait]
pub trait TableScenario<D: Driver>: Send + Sync {
    type Row: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn cases(&self) -> E2eResult<DataProvider<Self::Row>>;

    async fn setup(&self, _ctx: &mut Context<D>, _row: &Self::Row) -> E2eResult<()> {
        Ok(())
    }

    async fn run(&self, ctx: &mut Context<D>, row: &Self::Row) -> E2eResult<()>;

    async fn teardown(&self, _ctx: &mut Context<D>, _row: &Self::Row) -> E2eResult<()> {
        Ok(())
    }
}
