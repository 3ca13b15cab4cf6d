//! frontcheck - run browser scenarios against a monitoring frontend
//!
//! Exit status: 0 when every unit passed, 1 when any failed, 2 when the
//! harness itself could not run.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use frontcheck_common::Database;
use frontcheck_e2e::config::HarnessConfig;
use frontcheck_e2e::process::{DriverProcess, DriverProcessConfig};
use frontcheck_e2e::report::{self, OutputFormat};
use frontcheck_e2e::{
    ApiClient, Context, RunnerOptions, ScenarioFile, ScenarioRunner, Session, WebDriverClient,
};

#[derive(Parser, Debug)]
#[command(name = "frontcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "frontcheck.toml", global = true)]
    config: PathBuf,

    /// Directory of YAML scenarios (overrides the config file)
    #[arg(short, long, global = true)]
    specs: Option<PathBuf>,

    /// Run only units whose name contains this text
    #[arg(short, long, global = true)]
    filter: Option<String>,

    /// Run only units with this tag (repeatable)
    #[arg(short, long, global = true)]
    tag: Vec<String>,

    /// Output directory for results
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// WebDriver server endpoint
    #[arg(long, env = "FRONTCHECK_WEBDRIVER_URL", global = true)]
    webdriver_url: Option<String>,

    /// Spawn this driver binary (chromedriver, geckodriver)
    #[arg(long, global = true)]
    driver_binary: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scenarios
    Run,
    /// List the units a run would execute
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = if cli.debug {
        EnvFilter::new(log_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            2
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let mut config = HarnessConfig::load(&cli.config)?.with_env();
    if let Some(specs) = &cli.specs {
        config.specs_dir = specs.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(url) = &cli.webdriver_url {
        config.webdriver.url = url.clone();
    }
    if let Some(binary) = &cli.driver_binary {
        config.driver_binary = Some(binary.clone());
    }
    config.validate()?;

    let options = RunnerOptions {
        filter: cli.filter.clone(),
        tags: cli.tag.clone(),
        output_dir: Some(config.output_dir.clone()),
        screenshots: config.screenshots,
    };
    let mut runner: ScenarioRunner<WebDriverClient> = ScenarioRunner::new(options);
    let files = ScenarioFile::load_all(&config.specs_dir)
        .with_context(|| format!("loading scenarios from {}", config.specs_dir.display()))?;
    for file in files {
        runner.add_file(file)?;
    }

    match cli.command {
        Commands::List => {
            report::print_units(&runner.list(), cli.format);
            Ok(0)
        }
        Commands::Run => run(config, &runner, cli.format).await,
    }
}

async fn run(
    mut config: HarnessConfig,
    runner: &ScenarioRunner<WebDriverClient>,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    // Dropping the process on an early return kills the driver.
    let driver_process = match &config.driver_binary {
        Some(binary) => {
            let process = DriverProcess::spawn(DriverProcessConfig {
                binary_path: binary.clone(),
                ..Default::default()
            })
            .await?;
            config.webdriver.url = process.url().to_string();
            Some(process)
        }
        None => None,
    };

    let client = WebDriverClient::connect(&config.webdriver)
        .await
        .with_context(|| format!("connecting to WebDriver at {}", config.webdriver.url))?;
    let session = Session::new(client, &config.frontend.url)?
        .with_policy(config.policy.clone())
        .with_timeouts(config.timeouts)
        .with_page_locators(config.page.clone());

    let mut ctx = Context::new(session)
        .with_credentials(config.frontend.credentials())
        .with_login_page(config.login.clone())
        .with_banners(config.banners.clone())
        .with_tables(config.tables.clone());

    if let Some(path) = &config.database {
        let db = Database::open(path).with_context(|| format!("opening {}", path.display()))?;
        ctx = ctx.with_database(db);
    }
    if let Some(url) = &config.api_url {
        let mut api = ApiClient::new(url.clone())?;
        api.login(&config.frontend.credentials()).await?;
        ctx = ctx.with_api(api);
    }

    let report = runner.run(&mut ctx).await;
    report.write(&config.output_dir)?;
    report::print_report(&report, format);

    if let Err(e) = ctx.session.quit().await {
        warn!("closing the browser session failed: {}", e);
    }
    if let Some(process) = driver_process {
        if let Err(e) = process.shutdown().await {
            warn!("stopping the WebDriver failed: {}", e);
        }
    }

    info!("done");
    Ok(if report.success() { 0 } else { 1 })
}
