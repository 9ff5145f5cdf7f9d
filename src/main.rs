mod assistant;
mod cli;
mod config;
mod error;
mod image;
mod orchestrator;
mod retry;
mod revision;
mod sheets;
mod ui;

use anyhow::{Result, bail};
use clap::Parser;
use console::Style;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use assistant::AssistantsClient;
use cli::{Cli, Command};
use config::{PeroConfig, TabAssistants};
use image::{FreeImageClient, ImageGenerator, ImagePipeline};
use orchestrator::{IllustrationStep, RowOrchestrator};
use sheets::SheetsClient;
use ui::RunProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = PeroConfig::load()?;
    config.validate()?;

    match cli.command {
        Command::Run { tab } => run(&config, tab.as_deref()).await,
        Command::Check => check(&config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pero=debug" } else { "pero=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn sheets_client(config: &PeroConfig) -> SheetsClient {
    SheetsClient::new(
        config.spreadsheet_id.clone(),
        config.sheets_access_token.clone(),
        config.retry.clone(),
    )
}

async fn run(config: &PeroConfig, only_tab: Option<&str>) -> Result<()> {
    let tabs: Vec<TabAssistants> = config
        .sheets
        .iter()
        .filter(|tab| only_tab.is_none_or(|name| tab.tab == name))
        .cloned()
        .collect();
    if tabs.is_empty() {
        println!("No matching tabs configured, nothing to process");
        return Ok(());
    }

    let illustration = if config.image.enabled {
        config
            .brief_assistant_id
            .clone()
            .map(|brief_assistant_id| IllustrationStep {
                brief_assistant_id,
                pipeline: ImagePipeline::new(
                    ImageGenerator::new(config.image_generator_config()),
                    FreeImageClient::new(config.image.host_api_key.clone()),
                ),
            })
    } else {
        None
    };

    let orchestrator = RowOrchestrator::new(
        sheets_client(config),
        AssistantsClient::new(config.assistants_config()),
        illustration,
        config.revision_policy(),
        config.lock_ttl_minutes,
    );

    let progress = RunProgress::start("processing prepared rows");
    match orchestrator.run_once(&tabs, config.per_run_rows).await {
        Ok(outcomes) => {
            progress.finish(&outcomes);
            Ok(())
        }
        Err(err) => {
            progress.fail(&err);
            Err(err.into())
        }
    }
}

async fn check(config: &PeroConfig) -> Result<()> {
    let store = sheets_client(config);
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();

    if config.sheets.is_empty() {
        println!("No tabs configured");
        return Ok(());
    }

    let mut failed = false;
    for tab in &config.sheets {
        match store.verify_tab(&tab.tab).await {
            Ok(()) => println!("  {} {}", green.apply_to("✓"), tab.tab),
            Err(err) => {
                println!("  {} {}: {err}", red.apply_to("✗"), tab.tab);
                failed = true;
            }
        }
    }
    if failed {
        bail!("worksheet validation failed");
    }
    Ok(())
}
