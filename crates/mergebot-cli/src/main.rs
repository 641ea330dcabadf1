use anyhow::{bail, Context};
use clap::Parser;
use mergebot_core::config::{Config, WarnLevel, CONFIG_FILE};
use mergebot_core::github::{Credentials, GitHubClient};
use mergebot_core::orchestrator::Orchestrator;
use mergebot_core::tracker::ChangeTracker;
use std::path::Path;

#[derive(Parser)]
#[command(
    name = "mergebot",
    about = "Moderate open pull requests: evaluate conf.yaml rules once and exit",
    version
)]
struct Cli {}

fn main() {
    let _cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(Path::new(CONFIG_FILE)) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let warnings = config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Error => tracing::error!("config: {}", w.message),
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
        }
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        bail!("config has errors; see log above");
    }

    let rules = config.rules().context("compiling rules")?;
    let tracker = ChangeTracker::open(&config.meta.database_path).with_context(|| {
        format!(
            "opening tracker database {}",
            config.meta.database_path.display()
        )
    })?;
    let credentials = Credentials::from_env();
    tracing::debug!(?credentials, api_url = %config.meta.api_url, "connecting");
    let client = GitHubClient::new(&config.meta.api_url, credentials)?;

    let report = Orchestrator::new(config.settings(), rules, &client, &tracker)
        .run()
        .with_context(|| format!("moderating {}", config.repo()))?;
    tracing::info!(
        open = report.open,
        examined = report.examined,
        fired = report.fired,
        "run complete"
    );
    Ok(())
}
