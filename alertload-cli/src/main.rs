use alertload_config::{AlertLoadConfig, ConfigLoader};
use alertload_core::{Suite, SuiteOverrides};
use alertload_deploy::{DeploymentProvisioner, EcctlBackend, ProvisionerSettings};
use alertload_http::HttpManager;
use alertload_runner::{
    run_name, HttpConnector, JsonReportWriter, RunOrchestrator, RunSettings, SuiteCatalog,
};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;
mod logging;
use cli::{Cli, Commands};

/// Load configuration from file or environment
fn load_config(config_path: Option<&PathBuf>) -> Result<AlertLoadConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                eprintln!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Built-in suites, plus the suites of `--suites` when given
fn load_catalog(suites_path: Option<&PathBuf>) -> Result<SuiteCatalog> {
    let mut catalog = SuiteCatalog::builtin();
    if let Some(path) = suites_path {
        let extra = SuiteCatalog::from_file(path)
            .context(format!("Failed to load suites from {:?}", path))?;
        debug!("loaded {} suite(s) from {:?}", extra.len(), path);
        catalog.merge(extra);
    }
    Ok(catalog)
}

fn provisioner(config: &AlertLoadConfig) -> DeploymentProvisioner {
    let backend = Arc::new(EcctlBackend::from_config(&config.provisioning));
    DeploymentProvisioner::new(
        backend,
        ProvisionerSettings::from_config(&config.provisioning, &config.retry),
    )
}

/// Run a suite end to end
async fn run_command(
    config: &AlertLoadConfig,
    suite: Suite,
    overrides: SuiteOverrides,
    minutes: Option<u64>,
) -> Result<()> {
    let suite = suite.with_overrides(&overrides);

    let http = HttpManager::with_config(config.http.clone())
        .context("Failed to create HTTP client")?;
    let connector = Arc::new(HttpConnector::new(http, &config.run.event_log_index));
    let sink = Arc::new(
        JsonReportWriter::new(&config.report.output_dir).pretty(config.report.pretty),
    );
    let settings = RunSettings::from_config(config).with_minutes(minutes);

    let provisioner = Arc::new(provisioner(config));
    let created = provisioner.created();
    let orchestrator = RunOrchestrator::new(provisioner, connector, sink, settings);

    let run_name = run_name(Utc::now());
    info!(
        "creating deployments for stack {}",
        overrides.stack.as_deref().unwrap_or("(default)")
    );

    let summary = tokio::select! {
        outcome = orchestrator.run(&suite, &run_name) => outcome
            .with_context(|| format!("Run {} of suite {} failed", run_name, suite.id))?,
        _ = tokio::signal::ctrl_c() => {
            // interrupted runs skip teardown
            for deployment in created.snapshot() {
                warn!("interrupted, deployment still live: {} ({})", deployment.name, deployment.id);
            }
            anyhow::bail!("Run {} interrupted; remove its deployments with `alertload rmdall`", run_name);
        }
    };

    println!("run:         {}", summary.run_name);
    println!("deployments: {}", summary.deployments);
    println!(
        "rules:       {} created, {} failed",
        summary.rules.completed, summary.rules.failed
    );
    println!(
        "samples:     {} in {} cycle(s)",
        summary.samples, summary.sample_cycles
    );
    println!("log records: {}", summary.log_records);
    println!("report:      {}", summary.report_location);

    if summary.teardown_failures > 0 || summary.leftovers > 0 {
        warn!(
            "{} deployment(s) could not be deleted and {} remain; remove them with `alertload rmdall`",
            summary.teardown_failures, summary.leftovers
        );
    }
    Ok(())
}

/// Print every suite with its scenarios
fn list_suites(catalog: &SuiteCatalog) {
    for suite in catalog.suites() {
        println!();
        println!("{}", suite.id);
        if !suite.description.is_empty() {
            println!("  {}", suite.description);
        }
        for scenario in &suite.scenarios {
            let deployment = &scenario.deployment;
            println!(
                "    {}: {} rules every {}, {}% firing; es: {}; kb: {}; stack: {}",
                scenario.name,
                scenario.alerts,
                scenario.alert_interval,
                scenario.percent_firing,
                deployment.es,
                deployment.kb,
                deployment.version.as_deref().unwrap_or("default"),
            );
        }
    }
}

async fn list_deployments(config: &AlertLoadConfig) -> Result<()> {
    let leftovers = provisioner(config)
        .list_leftovers()
        .await
        .context("Failed to list deployments")?;

    for leftover in leftovers {
        println!("{}  {}", leftover.name, leftover.id);
    }
    Ok(())
}

async fn delete_deployments(config: &AlertLoadConfig) -> Result<()> {
    let deleted = provisioner(config)
        .delete_leftovers()
        .await
        .context("Failed to list deployments")?;

    println!("deleted {} deployment(s)", deleted);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(ref name) = cli.ecctl_config {
        config.provisioning.ecctl_config = name.clone();
    }

    logging::init_tracing(&config.logging, cli.log_level.as_deref());
    debug!("ecctl config: {}", config.provisioning.ecctl_config);

    match cli.command {
        Commands::Run {
            suite,
            stack,
            minutes,
            percent_firing,
            template,
        } => {
            let catalog = load_catalog(cli.suites.as_ref())?;
            let suite = catalog
                .get(&suite)
                .cloned()
                .with_context(|| format!("No suite with id {}, see `alertload ls`", suite))?;
            let overrides = SuiteOverrides {
                percent_firing,
                stack,
                template,
            };
            run_command(&config, suite, overrides, minutes).await
        }
        Commands::Ls => {
            list_suites(&load_catalog(cli.suites.as_ref())?);
            Ok(())
        }
        Commands::Lsd => list_deployments(&config).await,
        Commands::Rmdall => delete_deployments(&config).await,
        Commands::SampleConfig => {
            println!("{}", AlertLoadConfig::generate_sample());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let config = load_config(Some(&PathBuf::from("/nonexistent/alertload.yaml"))).unwrap();
        assert_eq!(config.run.minutes, 10);
    }

    #[test]
    fn test_catalog_with_suite_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- id: smoke\n  scenarios:\n    - name: one\n      alerts: 1\n      deployment: {{ es: 1x1, kb: 1x1 }}"
        )
        .unwrap();

        let catalog = load_catalog(Some(&file.path().to_path_buf())).unwrap();
        assert!(catalog.get("smoke").is_some());
        assert!(catalog.get("number-of-alerts").is_some());

        assert!(load_catalog(Some(&PathBuf::from("/nonexistent/suites.yaml"))).is_err());
    }
}
