//! LANWATCH — Industrial LAN supervision daemon
//!
//! `lanwatch serve` runs the scheduler and the HTTP API; `scan` and `train`
//! run one-shot passes for operators and cron-style setups.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use lanwatch::ai::AssessmentEngine;
use lanwatch::config::Settings;
use lanwatch::http::{self, AppState};
use lanwatch::monitor::Scheduler;
use lanwatch::network::list_interfaces;
use lanwatch::notify::email::EmailSender;
use lanwatch::notify::NotificationBus;
use lanwatch::pipeline::Pipeline;
use lanwatch::probe::{ProbeConfig, ProbeEngine};
use lanwatch::store::Database;

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Serve { config: Option<PathBuf> },
    Scan { config: Option<PathBuf> },
    Train { config: Option<PathBuf> },
    Interfaces,
    Help,
    Version,
}

fn version_text() -> String {
    format!("lanwatch {}", env!("CARGO_PKG_VERSION"))
}

fn usage_text() -> String {
    format!(
        "{version}
LANWATCH Core Engine — Industrial LAN Supervision

Usage:
  lanwatch [serve] [--config <FILE>]
  lanwatch scan [--config <FILE>]
  lanwatch train [--config <FILE>]
  lanwatch interfaces
  lanwatch --help
  lanwatch --version

Options:
  -c, --config <FILE>  Settings file (JSON); LANWATCH_* env vars override
  -h, --help           Show this help text
  -V, --version        Show version",
        version = version_text()
    )
}

fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut config: Option<PathBuf> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "serve" | "scan" | "train" | "interfaces" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    anyhow::bail!("Multiple commands provided. Use only one command.\n\n{}", usage_text());
                }
                command = Some(arg.to_string());
            }
            "-c" | "--config" => {
                let value = iter
                    .next()
                    .with_context(|| format!("Missing value for --config.\n\n{}", usage_text()))?;
                config = Some(PathBuf::from(value.as_ref()));
            }
            _ if arg.starts_with("--config=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    anyhow::bail!("Missing value for --config.\n\n{}", usage_text());
                }
                config = Some(PathBuf::from(value));
            }
            _ => anyhow::bail!("Unknown argument: {arg}\n\n{}", usage_text()),
        }
    }

    match command.as_deref().unwrap_or("serve") {
        "serve" => Ok(CliCommand::Serve { config }),
        "scan" => Ok(CliCommand::Scan { config }),
        "train" => Ok(CliCommand::Train { config }),
        "interfaces" => {
            if config.is_some() {
                anyhow::bail!("--config is not valid with interfaces.\n\n{}", usage_text());
            }
            Ok(CliCommand::Interfaces)
        }
        _ => unreachable!(),
    }
}

fn model_artifact_path(db_path: &std::path::Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("models.json"),
        _ => PathBuf::from("models.json"),
    }
}

fn build_pipeline(settings: &Settings) -> Result<Arc<Pipeline>> {
    let db_path = settings
        .db_path
        .clone()
        .unwrap_or_else(Database::default_path);
    let db = Database::new(db_path.clone()).context("Cannot open the data store")?;

    let engine = Arc::new(AssessmentEngine::new(
        settings.anomaly_threshold,
        Some(model_artifact_path(&db_path)),
    ));
    let bus = Arc::new(NotificationBus::new(settings.notification_capacity));
    let prober = Arc::new(ProbeEngine::new(ProbeConfig::from_settings(settings)));
    let mailer = EmailSender::from_settings(&settings.email).map(Arc::new);

    Ok(Arc::new(Pipeline {
        settings: settings.clone(),
        db,
        engine,
        bus,
        prober,
        mailer,
    }))
}

async fn run_serve(settings: Settings) -> Result<()> {
    let pipeline = build_pipeline(&settings)?;
    let scheduler = Scheduler::new(Arc::clone(&pipeline));

    let state = AppState {
        db: pipeline.db.clone(),
        bus: Arc::clone(&pipeline.bus),
        scheduler: Arc::clone(&scheduler),
        settings: settings.clone(),
    };

    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run());
    let mut http_task = tokio::spawn(http::serve(state, settings.http_port));

    tokio::select! {
        result = &mut http_task => {
            // Listener bind failures are fatal initialization errors.
            scheduler.shutdown();
            result.context("HTTP task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            scheduler.shutdown();
            http_task.abort();
        }
    }

    // The current scan cancels cooperatively; give it a bounded window.
    if tokio::time::timeout(Duration::from_secs(5), scheduler_task)
        .await
        .is_err()
    {
        tracing::warn!("Scheduler did not stop within 5s; exiting anyway");
    }

    Ok(())
}

async fn run_scan_once(settings: Settings) -> Result<()> {
    let pipeline = build_pipeline(&settings)?;
    let summary = pipeline
        .run_scan(Arc::new(AtomicBool::new(false)))
        .await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize scan summary")?
    );
    Ok(())
}

async fn run_train_once(settings: Settings) -> Result<()> {
    let pipeline = build_pipeline(&settings)?;
    let report = pipeline.run_training().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize training report")?
    );
    Ok(())
}

async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match parse_cli_args(args)? {
        CliCommand::Help => {
            println!("{}", usage_text());
            Ok(())
        }
        CliCommand::Version => {
            println!("{}", version_text());
            Ok(())
        }
        CliCommand::Interfaces => {
            let interfaces = list_interfaces();
            if interfaces.is_empty() {
                println!("No valid IPv4 network interfaces found.");
            } else {
                for interface in interfaces {
                    println!("{}", interface);
                }
            }
            Ok(())
        }
        CliCommand::Serve { config } => {
            let settings = Settings::load(config.as_deref())?;
            run_serve(settings).await
        }
        CliCommand::Scan { config } => {
            let settings = Settings::load(config.as_deref())?;
            run_scan_once(settings).await
        }
        CliCommand::Train { config } => {
            let settings = Settings::load(config.as_deref())?;
            run_train_once(settings).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = lanwatch::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    if let Err(e) = run(std::env::args()).await {
        tracing::error!("{:#}", e);
        eprintln!("[ERROR] {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_is_serve() {
        let parsed = parse_cli_args(["lanwatch"]).expect("default args should parse");
        assert_eq!(parsed, CliCommand::Serve { config: None });
    }

    #[test]
    fn parse_scan_with_config() {
        let parsed =
            parse_cli_args(["lanwatch", "scan", "--config", "site.json"]).expect("should parse");
        assert_eq!(
            parsed,
            CliCommand::Scan {
                config: Some(PathBuf::from("site.json"))
            }
        );
    }

    #[test]
    fn parse_config_equals_form() {
        let parsed = parse_cli_args(["lanwatch", "serve", "--config=site.json"]).unwrap();
        assert_eq!(
            parsed,
            CliCommand::Serve {
                config: Some(PathBuf::from("site.json"))
            }
        );
    }

    #[test]
    fn parse_interfaces_rejects_config() {
        let err = parse_cli_args(["lanwatch", "interfaces", "--config", "x.json"])
            .expect_err("interfaces should reject --config");
        assert!(err.to_string().contains("not valid with interfaces"));
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let err = parse_cli_args(["lanwatch", "--bogus"]).expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }

    #[test]
    fn parse_help_and_version() {
        assert_eq!(parse_cli_args(["lanwatch", "--help"]).unwrap(), CliCommand::Help);
        assert_eq!(
            parse_cli_args(["lanwatch", "-V"]).unwrap(),
            CliCommand::Version
        );
    }

    #[test]
    fn model_artifact_lives_next_to_database() {
        let path = model_artifact_path(std::path::Path::new("/data/lanwatch/supervision.db"));
        assert_eq!(path, PathBuf::from("/data/lanwatch/models.json"));
    }
}
