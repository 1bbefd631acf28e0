//! `premortem` command-line driver
//!
//! - `premortem analyze <document> --catalog <patterns>`: run a pre-mortem and
//!   print the report as JSON
//! - `premortem catalog <patterns>`: validate a pattern catalog and print its
//!   hash and skipped records
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`).

mod settings;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use premortem_catalog::PatternRegistry;
use premortem_core::{AnalysisRequest, Analyzer, DocumentContext};
use premortem_llm::OllamaClient;
use serde_json::json;
use settings::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("premortem")
        .version(premortem_core::VERSION)
        .about("Resilience review for system design documents")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Analyze a design document")
                .arg(
                    Arg::new("document")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Design document (markdown or plain text)"),
                )
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Failure pattern catalog (.json, .yaml)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML settings file"),
                )
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .help("Completion backend URL (overrides [backend] base_url)"),
                )
                .arg(
                    Arg::new("model")
                        .long("model")
                        .help("Completion model (overrides [backend] model)"),
                )
                .arg(
                    Arg::new("max-findings")
                        .long("max-findings")
                        .value_parser(value_parser!(usize))
                        .help("Maximum failure modes to report"),
                )
                .arg(Arg::new("scale").long("scale").help("Expected scale, e.g. \"5k QPS at peak\""))
                .arg(Arg::new("data-size").long("data-size").help("Expected data size"))
                .arg(Arg::new("latency-slo").long("latency-slo").help("Latency SLO"))
                .arg(Arg::new("availability-slo").long("availability-slo").help("Availability SLO"))
                .arg(
                    Arg::new("dependency")
                        .long("dependency")
                        .action(ArgAction::Append)
                        .help("Known dependency (repeatable)"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the report here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("catalog")
                .about("Validate a failure pattern catalog")
                .arg(
                    Arg::new("catalog")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Failure pattern catalog (.json, .yaml)"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail if any record was skipped"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("analyze", args)) => analyze(args).await,
        Some(("catalog", args)) => catalog(args),
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

fn settings_from(args: &ArgMatches) -> Result<Settings> {
    let mut settings = match args.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(url) = args.get_one::<String>("base-url") {
        settings.backend.base_url.clone_from(url);
    }
    if let Some(model) = args.get_one::<String>("model") {
        settings.backend.model.clone_from(model);
    }
    if let Some(max) = args.get_one::<usize>("max-findings") {
        settings.analysis.ranking.max_findings = *max;
    }
    Ok(settings)
}

fn context_from(args: &ArgMatches) -> DocumentContext {
    let text = |name: &str| args.get_one::<String>(name).cloned();
    DocumentContext {
        expected_scale: text("scale"),
        expected_data_size: text("data-size"),
        latency_slo: text("latency-slo"),
        availability_slo: text("availability-slo"),
        dependencies: args
            .get_many::<String>("dependency")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    }
}

fn load_catalog(path: &Path) -> Result<PatternRegistry> {
    PatternRegistry::from_path(path).with_context(|| format!("loading catalog {}", path.display()))
}

async fn analyze(args: &ArgMatches) -> Result<()> {
    let settings = settings_from(args)?;

    let Some(document_path) = args.get_one::<PathBuf>("document") else {
        bail!("missing document path");
    };
    let Some(catalog_path) = args.get_one::<PathBuf>("catalog") else {
        bail!("missing --catalog");
    };

    let document = std::fs::read_to_string(document_path)
        .with_context(|| format!("reading {}", document_path.display()))?;
    let registry = load_catalog(catalog_path)?;

    let client = OllamaClient::new(settings.backend.clone()).context("building completion client")?;
    if !client.check_health().await {
        tracing::warn!(
            url = %settings.backend.base_url,
            "completion backend is not reachable; findings will be lexical-only"
        );
    }

    let analyzer = Analyzer::new(Arc::new(registry), Arc::new(client), settings.analysis)
        .context("invalid analysis configuration")?;
    let request = AnalysisRequest::new(document).with_context(context_from(args));
    let report = analyzer
        .analyze(request)
        .await
        .with_context(|| format!("analyzing {}", document_path.display()))?;

    let json = report.to_json_pretty().context("serializing report")?;
    match args.get_one::<PathBuf>("output") {
        Some(out) => std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn catalog(args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("catalog") else {
        bail!("missing catalog path");
    };
    let registry = load_catalog(path)?;

    let summary = json!({
        "patterns": registry.len(),
        "version": registry.version(),
        "hash": registry.hash().to_string(),
        "ids": registry.patterns().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        "skipped": registry.diagnostics(),
    });
    println!("{}", serde_json::to_string_pretty(&summary).context("serializing catalog summary")?);

    if args.get_flag("strict") && !registry.diagnostics().is_empty() {
        bail!("{} catalog record(s) skipped", registry.diagnostics().len());
    }
    Ok(())
}
