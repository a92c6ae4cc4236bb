/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::main
  ------------------------------------------------------------
  Purpose:
    Entry point for the NuGet mirror. Searches the registry by
    keyword, mirrors the newest release of each major family
    of popular packages, and optionally trims oversized
    artifact sets.

  Security / Safety Notes:
    Operates within user privileges. Performs HTTPS GET
    requests and writes beneath the output directory only.

  Dependencies:
    clap for CLI parsing, chrono for session stamps.

  Operational Scope:
    Invoked manually or from a scheduler to refresh a local
    package mirror.

  Revision History:
    2026-10-16 NMR  Authored mirror runtime.
  ------------------------------------------------------------
  Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured status lines for every decision
    - Configurable execution via CLI and config file
============================================================*/

mod cleanup;
mod config;
mod error;
mod fetcher;
mod logger;
mod mirror;
mod package_info;
mod paginator;
mod registry;
mod report;
mod selector;
mod store;
mod throttle;
mod version;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser};

use cleanup::{run_cleanup, CleanupPolicy};
use config::MirrorConfig;
use error::{MirrorError, Result};
use logger::{Logger, Verbosity};
use mirror::{Mirror, MirrorSettings};
use registry::{build_http_client, resolve_endpoints, FlatContainerClient, NuGetSearchClient};
use report::{write_report, RunReport};

/// Command-line arguments for nuget-mirror.
#[derive(Debug, Parser)]
#[command(
    name = "nuget-mirror",
    version,
    about = "Mirror popular NuGet packages to local storage"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the output directory.
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Search term; repeat to mirror several. Replaces configured terms.
    #[arg(long = "term", value_name = "TERM", action = ArgAction::Append)]
    terms: Vec<String>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Write the run report as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Search and select only; create no folders and download nothing.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Run the oversize cleanup pass after mirroring.
    #[arg(long, action = ArgAction::SetTrue)]
    cleanup: bool,
    /// Run only the oversize cleanup pass.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "cleanup")]
    cleanup_only: bool,
    /// Echo debug entries to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
    /// Echo only warnings and errors to stderr.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[nuget-mirror] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = MirrorConfig::load_from_optional_path(cli.config.as_deref())?;
    if !cli.terms.is_empty() {
        config.mirror.terms = cli.terms.clone();
        config.validate()?;
    }
    let output_dir = cli.output.clone().unwrap_or_else(|| config.output_dir());

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("mirror_{session_stamp}.log")));
    let logger = Logger::new(Some(log_path), Verbosity::from_flags(cli.verbose, cli.quiet))?;
    logger.info(
        "INIT",
        format!(
            "nuget-mirror {} output={} dry_run={}",
            env!("CARGO_PKG_VERSION"),
            output_dir.display(),
            cli.dry_run
        ),
    );

    let terms = if cli.cleanup_only {
        Vec::new()
    } else {
        mirror_terms(&config, &output_dir, cli.dry_run, &logger).await?
    };

    let cleanup = if cli.cleanup || cli.cleanup_only {
        let policy = CleanupPolicy {
            oversize_threshold_bytes: config.cleanup.oversize_threshold_bytes,
            keep_largest: config.cleanup.keep_largest,
            extension: config.artifact_extension().to_string(),
            dry_run: cli.dry_run,
        };
        Some(run_cleanup(&output_dir, &policy, &logger).await?)
    } else {
        None
    };

    let report = RunReport::build(&output_dir, cli.dry_run, terms, cleanup);
    if let Some(path) = &cli.report {
        write_report(&report, path)?;
        logger.info("REPORT", format!("Report written to {}", path.display()));
    }

    logger.info("SUMMARY", report.summary());
    logger.info("COMPLETE", "All done!");
    logger.finalize()?;

    Ok(ExitCode::SUCCESS)
}

async fn mirror_terms(
    config: &MirrorConfig,
    output_dir: &std::path::Path,
    dry_run: bool,
    logger: &Logger,
) -> Result<Vec<report::TermReport>> {
    let client = build_http_client(&config.registry)?;
    let endpoints = resolve_endpoints(&client, &config.registry).await?;
    logger.debug(
        "ENDPOINTS",
        format!(
            "search={} packages={}",
            endpoints.search_url, endpoints.package_base_url
        ),
    );

    let search = NuGetSearchClient::new(
        client.clone(),
        endpoints.search_url,
        config.registry.max_retries,
    );
    let artifacts = FlatContainerClient::new(
        client,
        endpoints.package_base_url,
        config.artifact_extension(),
    );

    let settings = MirrorSettings::from_config(config, output_dir.to_path_buf(), dry_run);
    let terms = config.terms();
    if terms.is_empty() {
        return Err(MirrorError::Config("No search terms configured".into()));
    }
    Mirror::new(&search, &artifacts, settings, logger)
        .run(&terms)
        .await
}
