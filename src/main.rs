mod config;
mod github;
mod harvest;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// Issue Harvester — collects recently-closed GitHub issues together with
/// their discussion and the diff of the commit that closed them.
#[derive(Parser, Debug)]
#[command(name = "issue-harvester", version, about)]
struct Cli {
    /// Issues endpoint (e.g., https://api.github.com/repos/org/repo/issues)
    endpoint: String,

    /// Number of closed issues to collect [default: 150, or config]
    #[arg(short, long)]
    target: Option<usize>,

    /// Simultaneous issue enrichments [default: 20, or config]
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Write indexing documents as JSON to this path instead of printing a summary
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let _main_span = info_span!("issue_harvest", endpoint = %cli.endpoint).entered();

    info!("parsing endpoint");
    let endpoint = github::parse_issues_endpoint(&cli.endpoint)?;
    debug!(api_base = %endpoint.api_base, owner = %endpoint.owner, repo = %endpoint.name, "parsed endpoint");

    info!("loading configuration");
    let config = config::Config::load()?;
    debug!(authenticated = config.github.token.is_some(), "configuration loaded");

    let fetcher = github::Fetcher::new(config.fetcher_config())?;
    let request = github::HarvestRequest::new(cli.endpoint.as_str())
        .with_target(cli.target.unwrap_or(config.harvest.target));
    let options = harvest::HarvestOptions {
        concurrency: cli.concurrency.unwrap_or(config.harvest.concurrency),
        max_patch_bytes: config.harvest.max_patch_bytes,
    };

    info!(limit = request.target, concurrency = options.concurrency, "harvesting issues");
    let results = harvest::harvest(&fetcher, &request, &options).await?;

    let built_report = report::build(&results, &endpoint.repo());
    report::output(&built_report, &results, cli.output.as_deref())?;
    info!(issues = built_report.issues, with_diff = built_report.with_diff, "done");

    Ok(())
}
