//! `pra-verify`: check every citation link in a rendered report

mod output;

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, Command};
use futures::stream::{self, StreamExt};
use pra_citation::{extract_citation_urls, CitationVerifier, ProposedCitation, ReqwestFetcher};
use pra_core::PipelineConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("pra-verify")
        .version(pra_core::VERSION)
        .about("Validate citation links in a rendered research report")
        .arg(
            Arg::new("report")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Rendered HTML report"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Pipeline configuration (TOML)"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .value_parser(value_parser!(usize))
                .help("Maximum concurrent fetches"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Output verdicts as JSON"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        if concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }
        config.verifier = config.verifier.with_max_concurrent_fetches(concurrency);
    }

    let Some(report) = matches.get_one::<PathBuf>("report") else {
        bail!("missing report path");
    };
    let html = std::fs::read_to_string(report)
        .with_context(|| format!("reading {}", report.display()))?;

    let urls = extract_citation_urls(&html, &config.skip_hosts);
    tracing::info!("Found {} citation links in {}", urls.len(), report.display());

    let fetcher = Arc::new(ReqwestFetcher::new(&config.verifier)?);
    let verifier = CitationVerifier::new(config.verifier.clone(), fetcher)?;

    let records: Vec<_> = stream::iter(&urls)
        .map(|url| {
            let citation = ProposedCitation::new(url.as_str());
            let verifier = &verifier;
            async move { verifier.verify(&citation).await }
        })
        .buffered(config.verifier.max_concurrent_fetches)
        .collect()
        .await;

    let summary = output::Summary::of(&records);
    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&output::JsonReport::new(&records, summary))?);
    } else {
        print!("{}", output::render_table(&records));
        println!();
        println!("{summary}");
    }

    let stats = verifier.stats();
    tracing::debug!(lookups = stats.lookups, fetches = stats.fetches, "Verifier cache");

    std::process::exit(if summary.rejected == 0 { 0 } else { 1 });
}
