#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the planning application map pipeline.
//!
//! Fetches applications for a jurisdiction, deduplicates them, resolves
//! parcel geometry, and writes the resulting map layers as `GeoJSON`
//! files through the file-backed render boundary adapter.

mod render;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use planning_map_cadastre::RegistryClient;
use planning_map_cadastre::boundary::BoundaryCache;
use planning_map_cli_utils::IndicatifProgress;
use planning_map_dedup::{DedupStrategy, deduplicate};
use planning_map_pipeline::stats::SummaryStats;
use planning_map_pipeline::{Pipeline, PipelineConfig, ProgressHooks, submit_output};
use planning_map_portal::cancel::CancelToken;
use planning_map_portal::{FetchCriteria, PortalClient};

use crate::render::FileRenderBoundary;

#[derive(Parser)]
#[command(name = "planning_map_cli", about = "Planning application map pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write map layers as GeoJSON files
    Run {
        /// Jurisdiction (local government area) name
        #[arg(long)]
        jurisdiction: String,
        /// Only include applications lodged on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Deduplication strategy: "identifier" or "similarity"
        #[arg(long, default_value = "identifier")]
        strategy: String,
        /// Drop records whose point falls outside the jurisdiction boundary
        #[arg(long)]
        boundary_filter: bool,
        /// Directory to write layer files into
        #[arg(long, default_value = "layers")]
        out: PathBuf,
    },
    /// Fetch and deduplicate only, printing summary statistics
    Stats {
        /// Jurisdiction (local government area) name
        #[arg(long)]
        jurisdiction: String,
        /// Only include applications lodged on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Deduplication strategy: "identifier" or "similarity"
        #[arg(long, default_value = "identifier")]
        strategy: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = planning_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            jurisdiction,
            since,
            strategy,
            boundary_filter,
            out,
        } => {
            let mut config =
                PipelineConfig::new(&jurisdiction).with_strategy(parse_strategy(&strategy)?);
            if let Some(date) = parse_since(since.as_deref())? {
                config = config.with_lodged_since(date);
            }
            if boundary_filter {
                config = config.with_boundary_filter();
            }

            let pipeline = Pipeline::new(PortalClient::new(), RegistryClient::new());
            let hooks = ProgressHooks {
                pages: Some(IndicatifProgress::records_bar(
                    &multi,
                    "Fetching applications...",
                )),
                batches: Some(IndicatifProgress::batch_bar(&multi, "Resolving parcels...")),
            };
            let mut boundary_cache = BoundaryCache::default();

            let output = pipeline
                .run(&config, &mut boundary_cache, &hooks, &CancelToken::new())
                .await?;

            let boundary = FileRenderBoundary::new(out);
            let submitted = submit_output(&boundary, &jurisdiction, &output).await?;

            print_stats(&output.stats);
            println!();
            println!(
                "Map output: {} point(s), {} parcel(s)",
                output.points.features.len(),
                output.parcels.features.len()
            );
            if output.diagnostics.failed_batches > 0 || output.diagnostics.unresolved_lots > 0 {
                println!(
                    "Resolution gaps: {} failed batch(es), {} unresolved lot(s), {} point fallback(s)",
                    output.diagnostics.failed_batches,
                    output.diagnostics.unresolved_lots,
                    output.diagnostics.point_fallbacks
                );
            }
            if let Some(handle) = submitted.points {
                println!("Point layer: {}", handle.0);
            }
            if let Some(handle) = submitted.parcels {
                println!("Parcel layer: {}", handle.0);
            }
        }

        Commands::Stats {
            jurisdiction,
            since,
            strategy,
        } => {
            let mut criteria = FetchCriteria::new(&jurisdiction);
            if let Some(date) = parse_since(since.as_deref())? {
                criteria = criteria.with_lodged_since(date);
            }

            let progress = IndicatifProgress::records_bar(&multi, "Fetching applications...");
            let records = PortalClient::new()
                .fetch_all(&criteria, Some(&progress), &CancelToken::new())
                .await?;
            progress.finish(format!("{} records fetched", records.len()));

            let canonical = deduplicate(records, parse_strategy(&strategy)?);
            print_stats(&SummaryStats::from_records(&canonical));
        }
    }

    Ok(())
}

fn parse_strategy(raw: &str) -> Result<DedupStrategy, String> {
    match raw {
        "identifier" => Ok(DedupStrategy::IdentifierFirst),
        "similarity" => Ok(DedupStrategy::SimilarityClustering),
        other => Err(format!(
            "unknown strategy '{other}' (expected \"identifier\" or \"similarity\")"
        )),
    }
}

fn parse_since(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| format!("invalid --since date '{s}': {e}"))
    })
    .transpose()
}

fn print_stats(stats: &SummaryStats) {
    println!();
    println!("Applications: {}", stats.total_applications);
    println!("Total value:  ${:.0}", stats.total_value);
    println!("New dwellings: {}", stats.total_dwellings);

    println!();
    println!("By status:");
    for (status, count) in &stats.by_status {
        println!("  {count:>6}  {status}");
    }

    println!();
    println!("By development type:");
    for (dev_type, count) in &stats.by_type {
        println!("  {count:>6}  {dev_type}");
    }
}
