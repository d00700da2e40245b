//! `scrape` command: one pipeline run, with Ctrl-C as cooperative cancel.

use std::path::PathBuf;

use clap::Args;
use socialetl_core::{AppConfig, Platform, SortOrder};
use socialetl_db::{ExportFormat, PostFilter, Store};
use socialetl_pipeline::{CancelHandle, Pipeline, RunReport, RunRequest};

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Source to collect from (reddit, twitter, youtube, instagram)
    #[arg(long)]
    pub platform: Platform,
    /// Search query, or hashtag for instagram
    #[arg(long)]
    pub target: Option<String>,
    /// Subreddit to list instead of searching (reddit only)
    #[arg(long)]
    pub subreddit: Option<String>,
    /// Maximum number of posts to extract
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
    /// Listing order: hot, new, top or rising (reddit only)
    #[arg(long)]
    pub sort: Option<SortOrder>,
    /// Also export this platform's stored posts as CSV to this path
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Run the pipeline once and print its report.
///
/// # Errors
///
/// Returns an error if the request is invalid, the pipeline cannot be built,
/// the run ends in `failed`, or the follow-up export fails.
pub(crate) async fn run_scrape(
    config: &AppConfig,
    store: Store,
    args: &ScrapeArgs,
) -> anyhow::Result<()> {
    let request = RunRequest::new(
        args.platform,
        args.target.as_deref(),
        args.subreddit.as_deref(),
        args.limit,
        args.sort,
    )?;
    let pipeline = Pipeline::from_config(config, store)?;

    let cancel = CancelHandle::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping after the current post");
                cancel.cancel();
            }
        })
    };

    let report = pipeline.run(&request, &cancel).await;
    interrupt.abort();
    print_report(&report);

    if !report.succeeded() {
        anyhow::bail!("run {} failed", report.run_id);
    }

    if let Some(path) = &args.output {
        let filter = PostFilter::platform(args.platform);
        let rows = pipeline
            .store()
            .query()
            .export(ExportFormat::Csv, &filter, path)
            .await?;
        println!("exported {rows} {} post(s) to {}", args.platform, path.display());
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("run       {}", report.run_id);
    println!("platform  {} ({})", report.platform, report.target);
    println!(
        "state     {}{}",
        report.state,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    println!("extracted {}", report.extracted_count);
    println!("loaded    {}", report.loaded_count);
    println!("duplicate {}", report.duplicate_count);
    println!("skipped   {}", report.skipped_count);
    println!("elapsed   {:.1}s", report.elapsed.as_secs_f64());

    let stats = &report.transform_stats;
    if stats.accepted > 0 {
        let sentiment = stats
            .sentiment
            .iter()
            .map(|(label, n)| format!("{label}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("sentiment {sentiment}");
    }
    for error in &report.errors {
        println!("error     {error}");
    }
}
