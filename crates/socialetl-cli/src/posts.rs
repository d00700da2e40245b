//! Read-only `posts` commands over the query facade.

use std::path::PathBuf;

use clap::Subcommand;
use socialetl_core::{AppConfig, Platform, SentimentLabel, StoredPost};
use socialetl_db::{ExportFormat, GroupBy, Metric, PostFilter, PostOrder, QueryFacade};

const TEXT_WIDTH: usize = 60;

/// Sub-commands available under `posts`.
#[derive(Debug, Subcommand)]
pub enum PostsCommands {
    /// List stored posts, newest scrape first
    List {
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        sentiment: Option<SentimentLabel>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// scraped_at, timestamp or likes
        #[arg(long, default_value = "scraped_at")]
        order: PostOrder,
    },
    /// Case-insensitive text search ranked by occurrences
    Search {
        text: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Whole-store summary
    Stats,
    /// One metric per group
    Aggregate {
        /// platform, sentiment, engagement, author or day
        #[arg(long)]
        by: GroupBy,
        /// count, total_likes, avg_likes or total_comments
        #[arg(long, default_value = "count")]
        metric: Metric,
    },
    /// Write a snapshot to disk
    Export {
        /// csv or columnar
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Destination; defaults to the configured export directory
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        platform: Option<Platform>,
    },
}

/// # Errors
///
/// Returns an error if the underlying query or export fails.
pub(crate) async fn run_posts(
    config: &AppConfig,
    query: &QueryFacade,
    command: PostsCommands,
) -> anyhow::Result<()> {
    match command {
        PostsCommands::List {
            platform,
            author,
            sentiment,
            limit,
            offset,
            order,
        } => {
            let filter = PostFilter {
                platform,
                author,
                sentiment,
                limit: Some(limit),
                offset,
                order,
            };
            let rows = query.get(&filter).await?;
            if rows.is_empty() {
                println!("no posts found; run `scrape` first");
                return Ok(());
            }
            print_posts(&rows);
        }
        PostsCommands::Search { text, limit } => {
            let rows = query.search(&text, limit).await?;
            if rows.is_empty() {
                println!("no posts mention '{text}'");
                return Ok(());
            }
            print_posts(&rows);
        }
        PostsCommands::Stats => run_stats(query).await?,
        PostsCommands::Aggregate { by, metric } => {
            let rows = query.aggregate(by, metric).await?;
            println!("{:<32}VALUE", "KEY");
            for row in &rows {
                println!("{:<32}{}", truncate(&row.key, 30), row.value);
            }
        }
        PostsCommands::Export {
            format,
            path,
            platform,
        } => {
            let path = path.unwrap_or_else(|| default_export_path(config, format));
            let filter = PostFilter {
                platform,
                ..PostFilter::default()
            };
            let rows = query.export(format, &filter, &path).await?;
            println!("exported {rows} post(s) to {}", path.display());
        }
    }
    Ok(())
}

async fn run_stats(query: &QueryFacade) -> anyhow::Result<()> {
    let stats = query.stats().await?;
    println!("total posts: {}", stats.total);
    if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
        println!(
            "posted between {} and {}",
            earliest.format("%Y-%m-%d %H:%M"),
            latest.format("%Y-%m-%d %H:%M")
        );
    }

    print_counts("PLATFORM", &stats.by_platform);
    print_counts("ENGAGEMENT", &stats.by_engagement);
    print_counts("AUTHOR", &stats.top_authors);
    print_counts("HASHTAG", &stats.top_hashtags);

    println!();
    println!("{:<12}{:<8}PERCENT", "SENTIMENT", "COUNT");
    for share in query.sentiment_distribution(None).await? {
        println!("{:<12}{:<8}{:.2}%", share.label, share.count, share.percent);
    }
    Ok(())
}

fn print_counts(heading: &str, rows: &[(String, i64)]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("{heading:<32}POSTS");
    for (key, n) in rows {
        println!("{:<32}{n}", truncate(key, 30));
    }
}

fn print_posts(rows: &[StoredPost]) {
    println!(
        "{:<7}{:<11}{:<20}{:<8}{:<10}TEXT",
        "ID", "PLATFORM", "AUTHOR", "LIKES", "SENTIMENT"
    );
    for row in rows {
        let post = &row.post;
        let likes = post.likes.map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:<7}{:<11}{:<20}{:<8}{:<10}{}",
            row.id,
            post.platform,
            truncate(&post.author, 18),
            likes,
            post.sentiment,
            truncate(&post.text, TEXT_WIDTH)
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        format!("{}...", text.chars().take(width).collect::<String>())
    } else {
        text.to_string()
    }
}

fn default_export_path(config: &AppConfig, format: ExportFormat) -> PathBuf {
    match format {
        ExportFormat::Csv => config.export_dir.join(&config.output_file),
        ExportFormat::Columnar => config.export_dir.join("posts.columnar.json"),
    }
}
