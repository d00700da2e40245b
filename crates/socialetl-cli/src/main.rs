mod posts;
mod scrape;

use clap::{Parser, Subcommand};
use socialetl_db::{PoolConfig, Store};
use tracing_subscriber::EnvFilter;

use crate::posts::PostsCommands;
use crate::scrape::ScrapeArgs;

#[derive(Debug, Parser)]
#[command(name = "socialetl")]
#[command(about = "Collect social media posts into a queryable SQLite store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one extract, transform and load pass against a platform
    Scrape(ScrapeArgs),
    /// Query and export stored posts
    Posts {
        #[command(subcommand)]
        command: PostsCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check that the database is reachable
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = socialetl_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        println!("socialetl ready; see --help for commands");
        return Ok(());
    };

    let pool = socialetl_db::connect(&config.database_url, PoolConfig::from_app_config(&config))
        .await?;

    match command {
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = socialetl_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            socialetl_db::ping(&pool).await?;
            println!("database reachable at {}", config.database_url);
        }
        Commands::Scrape(args) => {
            socialetl_db::run_migrations(&pool).await?;
            scrape::run_scrape(&config, Store::new(pool.clone()), &args).await?;
        }
        Commands::Posts { command } => {
            socialetl_db::run_migrations(&pool).await?;
            posts::run_posts(&config, &Store::new(pool.clone()).query(), command).await?;
        }
    }

    pool.close().await;
    Ok(())
}
