//! pe-crawler - Product search scraper for Peruvian e-commerce sites
//!
//! Scrapes Falabella and MercadoLibre search results with TLS fingerprint
//! emulation and browser-like pacing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pe_crawler::commands::SearchCommand;
use pe_crawler::config::{Config, OutputFormat};
use pe_crawler::format::Formatter;
use pe_crawler::market::sites::Site;
use pe_crawler::protocol::JobKey;
use pe_crawler::store::{self, FileStore, KeyValueStore, MemoryStore};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pe-crawler",
    version,
    about = "Product search scraper for Peruvian e-commerce sites",
    long_about = "Scrapes Falabella and MercadoLibre search results with TLS fingerprint emulation for reliable extraction."
)]
struct Cli {
    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "PE_PROXY")]
    proxy: Option<String>,

    /// Delay between requests in milliseconds
    #[arg(long, default_value = "2000", global = true, env = "PE_DELAY")]
    delay: u64,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Skip the on-disk store for this run
    #[arg(long, global = true)]
    no_store: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape search results for a keyword
    #[command(alias = "s")]
    Search {
        /// Search keyword
        keyword: String,

        /// Site to scrape
        #[arg(short, long, default_value = "falabella")]
        site: Site,
    },

    /// Show stored results from an earlier scrape
    #[command(alias = "r")]
    Results {
        /// Search keyword
        keyword: String,

        /// Site the results came from
        #[arg(short, long, default_value = "falabella")]
        site: Site,
    },

    /// List supported sites
    Sites,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    config.format = cli.format;
    config.delay_ms = cli.delay;

    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    let store: Box<dyn KeyValueStore> = if cli.no_store {
        Box::new(MemoryStore::new())
    } else {
        Box::new(FileStore::open(FileStore::default_path()?)?)
    };

    match cli.command {
        Commands::Search { keyword, site } => {
            let cmd = SearchCommand::new(config);
            let output = cmd.execute(&keyword, site, store.as_ref()).await?;
            println!("{}", output);
        }

        Commands::Results { keyword, site } => {
            let key = JobKey::new(keyword, site);
            match store::load_result(store.as_ref(), &key)? {
                Some(records) => {
                    let formatter = Formatter::new(config.format);
                    println!("{}", formatter.format_records(&records));
                }
                None => println!("No stored results for {}.", key),
            }
        }

        Commands::Sites => {
            println!("Supported sites:\n");
            println!("{:<14} {:<42} {:<10}", "Name", "Origin", "Max pages");
            println!("{:-<14} {:-<42} {:-<10}", "", "", "");

            for site in Site::all() {
                println!(
                    "{:<14} {:<42} {:<10}",
                    site.to_string(),
                    site.origin(),
                    site.max_pages()
                );
            }
        }
    }

    Ok(())
}
