//! `midstac` command line front end.
//!
//! All tracing output goes to stderr so that stdout stays clean for JSON.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use midstac::{MidstacConfig, render};
use midstac_search::{SpatiotemporalExtractor, SystemClock};

#[derive(Parser)]
#[command(name = "midstac")]
#[command(about = "Natural-language search across Earth-observation catalogs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/midstac/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every configured catalog for a free-text request
    Search(SearchArgs),

    /// Print the parameters extracted from a request as JSON
    Extract(ExtractArgs),

    /// List the configured catalog backends
    Backends,

    /// Write the default configuration file
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Request text, e.g. "Landsat over California from 2020 to 2021"
    text: String,

    /// Maximum records per source (overrides any limit in the text)
    #[arg(long)]
    limit: Option<usize>,

    /// Print JSON instead of a markdown table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExtractArgs {
    /// Request text
    text: String,
}

#[derive(Args)]
struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(MidstacConfig::default_config_path);
    let config = MidstacConfig::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    match cli.command {
        Commands::Search(args) => {
            let set = midstac::search(&config, &args.text, args.limit).await?;
            if args.json {
                println!("{}", render::to_json(&set)?);
            } else {
                print!("{}", render::to_markdown(&set));
            }
        }
        Commands::Extract(args) => {
            config.extractor.validate()?;
            let params = SpatiotemporalExtractor::new(&config.extractor)
                .extract(&args.text, &SystemClock)?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
        Commands::Backends => {
            config.dispatch.validate()?;
            for backend in &config.dispatch.backends {
                println!("{}\t{}\t{}", backend.name(), backend.source(), backend.base_url());
            }
        }
        Commands::InitConfig(args) => {
            if path.exists() && !args.force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            MidstacConfig::default().save_to_file(&path)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
