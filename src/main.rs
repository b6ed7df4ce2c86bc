//! CLI entry point for kitmatch.
//!
//! Provides commands for building the catalog index and querying it for
//! recommendations. Main components: Cli parser, Commands enum, and one
//! handler per command.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use kitmatch::display::{
    create_info_table, create_progress_bar, create_recommendation_table, with_spinner,
};
use kitmatch::indexing::IndexBuildPipeline;
use kitmatch::recommend::{Recommendation, RecommendationService, UserProfile};
use kitmatch::vector::{TextEmbedder, VectorDimension, VectorIndex};
use kitmatch::{Catalog, IndexError, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Sports equipment recommendations by semantic similarity
#[derive(Parser)]
#[command(
    name = "kitmatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Recommend catalog items by semantic similarity",
    long_about = "Build a vector index over a product catalog and query it with free text or a user profile.",
    next_line_help = true,
    styles = clap_cargo_style(),
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .kitmatch directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build the index from a catalog
    #[command(
        about = "Embed a JSON catalog and build the vector index",
        after_help = "Examples:\n  kitmatch build --catalog data/products.json\n  KM_INDEX__BACKEND=dense kitmatch build --catalog products.json"
    )]
    Build {
        /// JSON array of catalog items (defaults to catalog.path)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Free-text search
    #[command(
        about = "Find the catalog items closest to a text",
        after_help = "Examples:\n  kitmatch search \"lightweight running shoe\"\n  kitmatch search \"yoga mat\" -k 10 --json | jq '.[].id'"
    )]
    Search {
        /// Query text
        text: String,

        /// Number of results (defaults to search.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Profile-based recommendations
    #[command(
        about = "Recommend items for a user profile",
        after_help = "Examples:\n  kitmatch recommend --sport Running --level Beginner --goal \"Lose weight\" --budget Medium\n  kitmatch recommend --sport Fitness --level Advanced --back-pain Occasional --json"
    )]
    Recommend {
        #[arg(long)]
        sport: String,

        #[arg(long)]
        level: String,

        /// Training goal (repeatable)
        #[arg(long = "goal")]
        goals: Vec<String>,

        #[arg(long, default_value = "")]
        budget: String,

        #[arg(long)]
        back_pain: Option<String>,

        /// Medical condition to take into account
        #[arg(long)]
        condition: Option<String>,

        /// Number of results (defaults to search.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display the effective settings after all layers are applied")]
    Config,

    /// Show index metadata
    #[command(about = "Display facts about the built index")]
    Info {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {e}",
                path.display()
            );
            std::process::exit(1);
        }),
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };

    init_logging(cli.debug || settings.debug);

    if let Err(e) = run(cli.command, settings) {
        eprintln!("Error: {e:#}");
        if let Some(index_error) = e.downcast_ref::<IndexError>() {
            for suggestion in index_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

/// Install the stderr log subscriber; `KITMATCH_LOG` names the level.
fn init_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        std::env::var("KITMATCH_LOG")
            .ok()
            .and_then(|value| tracing::Level::from_str(&value).ok())
            .unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands, settings: Settings) -> anyhow::Result<()> {
    match command {
        Commands::Init { force } => {
            let dir = std::env::current_dir().context("Cannot determine current directory")?;
            let path = Settings::init_config_file(&dir, force)?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }

        Commands::Config => {
            println!("{}", settings.to_toml()?);
        }

        Commands::Build { catalog } => {
            let Some(catalog_path) = catalog.or_else(|| settings.catalog.path.clone()) else {
                bail!("No catalog given. Pass --catalog <file> or set catalog.path");
            };
            build(&settings, catalog_path)?;
        }

        Commands::Search { text, k, json } => {
            let service = load_service(&settings)?;
            warn_if_unbuilt(&service);
            let k = k.unwrap_or(service.default_k());
            let recommendations = service.try_recommend_text(&text, k)?;
            print_recommendations(&recommendations, json)?;
        }

        Commands::Recommend {
            sport,
            level,
            goals,
            budget,
            back_pain,
            condition,
            k,
            json,
        } => {
            let profile = UserProfile {
                sport,
                level,
                goals,
                budget,
                back_pain,
                medical_conditions: condition,
                ..UserProfile::default()
            };
            let service = load_service(&settings)?;
            warn_if_unbuilt(&service);
            let k = k.unwrap_or(service.default_k());
            print_recommendations(&service.recommend(&profile, k), json)?;
        }

        Commands::Info { json } => {
            let mut index = VectorIndex::from_config(&settings.index).map_err(IndexError::from)?;
            index.load().map_err(IndexError::from)?;
            let Some(info) = index.info() else {
                bail!("Index at {} is not populated", settings.index.path.display());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}", create_info_table(&info));
            }
        }
    }
    Ok(())
}

fn build(settings: &Settings, catalog_path: PathBuf) -> anyhow::Result<()> {
    let catalog = Catalog::from_json_file(&catalog_path)?;
    let dimension = VectorDimension::new(settings.index.dimension).map_err(IndexError::from)?;
    let embedder = with_spinner("Loading embedder", || {
        TextEmbedder::from_config(&settings.embedding, dimension)
    })
    .map_err(IndexError::from)?;
    let mut index = VectorIndex::from_config(&settings.index).map_err(IndexError::from)?;

    let progress = create_progress_bar(catalog.len() as u64, "Embedding catalog");
    let stats = IndexBuildPipeline::new(&embedder)
        .with_batch_size(settings.embedding.batch_size)
        .with_progress(|done, _total| progress.set_position(done as u64))
        .run(catalog, &mut index)?;
    progress.finish_with_message("Embedded");

    stats.display();
    if let Some(info) = index.info() {
        println!("\n{}", create_info_table(&info));
    }
    Ok(())
}

fn load_service(settings: &Settings) -> anyhow::Result<RecommendationService> {
    Ok(with_spinner("Loading embedder and index", || {
        RecommendationService::new(settings)
    })?)
}

fn warn_if_unbuilt(service: &RecommendationService) {
    if service.index_info().is_none() {
        eprintln!("Warning: no index loaded; run 'kitmatch build --catalog <file>' first.");
    }
}

fn print_recommendations(recommendations: &[Recommendation], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(recommendations)?);
    } else if recommendations.is_empty() {
        println!("No recommendations found.");
    } else {
        println!("{}", create_recommendation_table(recommendations));
    }
    Ok(())
}
