use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::report;
use taxoclass_core::config;
use taxoclass_core::config::AppConfig;
use taxoclass_core::pipeline;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    debug!(
        "taxonomy {}, examples {}, provider {}",
        cfg.data.taxonomy_path, cfg.data.examples_path, cfg.embeddings.provider
    );

    match cli.command {
        Commands::Tree => run_tree(cfg),
        Commands::Eval {
            top_n,
            json,
            recompute,
            show_errors,
        } => run_eval(cfg, top_n, json, recompute, show_errors).await,
        Commands::Classify { text, top_n, json } => run_classify(cfg, text, top_n, json).await,
    }
}

#[derive(Parser)]
#[command(name = "taxoclass")]
#[command(about = "Embedding-based taxonomy classification and evaluation", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the taxonomy with per-class example counts [exact | related | unrelated]
    Tree,
    /// Score the classifier against the labeled examples
    Eval {
        /// Top-N values to score (comma-separated); overrides config
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        top_n: Vec<usize>,
        /// Output JSON
        #[arg(long)]
        json: bool,
        /// Recompute embeddings even if cached
        #[arg(long, default_value_t = false)]
        recompute: bool,
        /// List misclassified examples (non-JSON)
        #[arg(long, default_value_t = false)]
        show_errors: bool,
    },
    /// Rank taxonomy leaves for a single text
    Classify {
        /// Text to classify
        text: String,
        /// Number of leaves to show
        #[arg(short, long, default_value_t = 5)]
        top_n: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_tree(cfg: AppConfig) -> Result<()> {
    let (taxonomy, _) = pipeline::load_taxonomy(&cfg)?;
    print!("{}", taxonomy.render());
    Ok(())
}

async fn run_eval(
    mut cfg: AppConfig,
    top_n: Vec<usize>,
    json: bool,
    recompute: bool,
    show_errors: bool,
) -> Result<()> {
    if !top_n.is_empty() {
        cfg.evaluation.top_n = top_n;
    }
    cfg.embeddings.force_recompute |= recompute;

    let (summary, examples) = pipeline::run_evaluation(&cfg).await?;
    if json {
        println!("{}", report::evaluation_json(&summary, chrono::Utc::now())?);
    } else if show_errors {
        print!("{}", report::evaluation_text(&summary, Some(&examples)));
    } else {
        print!("{}", report::evaluation_text(&summary, None));
    }
    Ok(())
}

async fn run_classify(cfg: AppConfig, text: String, top_n: usize, json: bool) -> Result<()> {
    let predictions = pipeline::classify_query(&cfg, &text, top_n).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
    } else {
        print!("{}", report::predictions_text(&predictions));
    }
    Ok(())
}
