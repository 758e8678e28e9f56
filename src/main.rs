use anyhow::Result;
use clap::{Parser, Subcommand};
use ocean_query::config::Config;
use ocean_query::logging;
use ocean_query::resources::Resources;
use ocean_query::retrieval::{build_index, embedder, IdMap, Metric};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ocean-query")]
#[command(about = "Natural-language questions over Argo float data")]
struct Args {
    /// DuckDB database file (overrides OCEAN_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Vector index file (overrides OCEAN_INDEX_PATH)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Id map file (overrides OCEAN_ID_MAP_PATH)
    #[arg(long, global = true)]
    id_map: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question and print the result
    Ask {
        query: String,

        /// Number of snippets to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the retrieved context block
        #[arg(long)]
        debug: bool,
    },
    /// Embed every id-map entry and write the vector index
    BuildIndex {
        /// Use inner product instead of L2 distance
        #[arg(long)]
        inner_product: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing(&args.log_level)?;

    let mut config = Config::from_env()?;
    if let Some(db) = args.db {
        config.data.db_path = db;
    }
    if let Some(index) = args.index {
        config.data.index_path = index;
    }
    if let Some(id_map) = args.id_map {
        config.data.id_map_path = id_map;
    }

    match args.command {
        Command::Ask { query, k, debug } => ask(&config, &query, k, debug).await,
        Command::BuildIndex { inner_product } => {
            let metric = if inner_product { Metric::InnerProduct } else { Metric::L2 };
            build(&config, metric).await
        }
    }
}

async fn ask(config: &Config, query: &str, k: Option<usize>, debug: bool) -> Result<()> {
    let resources = Resources::init(config).await?;
    let pipeline = resources.pipeline();
    let output = pipeline
        .run_with_k(query, k.unwrap_or_else(|| pipeline.top_k()))
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            resources.close();
            return Err(e.into());
        }
    };

    if debug {
        println!("=== Retrieved context ===");
        println!("{}", output.context_text);
        println!();
    }
    if let Some(sql) = &output.sql {
        println!("=== SQL ===");
        println!("{}", sql);
        println!();
    }
    if let Some(reason) = &output.execution_error {
        println!("=== Execution failed ===");
        println!("{}", reason);
        println!();
    }
    if let Some(table) = output.table.as_ref().filter(|t| !t.is_empty()) {
        println!("=== Result ({} rows) ===", table.height());
        println!("{}", table.to_text());
        println!();
    }
    println!("=== Answer ===");
    println!("{}", output.summary);
    if output.charts.is_some() {
        println!();
        println!("(line and step charts generated; use the HTTP API to view them)");
    }

    resources.close();
    Ok(())
}

async fn build(config: &Config, metric: Metric) -> Result<()> {
    let id_map = IdMap::load(&config.data.id_map_path)?;
    let embedder = embedder::from_settings(&config.embedding)?;
    info!(
        "Embedding {} entries with the {:?} embedder ({} dims)",
        id_map.len(),
        config.embedding.provider,
        embedder.dimension()
    );

    let index = build_index(embedder.as_ref(), &id_map, metric).await?;
    if let Some(parent) = config.data.index_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    index.save(&config.data.index_path)?;
    info!(
        "Wrote {} vectors to {}",
        index.len(),
        config.data.index_path.display()
    );
    Ok(())
}
