use anyhow::Context;
use clap::{Parser, Subcommand};
use posts_pipeline::app::{LoadSummary, LoadUseCase, ReportSummary, ReportUseCase};
use posts_pipeline::{logging, Config, MongoStore};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, instrument};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "posts_pipeline")]
#[command(about = "Loads popular questions into MongoDB and renders reports from them")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print stage summaries as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the posts dump and replace the collection contents
    Load {
        /// Posts XML file
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Query the collection and render both reports
    Report {
        /// Directory for informe1.pdf and informe2.pdf
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run load and then report
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    load: Option<LoadSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ReportSummary>,
}

/// Stage A with its own connection, released on both exit paths.
#[instrument(name = "load", skip(config), fields(run_id = %Uuid::new_v4()))]
async fn run_load(config: &Config) -> anyhow::Result<LoadSummary> {
    let store = MongoStore::connect(config).await.map_err(|e| {
        error!("Could not connect to the document store: {}", e);
        e
    })?;
    let outcome = LoadUseCase::new(&store).run(&config.input_path).await;
    store.close().await;
    outcome.map_err(|e| {
        error!("Load stage failed: {}", e);
        anyhow::Error::new(e)
    })
}

/// Stage B with its own connection, released on both exit paths.
#[instrument(name = "report", skip(config), fields(run_id = %Uuid::new_v4()))]
async fn run_report(config: &Config) -> anyhow::Result<ReportSummary> {
    let store = MongoStore::connect(config).await.map_err(|e| {
        error!("Could not connect to the document store: {}", e);
        e
    })?;
    let outcome = match ReportUseCase::with_default_keywords(&store) {
        Ok(use_case) => use_case.run(&config.output_dir).await,
        Err(e) => Err(e),
    };
    store.close().await;
    outcome.map_err(|e| {
        error!("Report stage failed: {}", e);
        anyhow::Error::new(e)
    })
}

fn print_load(summary: &LoadSummary) {
    println!("\n📊 Load results for {}:", summary.collection);
    println!("   Rows read: {}", summary.stats.rows_total);
    println!("   Below threshold: {}", summary.stats.rows_filtered);
    println!("   Documents inserted: {}", summary.inserted);
}

fn print_report(summary: &ReportSummary) {
    println!("\n📊 Report results:");
    println!("   Mean view count: {:.2}", summary.mean_view_count);
    println!("   Above mean: {}", summary.above_mean);
    println!("   Keyword matches: {}", summary.keyword_matches);
    for path in &summary.reports {
        println!("   Output file: {}", path.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = logging::init_logging(&config.log_dir);

    let mut summary = RunSummary {
        load: None,
        report: None,
    };

    match cli.command {
        Commands::Load { input } => {
            if let Some(input) = input {
                config.input_path = input;
            }
            println!("🔄 Running load stage...");
            summary.load = Some(run_load(&config).await?);
        }
        Commands::Report { output_dir } => {
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            println!("📝 Running report stage...");
            summary.report = Some(run_report(&config).await?);
        }
        Commands::Run { input, output_dir } => {
            if let Some(input) = input {
                config.input_path = input;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            println!("🚀 Running full pipeline (load + report)...");

            println!("\n📥 Step 1: Loading...");
            summary.load = Some(run_load(&config).await?);

            println!("\n📝 Step 2: Reporting...");
            summary.report = Some(run_report(&config).await?);
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        if let Some(load) = &summary.load {
            print_load(load);
        }
        if let Some(report) = &summary.report {
            print_report(report);
        }
    }

    info!("Process completed successfully");
    println!("✅ Done");
    Ok(())
}
