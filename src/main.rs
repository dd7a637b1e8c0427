mod blacklist;
mod executor;
mod extract;
mod geo;
mod reconcile;
mod record;
mod report;
mod runlog;
mod runner;
mod tasks;
mod validate;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::geo::analyze::analyze_directory;
use crate::geo::index::ZipIndex;
use crate::report::StatusReport;
use crate::runlog::LogSource;
use crate::runner::{Paths, RunnerOpts, MAX_RETRIES};

#[derive(Parser)]
#[command(name = "zaba_batch", about = "Batch people-search runner and county filter")]
struct Cli {
    /// Root directory for results, logs, blacklist and status files
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the batch: query pending tasks, reconcile, write the report
    Run {
        /// Task list file (tab- or comma-delimited)
        input: PathBuf,
        /// Max tasks to attempt per pass (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Batch retry passes, and per-name attempt bound
        #[arg(long, default_value_t = MAX_RETRIES)]
        max_retries: usize,
    },
    /// Reconcile status from logs without running any queries
    Status {
        /// Task list file (tab- or comma-delimited)
        input: PathBuf,
        /// Reconcile a single run log instead of every log under the data dir
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Parse stored results and filter them by county
    Analyze {
        /// Target county; omit to report every resolvable record
        #[arg(short, long)]
        county: Option<String>,
        /// Tab-delimited zip/city/county/type reference table
        #[arg(long, default_value = "zip-database/zip-codes.txt")]
        zip_db: PathBuf,
    },
    /// List counties in the reference table with their ZIP counts
    Counties {
        /// Tab-delimited zip/city/county/type reference table
        #[arg(long, default_value = "zip-database/zip-codes.txt")]
        zip_db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)?;
    let paths = Paths::under(&cli.data_dir);

    let result = match cli.command {
        Commands::Run {
            input,
            limit,
            max_retries,
        } => {
            let tasks = tasks::load_tasks(&input)?;
            if tasks.is_empty() {
                println!("No tasks found in {}", input.display());
                return Ok(());
            }
            println!("Loaded {} tasks from {}", tasks.len(), input.display());
            let opts = RunnerOpts {
                max_retries,
                limit,
                ..Default::default()
            };
            let summary =
                runner::run_batch(&tasks, executor::HttpExecutor::new, &paths, &opts).await?;
            println!("Finished after {} pass(es).", summary.passes);
            print_report(&summary.report);
            Ok(())
        }
        Commands::Status { input, log_file } => {
            let tasks = tasks::load_tasks(&input)?;
            let source = match log_file {
                Some(path) => LogSource::File(path),
                None => LogSource::AllRuns(paths.logs_dir.clone()),
            };
            let lines = source.lines();
            let status = reconcile::reconcile(&tasks, &lines);
            report::write_report(&status, &paths.status_file)?;
            print_report(&status);
            println!("\nReport written to {}", paths.status_file.display());
            Ok(())
        }
        Commands::Analyze { county, zip_db } => {
            let index = ZipIndex::load(&zip_db)?;
            println!("Loaded {} ZIP entries from {}", index.len(), zip_db.display());
            if let Some(county) = &county {
                println!("Filtering results for {} County", county);
            }
            let output_dir = cli.data_dir.join("filtered_results");
            let (path, total) = analyze_directory(
                &paths.results_dir,
                &output_dir,
                &index,
                county.as_deref(),
            )?;
            println!("Found {} total matches.", total);
            println!("Results saved to {}", path.display());
            Ok(())
        }
        Commands::Counties { zip_db } => {
            let index = ZipIndex::load(&zip_db)?;
            for (county, count) in index.county_counts() {
                println!("{:>5}  {}", count, county);
            }
            println!("\n{} counties", index.county_counts().len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_report(report: &StatusReport) {
    println!("Completed:   {}", report.completed.len());
    println!("Failed:      {}", report.failed.len());
    println!("Blacklisted: {}", report.blacklisted.len());
    println!("Pending:     {}", report.pending.len());
    if !report.errors.is_empty() {
        println!("Errors:      {}", report.errors.len());
    }
    for name in &report.pending {
        println!("  pending: {}", name);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
