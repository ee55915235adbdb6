use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use topichub_core::config::{expand_path, Settings};
use topichub_core::data_processor::TextLoader;
use topichub_core::types::{ClusteringConfig, JobStatus};
use topichub_session::{StatusPoller, StatusSource};

#[derive(Debug, Parser)]
#[command(name = "topichub", version, about = "Cluster a batch of texts into topics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cluster the texts in a file or directory and print the result as JSON
    Run {
        /// Text file (one text per line), JSON array file, or directory of .txt files
        input: String,

        #[arg(long, default_value = "medium")]
        granularity: String,

        /// hdbscan marks small groups as noise; kmeans keeps every group
        #[arg(long, default_value = "hdbscan")]
        algorithm: String,

        #[arg(long)]
        num_clusters: Option<usize>,

        #[arg(long, default_value_t = 5)]
        min_cluster_size: usize,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<String>,
    },
    /// Print the effective settings
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    topichub_cli::init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load().map_err(|e| {
        eprintln!("Error loading settings: {e}");
        e
    })?;

    match cli.command {
        Command::Config => println!("{}", serde_json::to_string_pretty(&settings)?),
        Command::Run { input, granularity, algorithm, num_clusters, min_cluster_size, output } => {
            let config = ClusteringConfig { granularity, algorithm, num_clusters, min_cluster_size, ..Default::default() };
            run(settings, expand_path(input), config, output.map(expand_path)).await?;
        }
    }
    Ok(())
}

async fn run(settings: Settings, input: PathBuf, config: ClusteringConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let texts = TextLoader::new().load(&input).with_context(|| format!("reading {}", input.display()))?;
    eprintln!("Loaded {} texts from {}", texts.len(), input.display());

    let poll_every = Duration::from_millis(settings.poll.interval_ms);
    let service = topichub_cli::build_service(settings);
    let job = service.submit(texts, config).await?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    let source: Arc<dyn StatusSource> = Arc::new(service.tracker().clone());
    let (handle, mut updates) = StatusPoller::spawn(source, job.job_id.clone(), poll_every);
    let mut last = job;
    while let Some(session) = updates.recv().await {
        pb.set_position(session.progress.floor() as u64);
        pb.set_message(session.current_step.clone());
        last = session;
    }
    handle.join().await;

    match last.status {
        JobStatus::Completed => {
            pb.finish_with_message("Done");
            let result = last.result.context("completed job has no result")?;
            let json = serde_json::to_string_pretty(result.as_ref())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("{} topics, {} noise -> {}", result.topics.len(), result.noise, path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        status => {
            pb.abandon_with_message(status.step_description());
            bail!("job {} ended as {status}: {}", last.job_id, last.error.unwrap_or_default())
        }
    }
}
