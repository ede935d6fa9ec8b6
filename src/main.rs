use anyhow::{Context, Result};
use batchmark::batch::{BatchPipeline, BatchStats, DirectoryWriter, ImageSource, SpecEditor};
use batchmark::codec::{mime_for_path, OutputFormat};
use batchmark::config::Config;
use batchmark::handles::HandleRegistry;
use batchmark::watermark::{FontRegistry, PositionTag, Positions, WatermarkRenderer};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Batchmark - stamp a text watermark onto a batch of images
#[derive(Parser, Debug)]
#[command(name = "batchmark")]
#[command(version, about, long_about = None)]
struct Args {
    /// Image files or directories of images
    #[arg(required_unless_present = "check")]
    inputs: Vec<PathBuf>,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory that receives the watermarked images
    #[arg(short, long, default_value = "watermarked")]
    output_dir: PathBuf,

    /// Watermark text (overrides watermark.text)
    #[arg(short, long)]
    text: Option<String>,

    /// Positions, comma separated or repeated (overrides watermark.positions)
    #[arg(short, long, value_delimiter = ',')]
    position: Vec<PositionTag>,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Validate configuration and exit
    #[arg(long)]
    check: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    stats: BatchStats,
    elapsed_ms: u64,
    tasks: &'a [batchmark::batch::TaskSummary],
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = batchmark::logging::init_subscriber(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if args.check {
        println!("Configuration OK");
        return ExitCode::SUCCESS;
    }

    match run(&args, config).await {
        Ok(stats) if stats.has_failures() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "batch aborted");
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(text) = &args.text {
        config.watermark.text = text.clone();
    }
    if !args.position.is_empty() {
        config.watermark.positions =
            Positions::new(args.position.iter().copied()).context("invalid --position")?;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: &Args, config: Config) -> Result<BatchStats> {
    let fonts = FontRegistry::from_config(&config.fonts).context("loading fonts")?;
    if fonts.is_empty() {
        tracing::warn!("no fonts available; images with watermark text will fail to render");
    }

    let renderer = Arc::new(WatermarkRenderer::from_config(&config.render, fonts));
    let editor = SpecEditor::new(config.watermark.clone()).context("invalid watermark")?;
    let writer = Arc::new(DirectoryWriter::new(&args.output_dir));

    let mut pipeline = BatchPipeline::new(
        renderer,
        HandleRegistry::new(),
        editor.subscribe(),
        config.pipeline.clone(),
    )
    .with_writer(writer);

    let sources = collect_sources(&args.inputs).await?;
    let queued = pipeline.enqueue(sources);
    tracing::info!(
        queued = queued.len(),
        output_dir = %args.output_dir.display(),
        text = %config.watermark.text,
        "inputs queued"
    );

    let mut progress = pipeline.subscribe();
    let progress_logger = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let stats = progress.borrow_and_update().stats;
            tracing::debug!(
                completed = stats.completed,
                failed = stats.failed,
                total = stats.total,
                percent = stats.progress_percent(),
                "progress"
            );
        }
    });

    let report = pipeline.run().await;
    let tasks = pipeline.tasks();

    if args.json {
        let json = JsonReport {
            stats: report.stats,
            elapsed_ms: report.elapsed.as_millis() as u64,
            tasks: &tasks,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for task in &tasks {
            match (&task.error, &task.write_error) {
                (Some(error), _) => println!("{:>10}  {}  ({})", task.status.as_str(), task.name, error),
                (None, Some(error)) => {
                    println!("{:>10}  {}  (not written: {})", task.status.as_str(), task.name, error)
                }
                (None, None) => println!("{:>10}  {}", task.status.as_str(), task.name),
            }
        }
        println!(
            "{} of {} completed, {} failed in {:.2}s",
            report.stats.completed,
            report.stats.total,
            report.stats.failed,
            report.elapsed.as_secs_f64()
        );
    }

    drop(pipeline);
    let _ = progress_logger.await;
    Ok(report.stats)
}

/// Expand inputs into image sources. Directories contribute their files
/// (not recursively) in name order.
async fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<ImageSource>> {
    let mut files = Vec::new();
    for input in inputs {
        let metadata = tokio::fs::metadata(input)
            .await
            .with_context(|| format!("reading {}", input.display()))?;

        if metadata.is_dir() {
            let mut entries = tokio::fs::read_dir(input)
                .await
                .with_context(|| format!("listing {}", input.display()))?;
            let mut found = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    found.push(entry.path());
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let mime_type = mime_type_for(&path, &bytes);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sources.push(ImageSource::new(name, bytes, mime_type));
    }
    Ok(sources)
}

fn mime_type_for(path: &Path, bytes: &[u8]) -> String {
    mime_for_path(path)
        .or_else(|| OutputFormat::detect(bytes).map(|format| format.content_type()))
        .unwrap_or("application/octet-stream")
        .to_string()
}
