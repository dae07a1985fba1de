//! Command-line frontend for the auto-caption pipeline.

use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;
use walkdir::WalkDir;

use auto_caption::cli::{Args, Commands};
use auto_caption::config::Config;
use auto_caption::service::{CaptionRequest, CaptionService};
use auto_caption::task::{Task, TaskStatus};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _guard = setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Process {
            input,
            language,
            translate_to,
        } => {
            let service = CaptionService::new(&config)?;
            let task = process_file(&service, &input, &language, translate_to.as_deref()).await?;
            report_outcome(&input, &task)?;
        }
        Commands::Batch {
            input_dir,
            language,
            translate_to,
        } => {
            if !input_dir.is_dir() {
                bail!("Input path is not a directory: {}", input_dir.display());
            }

            let service = CaptionService::new(&config)?;
            let videos = find_video_files(&input_dir);
            info!("Found {} video files to process", videos.len());

            let mut failures = 0usize;
            for video in &videos {
                match process_file(&service, video, &language, translate_to.as_deref()).await {
                    Ok(task) => {
                        if let Err(e) = report_outcome(video, &task) {
                            warn!("Failed to process {}: {}", video.display(), e);
                            failures += 1;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to process {}: {}", video.display(), e);
                        failures += 1;
                    }
                }
            }

            if failures > 0 {
                bail!("{} of {} files failed", failures, videos.len());
            }
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<non_blocking::WorkerGuard> {
    let file_appender = rolling::daily("logs", "auto-caption.log");
    let (file_writer, guard) = non_blocking(file_appender);

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

/// Submit one job and poll the registry until it reaches a terminal state.
async fn process_file(
    service: &CaptionService,
    video: &Path,
    language: &str,
    translate_to: Option<&str>,
) -> Result<Task> {
    let ticket = service.submit(CaptionRequest {
        video_path: video.to_path_buf(),
        language: language.to_string(),
        translate_to: translate_to.map(str::to_string),
    })?;

    info!(
        "Submitted caption task {} for {}",
        ticket.task_id,
        video.display()
    );

    wait_for_task(service, ticket.task_id).await
}

async fn wait_for_task(service: &CaptionService, task_id: Uuid) -> Result<Task> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .expect("static template is valid"),
    );

    loop {
        let Some(task) = service.status(task_id) else {
            bar.finish_and_clear();
            bail!("task {} vanished from the registry", task_id);
        };

        bar.set_position((task.progress * 100.0) as u64);
        if let Some(stage) = task.stage {
            bar.set_message(format!("{:?}", stage));
        }

        if matches!(task.status, TaskStatus::Completed | TaskStatus::Failed) {
            bar.finish_and_clear();
            return Ok(task);
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

fn report_outcome(video: &Path, task: &Task) -> Result<()> {
    match task.status {
        TaskStatus::Completed => {
            let result = task
                .result
                .as_ref()
                .expect("completed task carries a result");
            println!(
                "{} -> {} ({} cues{}{})",
                video.display(),
                result.srt_path.display(),
                result.cue_count,
                if result.cached { ", cached" } else { "" },
                result
                    .translation_provider
                    .as_deref()
                    .map(|p| format!(", translated by {}", p))
                    .unwrap_or_default()
            );
            Ok(())
        }
        _ => {
            let message = task.error.as_deref().unwrap_or("unknown error");
            bail!("caption generation failed: {}", message)
        }
    }
}

fn find_video_files(input_dir: &Path) -> Vec<PathBuf> {
    let video_extensions = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];
    let mut video_files = Vec::new();

    for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
        if let Some(extension) = entry.path().extension() {
            if let Some(ext_str) = extension.to_str() {
                if video_extensions.contains(&ext_str.to_lowercase().as_str()) {
                    video_files.push(entry.path().to_path_buf());
                }
            }
        }
    }

    video_files
}
