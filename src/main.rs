use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use clap::Parser;

use floxels::game::{GamePlugin, RunLimit};

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn setup_file_logging() -> String {
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir).expect("Failed to create logs directory");
    }

    // Keep only the last 25 runs
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("floxels_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);

    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bevy_ecs=info,bevy_asset=warn,floxels=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("floxels") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

/// Headless floxel simulation.
#[derive(Parser, Debug)]
#[command(name = "floxels", version, about)]
struct Args {
    /// Stop after this many simulation ticks.
    #[arg(long)]
    ticks: Option<u64>,
    /// Write the final maze snapshot here when stopping.
    #[arg(long)]
    snapshot: Option<String>,
}

impl From<Args> for RunLimit {
    fn from(args: Args) -> Self {
        RunLimit {
            max_ticks: args.ticks,
            snapshot_path: args.snapshot,
        }
    }
}

fn main() {
    let args = Args::parse();
    let log_file = setup_file_logging();
    println!("Floxels - logging to {}", log_file);

    let limit = RunLimit::from(args);
    if let Some(ticks) = limit.max_ticks {
        info!("[MAIN] Running for {} ticks", ticks);
    }

    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 120.0))),
        )
        .add_plugins(AssetPlugin::default())
        .insert_resource(limit)
        .add_plugins(GamePlugin)
        .run();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_into_run_limit() {
        let args = Args::try_parse_from(["floxels", "--ticks", "300", "--snapshot", "out/maze.bin"]).expect("valid args");
        let limit = RunLimit::from(args);
        assert_eq!(limit.max_ticks, Some(300));
        assert_eq!(limit.snapshot_path.as_deref(), Some("out/maze.bin"));
    }

    #[test]
    fn test_no_args_run_forever() {
        let limit = RunLimit::from(Args::try_parse_from(["floxels"]).expect("valid args"));
        assert_eq!(limit.max_ticks, None);
        assert_eq!(limit.snapshot_path, None);
    }

    #[test]
    fn test_non_numeric_ticks_rejected() {
        assert!(Args::try_parse_from(["floxels", "--ticks", "soon"]).is_err());
    }
}
