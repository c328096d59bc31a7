use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

/// Rotate log file if it exceeds the maximum size.
/// Keeps only the most recent KEEP_SIZE bytes.
fn rotate_log_if_needed(log_path: &Path) -> std::io::Result<()> {
    if !log_path.exists() {
        return Ok(());
    }

    let metadata = fs::metadata(log_path)?;
    if metadata.len() <= MAX_LOG_SIZE {
        return Ok(());
    }

    let mut file = File::open(log_path)?;
    let start_pos = metadata.len().saturating_sub(KEEP_SIZE);
    file.seek(SeekFrom::Start(start_pos))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    // Skip to the first newline to avoid partial lines
    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut file = File::create(log_path)?;
    file.write_all(b"--- Log rotated (older entries removed) ---\n")?;
    file.write_all(&buffer[skip..])?;

    Ok(())
}

/// Default filter for a given level: verbose for the binary, quiet for the engine
pub fn default_filter(level: &str) -> String {
    format!("gridstudy={level},gridstudy_core=warn")
}

/// Initialize logging to stderr, or to `log_file` when given.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `level`. File
/// output goes through a non-blocking writer; keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_logging(
    level: &str,
    log_file: Option<&Path>,
) -> color_eyre::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let Some(log_path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
        return Ok(None);
    };

    if let Some(dir) = log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    if let Err(e) = rotate_log_if_needed(log_path) {
        eprintln!("Warning: Failed to rotate log file: {e}");
    }
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false),
        )
        .init();

    tracing::info!(log_path = %log_path.display(), "Logging initialized");
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_engine() {
        assert_eq!(default_filter("debug"), "gridstudy=debug,gridstudy_core=warn");
    }

    #[test]
    fn test_rotation_keeps_recent_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridstudy.log");
        let line = "x".repeat(99) + "\n";
        let content = line.repeat((MAX_LOG_SIZE / 100 + 10) as usize);
        fs::write(&path, &content).unwrap();

        rotate_log_if_needed(&path).unwrap();
        let rotated = fs::read_to_string(&path).unwrap();
        assert!(rotated.starts_with("--- Log rotated"));
        assert!(rotated.len() as u64 <= KEEP_SIZE + 64);
        assert!(rotated.lines().skip(1).all(|l| l.len() == 99));
    }

    #[test]
    fn test_small_log_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridstudy.log");
        fs::write(&path, "one\ntwo\n").unwrap();
        rotate_log_if_needed(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
