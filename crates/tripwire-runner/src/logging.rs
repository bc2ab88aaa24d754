use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log files above this size are started over
const MAX_LOG_SIZE: u64 = 1024 * 1024;

/// Install the global subscriber.
///
/// Console output is always on; `default_level` applies when `RUST_LOG` is
/// unset. With `log_file` every event also goes to that file, without ANSI
/// colours. Keep the returned guard alive until the run ends.
pub fn init_logging(
    default_level: &str,
    log_file: Option<&Path>,
) -> io::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let Some(path) = log_file else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return Ok(None);
    };

    let (writer, guard) = tracing_appender::non_blocking(BufWriter::new(open_log_file(path)?));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stdout))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    tracing::info!("Logging to {}", path.display());
    Ok(Some(guard))
}

/// Open a scenario log for appending, creating its directory and starting
/// over once the file grew past `MAX_LOG_SIZE`
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let oversized = fs::metadata(path).map_or(false, |meta| meta.len() > MAX_LOG_SIZE);
    OpenOptions::new()
        .create(true)
        .append(!oversized)
        .write(true)
        .truncate(oversized)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_creates_missing_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("region-tour.log");

        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_appends_to_small_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.log");
        fs::write(&path, b"line\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        file.write_all(b"next\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "line\nnext\n");
    }

    #[test]
    fn test_starts_over_when_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        fs::write(&path, vec![b'x'; (MAX_LOG_SIZE + 1) as usize]).unwrap();

        let mut file = open_log_file(&path).unwrap();
        file.write_all(b"fresh\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }
}
