use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const LOG_FILE: &str = "notekeeper.log";

/// Routes the `log` macros into `<data dir>/logs/notekeeper.log`.
///
/// The terminal belongs to the UI, so nothing is written to stderr.
pub fn init(data_dir: &Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_path = log_dir.join(LOG_FILE);

    // Keep one previous run around as notekeeper.log.old
    if log_path.exists() {
        let old_path = log_dir.join(format!("{}.old", LOG_FILE));
        if old_path.exists() {
            let _ = fs::remove_file(&old_path);
        }
        let _ = fs::rename(&log_path, old_path);
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);

    #[cfg(unix)]
    {
        options.mode(0o600);
    }

    let file = options.open(&log_path).context("Failed to open log file")?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .context("Logger already initialized")?;

    log::info!("Logger initialized at {:?}", log_path);
    Ok(())
}
