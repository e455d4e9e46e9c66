use clap::Subcommand;
use std::fs::{File, metadata};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

const APP_NAME: &str = "iconextract";
const SIZE_WARNING_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Subcommand)]
pub enum LogsAction {
    /// Show recent log entries
    Show {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Clear the log file
    Clear,
}

pub fn init_logger() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = get_log_file()?;

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(())
}

pub fn log_info(msg: &str) {
    write_log("INFO", msg);
}

pub fn log_error(msg: &str) {
    write_log("ERROR", msg);
}

fn write_log(level: &str, msg: &str) {
    let log_file = match get_log_file() {
        Ok(path) => path,
        Err(_) => return,
    };

    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let _ = append(&log_file, &format_entry(&timestamp.to_string(), level, msg));

    // Warn only, never rotate
    if let Ok(size) = metadata(&log_file).map(|m| m.len()) {
        if size > SIZE_WARNING_BYTES {
            let warning = format_entry(
                &timestamp.to_string(),
                "WARN",
                &format!(
                    "Log file is {:.1} MiB. Consider running '{} logs clear'",
                    size as f64 / 1_048_576.0,
                    APP_NAME
                ),
            );
            let _ = append(&log_file, &warning);
        }
    }
}

fn format_entry(timestamp: &str, level: &str, msg: &str) -> String {
    format!("[{}] {}: {}\n", timestamp, level, msg)
}

fn append(log_file: &PathBuf, entry: &str) -> std::io::Result<()> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .and_then(|mut file| file.write_all(entry.as_bytes()))
}

pub fn handle_logs_command(action: Option<LogsAction>) -> Result<(), Box<dyn std::error::Error>> {
    match action.unwrap_or(LogsAction::Show { lines: 50 }) {
        LogsAction::Show { lines } => show_logs(lines),
        LogsAction::Clear => clear_logs(),
    }
}

fn show_logs(lines: usize) -> Result<(), Box<dyn std::error::Error>> {
    let log_file = get_log_file()?;

    if !log_file.exists() {
        println!("No log file found");
        return Ok(());
    }

    let size = metadata(&log_file)?.len();
    if size > SIZE_WARNING_BYTES {
        eprintln!(
            "Warning: Log file is {:.1} MiB. Consider clearing it.",
            size as f64 / 1_048_576.0
        );
    }

    let reader = BufReader::new(File::open(&log_file)?);
    let all_lines: Vec<String> = reader.lines().collect::<Result<Vec<_>, _>>()?;

    for line in tail(&all_lines, lines) {
        println!("{}", line);
    }

    Ok(())
}

fn tail(lines: &[String], count: usize) -> &[String] {
    &lines[lines.len().saturating_sub(count)..]
}

fn clear_logs() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = get_log_file()?;

    if log_file.exists() {
        std::fs::write(&log_file, "")?;
        println!("Log file cleared");
    } else {
        println!("No log file to clear");
    }

    Ok(())
}

#[cfg(test)]
fn get_log_file() -> Result<PathBuf, Box<dyn std::error::Error>> {
    static TEST_LOG_DIR: std::sync::OnceLock<tempfile::TempDir> = std::sync::OnceLock::new();

    let dir = TEST_LOG_DIR.get_or_init(|| {
        tempfile::tempdir().unwrap_or_else(|e| panic!("test log dir: {}", e))
    });
    Ok(dir.path().join(APP_NAME).join(format!("{}.log", APP_NAME)))
}

#[cfg(not(test))]
fn get_log_file() -> Result<PathBuf, Box<dyn std::error::Error>> {
    #[cfg(target_os = "windows")]
    let base = PathBuf::from(std::env::var("APPDATA")?);

    #[cfg(target_os = "macos")]
    let base = PathBuf::from(format!("{}/Library/Logs", std::env::var("HOME")?));

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let base = dirs::data_dir().ok_or("no data directory for this user")?;

    Ok(base.join(APP_NAME).join(format!("{}.log", APP_NAME)))
}
