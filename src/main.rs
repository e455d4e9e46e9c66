use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod extractor;
mod logs;
mod save;
mod ui;

use extractor::SizeClass;

#[cfg(windows)]
const DEFAULT_SOURCE: Option<&str> = Some("C:\\Windows\\System32\\imageres.dll");

#[cfg(not(windows))]
const DEFAULT_SOURCE: Option<&str> = None;

#[derive(Parser)]
#[command(
    name = "iconextract",
    about = "Browse and save the icons embedded in executables, DLLs and icon files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// File to extract icons from
    path: Option<PathBuf>,

    /// Extract 16x16 icons instead of 32x32
    #[arg(long)]
    small: bool,
}

#[derive(Subcommand)]
enum Commands {
    Logs {
        #[command(subcommand)]
        action: Option<logs::LogsAction>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logs::init_logger()?;

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Logs { action }) => logs::handle_logs_command(action),
        None => {
            let size = if cli.small {
                SizeClass::Small
            } else {
                SizeClass::Large
            };
            let source = cli.path.or_else(|| DEFAULT_SOURCE.map(PathBuf::from));

            logs::log_info(&format!(
                "Starting icon extractor ({:?}) on {}",
                size,
                source
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "no file".to_string())
            ));
            ui::run_ui(source, size)
        }
    }
}
