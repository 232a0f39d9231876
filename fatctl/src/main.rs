use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};

mod settings;
mod tasks;
mod utils;

use settings::{Settings, CONFIG_FILE};
use utils::CtlResult;

#[macro_use]
extern crate log;

/// Inspect and modify fat83 disk images.
#[derive(Debug, Parser)]
#[command(name = "fatctl", version)]
pub struct Cli {
    /// Settings file.
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Image file, overriding the settings.
    #[arg(long, short)]
    image: Option<PathBuf>,
    /// Log filter, overriding the settings.
    #[arg(long)]
    log: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a zeroed image, replacing any existing one.
    Format {
        /// Image size in bytes.
        #[arg(long)]
        size: Option<u64>,
    },
    /// Create a directory under the root.
    Mkdir { path: String },
    /// Create an empty file.
    #[command(alias = "touch")]
    Mknod { path: String },
    /// List a directory.
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show the attributes of a path.
    Stat { path: String },
    /// Print file contents to stdout.
    Cat {
        path: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        length: Option<usize>,
    },
    /// Write DATA, or stdin if absent, into a file.
    Write {
        path: String,
        data: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Write at the current end of file.
        #[arg(long, conflicts_with = "offset")]
        append: bool,
    },
    /// Report free blocks.
    Df,
}

fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("fatctl: {}", e);
            exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log))
        .format_timestamp(None)
        .init();

    if let Err(e) = tasks::execute(&cli.command, &settings) {
        error!("{}", e);
        exit(e.exit_code());
    }
}

fn load_settings(cli: &Cli) -> CtlResult<Settings> {
    let mut settings = Settings::load(&cli.config)?;
    if let Some(image) = &cli.image {
        settings.image = image.clone();
    }
    if let Some(log) = &cli.log {
        settings.log = log.clone();
    }
    Ok(settings)
}
