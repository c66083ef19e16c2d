//! IdCardScanner - Identity document scanner
//!
//! Reads text from a captured identity document, classifies it, splits it
//! into fields and stores one record per face found on the document.

mod capture;
mod config;
mod document;
mod error;
mod pipeline;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::capture::ImageFileSource;
use crate::config::AppConfig;
use crate::document::{extract_record, ImageRef};
use crate::pipeline::{FanOutReport, ScanPipeline};
use crate::storage::Database;
use crate::vision::{
    DetectorConfig, FaceCropper, ModelManager, StaticTextRecognizer, TextRecognizer,
    UltraFaceLocator, VisionApiRecognizer,
};

/// IdCardScanner - identity document field extraction
#[derive(Parser, Debug)]
#[command(name = "idcard-scanner")]
#[command(about = "Extract and store identity document fields, one record per detected face")]
struct Args {
    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan document images (files or directories), one capture cycle each
    Scan {
        /// Image files or directories of images
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Use pre-recognized text from this file instead of the recognition service
        #[arg(long)]
        text_file: Option<PathBuf>,
    },
    /// Extract a record from recognized text and print it as JSON
    Parse {
        /// Text file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
    /// List stored records
    Records {
        /// Maximum rows per document type
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.as_deref();
    match args.command {
        Command::Scan { paths, text_file } => {
            run_scan(&load_or_create_config(config_path)?, &paths, text_file.as_deref())
        }
        Command::Parse { file } => run_parse(&load_or_create_config(config_path)?, file.as_deref()),
        Command::Records { limit } => run_records(&load_or_create_config(config_path)?, limit),
        Command::InitConfig { force } => init_config(config_path, force),
    }
}

/// Default location of the configuration file
fn default_config_path() -> Result<PathBuf> {
    Ok(storage::get_config_dir()?.join("config.toml"))
}

/// Load configuration from file or fall back to defaults.
/// An explicitly given file must exist and parse.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring invalid configuration {:?}: {}", config_path, e),
            }
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn init_config(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }

    config::save_config(&AppConfig::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let path = match &config.storage.database_path {
        Some(path) => path.clone(),
        None => storage::get_data_dir()?.join("idcards.db"),
    };
    Database::open(&path)
}

/// Run one capture cycle per image
fn run_scan(config: &AppConfig, paths: &[PathBuf], text_file: Option<&Path>) -> Result<()> {
    let images = capture::collect_image_paths(paths);
    if images.is_empty() {
        anyhow::bail!("No images found to scan");
    }

    let recognizer: Box<dyn TextRecognizer> = match text_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file {:?}", path))?;
            info!("Using pre-recognized text from {:?}", path);
            Box::new(StaticTextRecognizer::new(text))
        }
        None => Box::new(VisionApiRecognizer::from_settings(&config.recognition)?),
    };

    let model_path = match &config.faces.model_path {
        Some(path) => path.clone(),
        None => ModelManager::new()?.ensure_model(config.faces.model)?,
    };
    let locator = UltraFaceLocator::new(&model_path, DetectorConfig::from(&config.faces))?;

    let faces_dir = match &config.faces.output_dir {
        Some(dir) => dir.clone(),
        None => storage::get_data_dir()?.join("faces"),
    };
    let cropper = FaceCropper::new(faces_dir, config.faces.save_annotated)?;
    info!("Writing face images to {:?}", cropper.output_dir());
    let mut db = open_database(config)?;

    let mut pipeline = ScanPipeline::new(
        &*recognizer,
        &locator,
        &cropper,
        &mut db,
        config.document.min_fields,
    );

    let mut failed = 0;
    for path in &images {
        let mut source = ImageFileSource::new(path.clone());
        match pipeline.run_cycle(&mut source) {
            Ok(report) => match report.fan_out {
                FanOutReport::NoFaces if report.faces_detected == 0 => {
                    println!("{}: {:?}, no faces found", path.display(), report.document_type());
                }
                FanOutReport::NoFaces => {
                    println!(
                        "{}: {:?}, {} faces found but no face image could be saved",
                        path.display(),
                        report.document_type(),
                        report.faces_detected
                    );
                }
                FanOutReport::Submitted { failed: rejected, .. } => {
                    println!(
                        "{}: {:?}, {} of {} face records stored ({} ms)",
                        path.display(),
                        report.document_type(),
                        report.fan_out.stored(),
                        report.faces_detected,
                        report.processing_time_ms
                    );
                    if rejected > 0 {
                        warn!(capture = %report.capture_id, "{} face records rejected by storage", rejected);
                    }
                }
            },
            Err(e) => {
                failed += 1;
                error!(retryable = e.is_retryable(), "{}: {}", path.display(), e);
            }
        }
    }

    info!("Processed {} captures, {} failed", images.len(), failed);
    if failed > 0 {
        anyhow::bail!("{} of {} captures failed", failed, images.len());
    }
    Ok(())
}

/// Print the record extracted from recognized text; nothing is stored
fn run_parse(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let (text, image_ref) = match file {
        Some(path) => (
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?,
            ImageRef::from(path),
        ),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            (text, ImageRef::new("-"))
        }
    };

    let record = extract_record(&text, config.document.min_fields, image_ref);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn run_records(config: &AppConfig, limit: usize) -> Result<()> {
    let db = open_database(config)?;
    for stored in db.records(limit)? {
        println!("{}", serde_json::to_string(&stored)?);
    }
    Ok(())
}
