//! CardScan - identify trading cards in a photograph
//!
//! Reads each card's title with Tesseract and matches it against a JSON
//! catalog of card printings.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cardscan::config::{self, AppConfig};
use cardscan::storage;
use cardscan::vision::{DumpObserver, TesseractOcr, TracingObserver};
use cardscan::{CardScanner, Catalog, JsonSetsProvider, LocatedItem, ScannerConfig};

/// CardScan - trading card identification
#[derive(Parser, Debug)]
#[command(name = "cardscan")]
#[command(about = "Find trading cards in a photo and read their names")]
struct Args {
    /// Photo to scan
    image: Option<PathBuf>,

    /// JSON set list to match against
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Configuration file (default: config.toml in the config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report every card in the photo instead of the first
    #[arg(long)]
    all: bool,

    /// Log search progress
    #[arg(short, long)]
    verbose: bool,

    /// OCR program to run
    #[arg(long)]
    ocr_program: Option<PathBuf>,

    /// Print the printings of a card name, catalog id or multiverse id and exit
    #[arg(long, value_name = "NAME|ID")]
    lookup: Option<String>,

    /// Write every intermediate image into this directory
    #[arg(long, value_name = "DIR")]
    dump: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_create_config(args.config.as_deref())?;

    init_logging(&config, args.verbose)?;

    let catalog_path = match (&args.catalog, &config.catalog.path) {
        (Some(path), _) | (None, Some(path)) => path.clone(),
        (None, None) => storage::default_catalog_path()?,
    };
    let catalog = Arc::new(
        Catalog::load(&JsonSetsProvider::new(&catalog_path))
            .with_context(|| format!("Failed to load catalog {:?}", catalog_path))?,
    );

    if let Some(query) = &args.lookup {
        lookup(&catalog, query);
        return Ok(());
    }

    let Some(image_path) = &args.image else {
        bail!("No image given (pass a photo or --lookup NAME|ID)");
    };

    let mut ocr_settings = config.ocr.clone();
    if let Some(program) = &args.ocr_program {
        ocr_settings.program = program.clone();
    }

    let mut scanner = CardScanner::with_config(
        Arc::clone(&catalog),
        Box::new(TesseractOcr::from_settings(&ocr_settings)),
        ScannerConfig::from_settings(&config.search),
    );
    if let Some(dir) = &args.dump {
        scanner = scanner.with_observer(Box::new(DumpObserver::new(dir)?));
    } else if args.verbose {
        scanner = scanner.with_observer(Box::new(TracingObserver));
    }

    let photo = image::open(image_path).with_context(|| format!("Failed to open image {:?}", image_path))?;
    info!("Scanning {:?} ({}x{})", image_path, photo.width(), photo.height());

    let items = if args.all {
        scanner.scan_all(&photo)?
    } else {
        scanner.scan(&photo)?.into_iter().collect()
    };

    if items.is_empty() {
        println!("no match");
        return Ok(());
    }
    for item in &items {
        print_item(&catalog, item);
    }

    Ok(())
}

fn init_logging(config: &AppConfig, verbose: bool) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        return Ok(());
    }

    let level = if verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or_else(|_| {
            eprintln!("Unknown log level {:?}, using info", config.logging.level);
            Level::INFO
        })
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Load configuration from file or create default. Runs before logging is
/// set up, so problems go to stderr.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return config::load_config(path);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => return Ok(config),
                Err(e) => eprintln!("Ignoring unreadable config: {:#}", e),
            }
        } else if let Err(e) = config::save_config(&AppConfig::default(), &config_path) {
            eprintln!("Failed to write default config: {:#}", e);
        }
    }
    Ok(AppConfig::default())
}

fn lookup(catalog: &Catalog, query: &str) {
    let printings = catalog.lookup(query);
    if printings.is_empty() {
        println!("{:?} is not in the catalog. Closest names:", query);
        for (suggestion, score) in catalog.suggest(query, 5) {
            println!("  {} ({:.0}%)", suggestion, score * 100.0);
        }
        return;
    }

    for entry in printings {
        println!(
            "{} [{}] {} #{} ({} frame)",
            entry.name,
            entry.set_code,
            entry.set_name,
            entry.number.as_deref().unwrap_or("-"),
            entry.era
        );
    }
}

fn print_item(catalog: &Catalog, item: &LocatedItem) {
    let name = item.name().unwrap_or("?");
    println!(
        "{} ({:.1}% sure) - {} frame, turned {:.1}°, at ({:.0}, {:.0})",
        name,
        item.confidence(),
        item.era(),
        item.angle,
        item.center.0,
        item.center.1
    );

    let sets = catalog.printings(name);
    if !sets.is_empty() {
        println!("  printed in: {}", sets.join(", "));
    }
}
