//! Command-line front end for the WebAssembly transform host.
//!
//! This CLI provides tools for:
//! - Running a single coordinate transform through a module
//! - Inspecting a module's exports, imports and bridge readiness

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use proj_host::{BridgeStrategy, HostConfig, ModuleLoader, TransformHost};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "proj-host")]
#[command(author, version, about = "Coordinate transforms through a WebAssembly module", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform one coordinate
    Run {
        /// Path to the compiled module
        #[arg(short, long)]
        module: PathBuf,

        /// Source reference system (e.g. EPSG:4326)
        #[arg(long)]
        from: String,

        /// Target reference system (e.g. EPSG:3857)
        #[arg(long)]
        to: String,

        /// First coordinate
        #[arg(allow_negative_numbers = true)]
        x: f64,

        /// Second coordinate
        #[arg(allow_negative_numbers = true)]
        y: f64,

        /// Third coordinate; uses the 3-D transform when given
        #[arg(long, allow_negative_numbers = true)]
        z: Option<f64>,

        /// Export generation to drive (raw, typed)
        #[arg(long)]
        strategy: Option<BridgeStrategy>,

        /// Use instrumented shims and print a report on failure
        #[arg(long)]
        diagnostics: bool,

        /// JSON host configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a module's exports, imports and readiness
    Inspect {
        /// Path to the compiled module
        #[arg(short, long)]
        module: PathBuf,

        /// Export generation to check (raw, typed)
        #[arg(long)]
        strategy: Option<BridgeStrategy>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            module,
            from,
            to,
            x,
            y,
            z,
            strategy,
            diagnostics,
            config,
        } => {
            let config = load_config(config.as_deref(), strategy, diagnostics)?;
            cmd_run(&module, &from, &to, x, y, z, config)
        }

        Commands::Inspect { module, strategy } => {
            let config = load_config(None, strategy, false)?;
            cmd_inspect(&module, config)
        }
    }
}

/// Merge the optional config file with command-line overrides.
fn load_config(path: Option<&Path>, strategy: Option<BridgeStrategy>, diagnostics: bool) -> Result<HostConfig> {
    let mut config = match path {
        Some(path) => HostConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => HostConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if diagnostics {
        config.diagnostics = true;
    }
    Ok(config)
}

fn cmd_run(
    module: &Path,
    from: &str,
    to: &str,
    x: f64,
    y: f64,
    z: Option<f64>,
    config: HostConfig,
) -> Result<()> {
    let mut host = TransformHost::from_file(module, config)
        .with_context(|| format!("failed to load module {}", module.display()))?;

    if let Some(reason) = host.disabled_reason() {
        bail!(reason);
    }

    let outcome = match z {
        Some(z) => host.run_transform3(from, to, x, y, z),
        None => host.run_transform(from, to, x, y),
    };

    match outcome {
        Ok(output) => {
            info!("{} -> {}: {:?}", from, to, output.output);
            println!("{}", serde_json::to_string(&output)?);
            Ok(())
        }
        Err(failure) => bail!(failure.to_string()),
    }
}

fn cmd_inspect(module: &Path, config: HostConfig) -> Result<()> {
    let loader = ModuleLoader::new(config)?;
    let image = loader
        .load_module(module)
        .with_context(|| format!("failed to load module {}", module.display()))?;

    let provenance = image.provenance();
    println!("=== Module {} ===", image.name());
    println!();
    println!("  Size:     {} bytes", provenance.size);
    println!("  Head:     {}", provenance.head_hex);
    println!("  SHA-256:  {}", provenance.sha256);
    println!();

    println!("Exports:");
    for name in image.exports() {
        println!("  {}", name);
    }
    println!();

    println!("Imports:");
    for (namespace, name) in image.imports() {
        println!("  {}::{}", namespace, name);
    }
    println!();

    let strategy = loader.config().strategy;
    let host = TransformHost::from_image(&loader, &image)?;
    match host.disabled_reason() {
        None => {
            println!("Bridge ({}): ready", strategy.as_str());
            println!(
                "  3-D transform: {}",
                if host.supports_transform3() { "yes" } else { "no" }
            );
        }
        Some(reason) => println!("Bridge ({}): {}", strategy.as_str(), reason),
    }

    Ok(())
}
