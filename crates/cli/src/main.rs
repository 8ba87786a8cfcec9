//! CLI tool for building branded slide decks from an outline.

use anyhow::{Context, Result};
use clap::Parser;
use deck_core::{CompileReport, DeckConfig, Outline, RgbColor};
use deck_pptx::DeckCompiler;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Build a .pptx deck from a JSON outline and a branded template.
#[derive(Parser, Debug)]
#[command(name = "deck-build")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file (brand, layouts, paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON outline (default: built-in example outline)
    #[arg(short = 'i', long)]
    outline: Option<PathBuf>,

    /// Template package (.potx or .pptx)
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Output deck path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Brand accent colour as RRGGBB hex
    #[arg(long)]
    accent: Option<String>,

    /// Brand font family
    #[arg(long)]
    font: Option<String>,

    /// Also write the compile report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = load_config(&args)?;
    let outline = match &args.outline {
        Some(path) => Outline::from_file(path)
            .with_context(|| format!("Failed to load outline {}", path.display()))?,
        None => {
            log::debug!("No outline given, using the built-in example");
            Outline::example()
        }
    };

    let report = DeckCompiler::new(&config)
        .compile(&outline)
        .with_context(|| format!("Failed to build {}", config.output_path.display()))?;

    print_summary(&report);
    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    Ok(())
}

/// Load the configuration file, if any, then apply command-line overrides.
fn load_config(args: &Args) -> Result<DeckConfig> {
    let mut config = match &args.config {
        Some(path) => DeckConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DeckConfig::new(),
    };

    if let Some(path) = &args.template {
        config = config.with_template_path(path);
    }
    if let Some(path) = &args.output {
        config = config.with_output_path(path);
    }
    if let Some(hex) = &args.accent {
        config = config.with_accent(RgbColor::from_hex(hex)?);
    }
    if let Some(font) = &args.font {
        config = config.with_font_family(font);
    }

    Ok(config)
}

fn print_summary(report: &CompileReport) {
    println!();
    println!("Saved: {}", report.output_path.display());
    println!("Total slides: {}", report.total_slides());

    let notices: Vec<_> = report.notices().collect();
    if !notices.is_empty() {
        println!("Notices:");
        for (slide, notice) in notices {
            println!("  {}. {}: {}", slide.ordinal, slide.label, notice);
        }
    }
}

/// Write the compile report as pretty JSON.
fn write_report(path: &Path, report: &CompileReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
