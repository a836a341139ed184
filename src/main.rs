//! tiff-ifd - Inspect and rewrite TIFF directories.

use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiff_ifd::{
    config::{Cli, Command, DumpConfig, RewriteConfig},
    render_text, save_tiff, CodecRegistry, IfdSummary, TiffDocument,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Dump(config) => run_dump(config),
        Command::Rewrite(config) => run_rewrite(config),
    }
}

// =============================================================================
// Dump Command
// =============================================================================

fn run_dump(config: DumpConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match dump(&config) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to read {}: {}", config.input.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn dump(config: &DumpConfig) -> Result<String, Box<dyn Error>> {
    let doc = TiffDocument::open(&config.input)?;
    let mut ifds = doc.ifds()?;
    ifds.truncate(config.max_ifds);

    if !config.no_sub_ifds {
        for ifd in &mut ifds {
            ifd.resolve_all_sub_ifds()?;
        }
    }

    let summaries: Vec<IfdSummary> = ifds.iter().map(IfdSummary::from_ifd).collect();
    if config.json {
        let mut json = serde_json::to_string_pretty(&summaries)?;
        json.push('\n');
        Ok(json)
    } else {
        Ok(render_text(&summaries))
    }
}

// =============================================================================
// Rewrite Command
// =============================================================================

fn run_rewrite(config: RewriteConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match rewrite(&config) {
        Ok(directories) => {
            info!(
                "Wrote {} director{} to {}",
                directories,
                if directories == 1 { "y" } else { "ies" },
                config.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to rewrite {}: {}", config.input.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn rewrite(config: &RewriteConfig) -> Result<usize, Box<dyn Error>> {
    let doc = TiffDocument::open(&config.input)?;
    let mut ifds = doc.ifds()?;
    if config.first_only {
        ifds.truncate(1);
    }
    if !config.no_repair {
        for ifd in &mut ifds {
            // Repair only reaches children that are already parsed
            ifd.resolve_all_sub_ifds()?;
            ifd.repair()?;
        }
    }

    let options = config.write_options(doc.header());
    let sink = BufWriter::new(File::create(&config.output)?);
    save_tiff(&mut ifds, &options, &CodecRegistry::default(), sink)?;
    Ok(ifds.len())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tiff_ifd=debug"
    } else {
        "tiff_ifd=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
