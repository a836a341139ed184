//! Configuration for the `tiff-ifd` command-line tool.
//!
//! Every option can be given as a flag or through an environment variable
//! with the `TIFF_IFD_` prefix:
//!
//! - `TIFF_IFD_INPUT` - File to read
//! - `TIFF_IFD_JSON` - Emit JSON from `dump` (default: false)
//! - `TIFF_IFD_MAX_IFDS` - Directories listed by `dump` (default: 100)
//! - `TIFF_IFD_OUTPUT` - File written by `rewrite`
//! - `TIFF_IFD_BYTE_ORDER` - `keep`, `little` or `big` (default: keep)
//! - `TIFF_IFD_FORMAT` - `keep`, `classic` or `big-tiff` (default: keep)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::tiff::{ByteOrder, TiffHeader, WriteOptions, MAX_IFDS};

// =============================================================================
// CLI Arguments
// =============================================================================

/// tiff-ifd - Inspect and rewrite TIFF directories.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiff-ifd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every directory, its tags and its sub-IFDs.
    Dump(DumpConfig),

    /// Write the file again, optionally changing byte order or flavor.
    Rewrite(RewriteConfig),
}

/// Byte order of the rewritten file.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderArg {
    /// Same as the input
    Keep,
    Little,
    Big,
}

/// Flavor of the rewritten file.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// Same as the input
    Keep,
    Classic,
    BigTiff,
}

// =============================================================================
// Dump
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct DumpConfig {
    /// TIFF or BigTIFF file to inspect.
    #[arg(env = "TIFF_IFD_INPUT")]
    pub input: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false, env = "TIFF_IFD_JSON")]
    pub json: bool,

    /// Maximum number of top-level directories to list.
    #[arg(long, default_value_t = MAX_IFDS, env = "TIFF_IFD_MAX_IFDS")]
    pub max_ifds: usize,

    /// Do not follow EXIF, GPS and SubIFD pointers.
    #[arg(long, default_value_t = false)]
    pub no_sub_ifds: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl DumpConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.input.as_os_str().is_empty() {
            return Err("Input path is required. Pass it or set TIFF_IFD_INPUT".to_string());
        }
        if self.max_ifds == 0 {
            return Err("max_ifds must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Rewrite
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct RewriteConfig {
    /// TIFF or BigTIFF file to read.
    #[arg(env = "TIFF_IFD_INPUT")]
    pub input: PathBuf,

    /// File to write.
    #[arg(env = "TIFF_IFD_OUTPUT")]
    pub output: PathBuf,

    /// Byte order of the output.
    #[arg(long, value_enum, default_value_t = ByteOrderArg::Keep, env = "TIFF_IFD_BYTE_ORDER")]
    pub byte_order: ByteOrderArg,

    /// Classic TIFF or BigTIFF output.
    #[arg(long, value_enum, default_value_t = FormatArg::Keep, env = "TIFF_IFD_FORMAT")]
    pub format: FormatArg,

    /// Write only the first directory.
    #[arg(long, default_value_t = false)]
    pub first_only: bool,

    /// Write directories as parsed, without filling in missing tags.
    #[arg(long, default_value_t = false)]
    pub no_repair: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RewriteConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.input.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(
                "Input and output paths are required. Set TIFF_IFD_INPUT and TIFF_IFD_OUTPUT"
                    .to_string(),
            );
        }
        if self.input == self.output {
            return Err("Output must differ from input; directories are read lazily".to_string());
        }
        Ok(())
    }

    /// Output flavor, taking unspecified settings from the input header.
    pub fn write_options(&self, input: &TiffHeader) -> WriteOptions {
        let byte_order = match self.byte_order {
            ByteOrderArg::Keep => input.byte_order,
            ByteOrderArg::Little => ByteOrder::LittleEndian,
            ByteOrderArg::Big => ByteOrder::BigEndian,
        };
        let big_tiff = match self.format {
            FormatArg::Keep => input.is_bigtiff,
            FormatArg::Classic => false,
            FormatArg::BigTiff => true,
        };
        WriteOptions::new(byte_order, big_tiff)
    }
}

// =============================================================================
// Tests
// =============================================================================
