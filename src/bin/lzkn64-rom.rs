//! Compress or decompress every file listed in a ROM's file address table.
//!
//! ## Usage
//!
//! ```bash
//! # unpack a ROM whose table is at 0x1000
//! lzkn64-rom -d -i game.z64 -o game.dec.z64 -a 0x1000
//!
//! # pack it again, compressing the same files as the original
//! lzkn64-rom -c -i game.dec.z64 -o game.z64 -a 0x1000 -r original.z64 -p
//! ```

use std::{fs, num::ParseIntError, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use lzkn64::{
    archive::{RepackSettings, Repacker},
    Variant,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lzkn64-rom")]
#[command(version)]
#[command(about = "Compress or decompress the files in a ROM's file address table", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["compress", "decompress"])))]
struct Args {
    /// Path to the input ROM
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the output ROM
    #[arg(short, long)]
    output: PathBuf,

    /// Compress the files in the ROM
    #[arg(short, long)]
    compress: bool,

    /// Decompress the files in the ROM
    #[arg(short, long)]
    decompress: bool,

    /// Offset of the file address table in the ROM (decimal, or hex with 0x)
    #[arg(short = 'a', long = "table", value_parser = parse_offset)]
    table_offset: usize,

    /// Only compress the files that are compressed in this ROM
    #[arg(short, long, requires = "compress")]
    reference: Option<PathBuf>,

    /// Use the efficient encoder instead of matching the original compressor
    #[arg(short, long, requires = "compress")]
    efficient: bool,

    /// Pad the output ROM to the next power of two
    #[arg(short, long)]
    pad: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn parse_offset(s: &str) -> Result<usize, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting up logging")?;

    let rom = fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let reference = args
        .reference
        .as_ref()
        .map(|p| fs::read(p).with_context(|| format!("reading {}", p.display())))
        .transpose()?;

    let settings = RepackSettings {
        table_offset: args.table_offset,
        variant: if args.efficient {
            Variant::Efficient
        } else {
            Variant::Accurate
        },
        pad_to_power_of_two: args.pad,
    };

    let mut repacker = Repacker::new(&rom, settings);
    if let Some(reference) = &reference {
        repacker.with_reference(reference);
    }

    let output = if args.compress {
        repacker.compress()
    } else {
        repacker.decompress()
    }
    .with_context(|| {
        format!(
            "repacking {} with the table at {:#x}",
            args.input.display(),
            args.table_offset
        )
    })?;

    fs::write(&args.output, &output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("wrote {:#x} bytes to {}", output.len(), args.output.display());

    Ok(())
}
