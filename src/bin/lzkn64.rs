//! Compress, decompress, or inspect a single LZKN64 file.
//!
//! ## Usage
//!
//! ```bash
//! # compress with the original game's encoder
//! lzkn64 -c texture.bin texture.lzkn
//!
//! # smaller output, padded to an even size
//! lzkn64 -c -e -p texture.bin texture.lzkn
//!
//! lzkn64 -d texture.lzkn texture.bin
//! lzkn64 -i texture.lzkn
//! ```

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use lzkn64::{Decoder, EncoderBuilder, Variant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lzkn64")]
#[command(version)]
#[command(about = "Compress or decompress a file with LZKN64", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["compress", "decompress", "inspect"])))]
#[command(group(ArgGroup::new("encoder").args(["accurate", "efficient"])))]
struct Args {
    /// Compress the input file
    #[arg(short, long)]
    compress: bool,

    /// Decompress the input file
    #[arg(short, long)]
    decompress: bool,

    /// Print information about a compressed input file
    #[arg(short, long)]
    inspect: bool,

    /// Path to the input file
    input: PathBuf,

    /// Path to the output file
    #[arg(required_unless_present = "inspect")]
    output: Option<PathBuf>,

    /// Match the original compressor's output (default)
    #[arg(short, long)]
    accurate: bool,

    /// Compress slightly better than the original compressor
    #[arg(short, long)]
    efficient: bool,

    /// Pad the compressed file to a two byte boundary
    #[arg(short, long, requires = "compress")]
    pad: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting up logging")?;

    if args.inspect {
        let mut decoder = Decoder::for_file(&args.input)
            .with_context(|| format!("reading {}", args.input.display()))?;
        let info = decoder
            .info()
            .with_context(|| format!("inspecting {}", args.input.display()))?;
        println!("{}", info);
        return Ok(());
    }

    let output = args.output.context("no output file given")?;

    let data = if args.compress {
        let variant = if args.efficient {
            Variant::Efficient
        } else {
            Variant::Accurate
        };

        let mut data = EncoderBuilder::for_file(&args.input)
            .with_context(|| format!("reading {}", args.input.display()))?
            .variant(variant)
            .encode_to_vec()
            .with_context(|| format!("compressing {}", args.input.display()))?;

        if args.pad && data.len() % 2 != 0 {
            data.push(0);
        }
        data
    } else {
        Decoder::for_file(&args.input)
            .with_context(|| format!("reading {}", args.input.display()))?
            .decode()
            .with_context(|| format!("decompressing {}", args.input.display()))?
    };

    fs::write(&output, &data).with_context(|| format!("writing {}", output.display()))?;
    info!("wrote {:#x} bytes to {}", data.len(), output.display());

    Ok(())
}
