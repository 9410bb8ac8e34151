use crate::{
    errors::Lzkn64Error,
    format::{max_compressed_size, RAW_COPY_MAX_LENGTH, RLE_SHORT_MAX_LENGTH},
};
use std::{
    borrow::Cow,
    fmt,
    fs::{self, File},
    io::{BufWriter, Read, Write},
    path::Path,
};
use tracing::{debug, trace};

mod matcher;
mod raw;
mod select;
mod writer;

use self::{
    matcher::{find_run, find_window_match},
    raw::{Batch, RawCopyEmitter},
    select::select,
    writer::StreamWriter,
};

type LogWtr<'a> = &'a mut dyn Write;

/// The two encoders that produce LZKN64 streams.
///
/// Both produce streams that any LZKN64 decoder can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// Very slightly better compression, but the output won't match
    /// the files in the original games.
    Efficient,
    /// Reproduce the compressor used for the original games byte-for-byte.
    #[default]
    Accurate,
}

impl Variant {
    /// How far back the sliding window search looks
    pub(crate) const fn window_size(self) -> usize {
        match self {
            Self::Efficient => 0x3FF,
            // the original encoder looks back 32 fewer bytes
            Self::Accurate => 0x3DF,
        }
    }

    /// Longest run of a non-zero value to encode as one command
    pub(crate) const fn max_value_run(self) -> usize {
        match self {
            Self::Efficient => RLE_SHORT_MAX_LENGTH,
            Self::Accurate => RLE_SHORT_MAX_LENGTH - 1,
        }
    }

    /// Largest stream size the variant's header can store
    pub(crate) const fn max_stream_size(self) -> usize {
        match self {
            // top byte is always zero
            Self::Efficient => 0x00FF_FFFF,
            // top bit is reserved
            Self::Accurate => 0x7FFF_FFFF,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Efficient => write!(f, "efficient"),
            Self::Accurate => write!(f, "accurate"),
        }
    }
}

/// Specify the encoding settings, such as the variant, logging, input, and output
///
/// To create a new `EncoderBuilder`, use [`for_bytes()`], [`for_reader()`], or [`for_file()`].
/// Then, change any of the encoding settings with `EncoderBuilder`'s helper methods.
/// Finally, encode the input data with [`encode_to_vec()`], [`encode_into()`],
/// [`encode_to_writer()`], or [`encode_to_file()`].
/// ```
/// # use lzkn64::EncoderBuilder;
/// let input = b"ABBACABBCADFEGABA";
/// let compressed = EncoderBuilder::for_bytes(input)
///     .efficient()
///     .with_logging(&mut ::std::io::stdout())
///     .encode_to_vec()
///     .unwrap();
/// assert_eq!(lzkn64::decompress(&compressed).unwrap(), input);
/// ```
///
/// By default, the [`Accurate`] variant is used and nothing is logged.
///
/// [`for_bytes()`]: EncoderBuilder::for_bytes
/// [`for_reader()`]: EncoderBuilder::for_reader
/// [`for_file()`]: EncoderBuilder::for_file
/// [`encode_to_vec()`]: EncoderBuilder::encode_to_vec
/// [`encode_into()`]: EncoderBuilder::encode_into
/// [`encode_to_writer()`]: EncoderBuilder::encode_to_writer
/// [`encode_to_file()`]: EncoderBuilder::encode_to_file
/// [`Accurate`]: Variant::Accurate
pub struct EncoderBuilder<'a> {
    src: Cow<'a, [u8]>,
    variant: Variant,
    log: Option<LogWtr<'a>>,
}

impl<'a> EncoderBuilder<'a> {
    fn new(src: Cow<'a, [u8]>) -> Self {
        Self {
            src,
            variant: Variant::default(),
            log: None,
        }
    }

    /// Create a new `EncoderBuilder` for the data the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        Self::new(Cow::Borrowed(bytes))
    }

    /// Create a new `EncoderBuilder` for all of the data in `rdr`.
    pub fn for_reader<R: Read>(mut rdr: R) -> Result<Self, Lzkn64Error> {
        let mut buf = Vec::new();
        rdr.read_to_end(&mut buf)?;
        Ok(Self::new(Cow::Owned(buf)))
    }

    /// Create a new `EncoderBuilder` for the file at `p`.
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, Lzkn64Error> {
        let buf = fs::read(p)?;
        Ok(Self::new(Cow::Owned(buf)))
    }

    /// Set the encoder used to compress the input
    #[inline]
    pub fn variant(&mut self, variant: Variant) -> &mut Self {
        self.variant = variant;
        self
    }

    /// Convenience method to use the efficient encoder without importing [`Variant`].
    #[inline]
    pub fn efficient(&mut self) -> &mut Self {
        self.variant(Variant::Efficient)
    }

    /// Convenience method to use the accurate encoder without importing [`Variant`].
    #[inline]
    pub fn accurate(&mut self) -> &mut Self {
        self.variant(Variant::Accurate)
    }

    /// Write every emitted command to `log` while the input is being encoded.
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        self.log = Some(log as LogWtr<'a>);
        self
    }

    /// Compress into `output`, and return the size of the compressed stream.
    ///
    /// `output` is never grown; the encode fails if the stream doesn't fit.
    /// A buffer of [`max_compressed_size`] bytes is always large enough.
    ///
    /// [`max_compressed_size`]: crate::max_compressed_size
    #[inline]
    pub fn encode_into(&mut self, output: &mut [u8]) -> Result<usize, Lzkn64Error> {
        do_encode(self, output)
    }

    /// Start the encoding and return the compressed data in a `Vec<u8>`.
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, Lzkn64Error> {
        let mut output = vec![0; max_compressed_size(self.src.len())];
        let size = self.encode_into(&mut output)?;
        output.truncate(size);

        Ok(output)
    }

    /// Start the encoding and write the compressed data out to `wtr`
    pub fn encode_to_writer<W: Write>(&mut self, mut wtr: W) -> Result<(), Lzkn64Error> {
        let data = self.encode_to_vec()?;
        wtr.write_all(&data)?;
        wtr.flush().map_err(Into::into)
    }

    /// Start the encoding and write the compressed data out to the newly created
    /// `File` `f`
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), Lzkn64Error> {
        let wtr = BufWriter::new(File::create(f)?);
        self.encode_to_writer(wtr)
    }
}

/// Compress `input` with the [`Efficient`](Variant::Efficient) encoder
pub fn compress_efficient(input: &[u8]) -> Result<Vec<u8>, Lzkn64Error> {
    EncoderBuilder::for_bytes(input).efficient().encode_to_vec()
}

/// Compress `input` with the [`Accurate`](Variant::Accurate) encoder
pub fn compress_accurate(input: &[u8]) -> Result<Vec<u8>, Lzkn64Error> {
    EncoderBuilder::for_bytes(input).accurate().encode_to_vec()
}

/// Compress `input` with `variant`
///
/// This is a convenience function to encode bytes without having to
/// set up an [`EncoderBuilder`].
pub fn encode(input: &[u8], variant: Variant) -> Result<Vec<u8>, Lzkn64Error> {
    EncoderBuilder::for_bytes(input).variant(variant).encode_to_vec()
}

fn do_encode(opts: &mut EncoderBuilder<'_>, output: &mut [u8]) -> Result<usize, Lzkn64Error> {
    let EncoderBuilder { src, variant, log } = opts;
    let input: &[u8] = &**src;
    let variant = *variant;

    let mut out = StreamWriter::new(output)?;
    let mut raw = RawCopyEmitter::default();
    let mut cursor = 0;

    while cursor < input.len() {
        let window = find_window_match(input, cursor, variant);
        let run = find_run(input, cursor, variant);
        let choice = select(variant, window, run);

        let mut batch = Batch::new();
        let last_byte = cursor + 1 >= input.len();
        let pending = raw.pending(cursor);

        // the final flush takes the rest of the input, including the cursor
        if last_byte {
            raw.flush(input, input.len(), &mut batch);
        } else if (choice.is_some() && pending > 0) || pending >= RAW_COPY_MAX_LENGTH {
            raw.flush(input, cursor, &mut batch);
        }

        let consumed = match choice {
            Some(cmd) if !last_byte => {
                let length = cmd.decoded_len();
                batch.push(cmd);
                raw.skip_to(cursor + length);
                length
            }
            _ => 1,
        };

        for cmd in &batch {
            if let Some(wtr) = log.as_mut() {
                writeln!(wtr, "{:04x} - {}", out.position(), cmd)?;
            }
            trace!("{:#06x}: {}", out.position(), cmd);

            out.push(cmd)?;
        }

        cursor += consumed;
    }

    let size = out.finish(variant)?;
    debug!(
        "compressed {} bytes into {} bytes with the {} encoder",
        input.len(),
        size,
        variant
    );

    Ok(size)
}
