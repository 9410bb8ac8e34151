use crate::errors::Lzkn64Error;
use crate::format::{commands, Command, CommandKind, StreamHeader};
use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt, fs,
    io::{Read, Write},
    path::Path,
};
use tracing::{debug, trace};

type LogWtr<'a> = &'a mut dyn Write;

/// Information about an LZKN64 stream, collected without decompressing it.
///
/// You can get a `StreamInfo` by using [`stream_info`] or [`Decoder::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub header: StreamHeader,
    /// Number of bytes the stream decompresses to
    pub decompressed_size: usize,
    /// How many of each kind of command the stream holds
    pub commands: BTreeMap<CommandKind, usize>,
}

impl StreamInfo {
    /// Size of the compressed stream, header included
    #[inline]
    pub fn compressed_size(&self) -> usize {
        self.header.size as usize
    }

    /// Total number of commands in the stream
    pub fn command_count(&self) -> usize {
        self.commands.values().sum()
    }
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "compressed size: {:#x} ({} bytes)", self.header.size, self.header.size)?;
        writeln!(
            f,
            "decompressed size: {:#x} ({} bytes)",
            self.decompressed_size, self.decompressed_size
        )?;
        write!(f, "commands: {}", self.command_count())?;
        for (kind, count) in &self.commands {
            write!(f, "\n  {}: {}", kind, count)?;
        }

        Ok(())
    }
}

/// Specify the decoding settings, such as logging, input, and output.
///
/// To create a new `Decoder`, use [`for_reader()`], [`for_bytes()`], or
/// [`for_file()`]. Then, change any of the decoder settings.
/// Finally, decode the input data with [`decode()`] or [`decode_into()`].
/// ```
/// # use lzkn64::{EncoderBuilder, Decoder};
/// let original = b"ABBACABBACD";
/// let compressed = EncoderBuilder::for_bytes(original)
///     .encode_to_vec()
///     .unwrap();
/// let decompressed = Decoder::for_bytes(&compressed)
///     .decode()
///     .unwrap();
/// assert_eq!(&original[..], decompressed);
/// ```
/// A `Decoder` can also report the [`StreamHeader`] with [`header()`]
/// or the [`StreamInfo`] with [`info()`]:
/// ```
/// # use lzkn64::{EncoderBuilder, Decoder};
/// # let original = b"ABBACABBACD";
/// # let compressed = EncoderBuilder::for_bytes(original).encode_to_vec().unwrap();
/// let mut decoder = Decoder::for_bytes(&compressed);
/// assert_eq!(decoder.header().unwrap().size as usize, compressed.len());
/// assert_eq!(decoder.info().unwrap().decompressed_size, original.len());
/// ```
/// [`for_reader()`]: Decoder::for_reader
/// [`for_bytes()`]: Decoder::for_bytes
/// [`for_file()`]: Decoder::for_file
/// [`decode()`]: Decoder::decode
/// [`decode_into()`]: Decoder::decode_into
/// [`header()`]: Decoder::header
/// [`info()`]: Decoder::info
pub struct Decoder<'a> {
    src: Cow<'a, [u8]>,
    log: Option<LogWtr<'a>>,
    info: Option<StreamInfo>,
}

impl<'a> Decoder<'a> {
    fn new(src: Cow<'a, [u8]>) -> Self {
        Self {
            src,
            log: None,
            info: None,
        }
    }

    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        Self::new(Cow::Borrowed(bytes))
    }

    pub fn for_reader<R: Read>(mut rdr: R) -> Result<Self, Lzkn64Error> {
        let mut buf = Vec::new();
        rdr.read_to_end(&mut buf)?;
        Ok(Self::new(Cow::Owned(buf)))
    }

    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, Lzkn64Error> {
        fs::read(p).map(Cow::Owned).map(Self::new).map_err(Into::into)
    }

    #[inline]
    pub fn with_logging<W: Write>(&mut self, wtr: &'a mut W) -> &mut Self {
        self.log = Some(wtr as LogWtr);
        self
    }

    #[inline]
    pub fn header(&self) -> Result<StreamHeader, Lzkn64Error> {
        StreamHeader::from_bytes(&self.src)
    }

    /// Walk the stream's commands to collect its [`StreamInfo`].
    /// The result is cached for later calls and for [`decode()`](Decoder::decode).
    pub fn info(&mut self) -> Result<&StreamInfo, Lzkn64Error> {
        let info = match self.info.take() {
            Some(info) => info,
            None => scan_info(&self.src)?,
        };

        Ok(self.info.insert(info))
    }

    /// Decompress the stream into a new `Vec<u8>` of exactly the decompressed size
    pub fn decode(&mut self) -> Result<Vec<u8>, Lzkn64Error> {
        let size = self.info()?.decompressed_size;
        let mut output = vec![0; size];
        let written = self.decode_into(&mut output)?;
        output.truncate(written);

        Ok(output)
    }

    /// Decompress the stream into `output`, returning the number of bytes written.
    ///
    /// `output` is never grown; the decode fails if the data doesn't fit.
    #[inline]
    pub fn decode_into(&mut self, output: &mut [u8]) -> Result<usize, Lzkn64Error> {
        let Decoder { src, log, .. } = self;
        do_decode(src, output, log.as_mut())
    }
}

/// Decompress LZKN64 data into a `Vec<u8>`
///
/// Streams from either encoder variant are decoded the same way.
/// This is a convenience function to decode bytes without having to
/// set up a [`Decoder`].
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, Lzkn64Error> {
    Decoder::for_bytes(input).decode()
}

/// Extract the [`StreamInfo`] from LZKN64 data
///
/// ```
/// # use lzkn64::{stream_info, CommandKind};
/// let info = stream_info(&[0x00, 0x00, 0x00, 0x06, 0xFF, 0x1F]).unwrap();
/// assert_eq!(info.decompressed_size, 33);
/// assert_eq!(info.commands[&CommandKind::RleLongZero], 1);
/// ```
pub fn stream_info(input: &[u8]) -> Result<StreamInfo, Lzkn64Error> {
    scan_info(input)
}

fn scan_info(input: &[u8]) -> Result<StreamInfo, Lzkn64Error> {
    let header = StreamHeader::from_bytes(input)?;
    let mut decompressed_size = 0;
    let mut counts = BTreeMap::new();

    for cmd in commands(input)? {
        let (_, cmd) = cmd?;
        check_lookback(&cmd, decompressed_size)?;

        decompressed_size += cmd.decoded_len();
        *counts.entry(cmd.kind()).or_insert(0) += 1;
    }

    Ok(StreamInfo {
        header,
        decompressed_size,
        commands: counts,
    })
}

fn check_lookback(cmd: &Command, produced: usize) -> Result<(), Lzkn64Error> {
    match *cmd {
        Command::WindowCopy { offset, .. } if offset == 0 || offset > produced => {
            Err(Lzkn64Error::BadLookBack {
                offset,
                available: produced,
            })
        }
        _ => Ok(()),
    }
}

fn do_decode(
    input: &[u8],
    output: &mut [u8],
    mut log: Option<&mut LogWtr>,
) -> Result<usize, Lzkn64Error> {
    let capacity = output.len();
    let mut pos = 0;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "# Header\n{:?}\n", StreamHeader::from_bytes(input)?)?;
    }

    for cmd in commands(input)? {
        let (at, cmd) = cmd?;
        check_lookback(&cmd, pos)?;

        let length = cmd.decoded_len();
        let end = pos + length;
        if end > capacity {
            return Err(Lzkn64Error::BufferCapacityExceeded {
                required: end,
                capacity,
            });
        }

        if let Some(wtr) = log.as_mut() {
            writeln!(wtr, "{:04x} - {}", pos, cmd)?;
        }
        trace!("{:#06x} -> {:#06x}: {}", at, pos, cmd);

        match cmd {
            Command::WindowCopy { offset, .. } => {
                // source and destination overlap when offset < length
                for i in pos..end {
                    output[i] = output[i - offset];
                }
            }
            Command::RawCopy(bytes) => output[pos..end].copy_from_slice(bytes),
            Command::RleValue { value, .. } => output[pos..end].fill(value),
            Command::RleShortZero(..) | Command::RleLongZero(..) => output[pos..end].fill(0),
        }

        pos = end;
    }

    debug!("decompressed {} bytes", pos);

    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    // "ab", "ababab", "xxxx", 3 zeroes, 10 zeroes
    const FIXTURE: [u8; 14] = [
        0x00, 0x00, 0x00, 0x0E, 0x82, b'a', b'b', 0x10, 0x02, 0xC2, b'x', 0xE1, 0xFF, 0x08,
    ];

    fn fixture_output() -> Vec<u8> {
        let mut expected = b"abababab".to_vec();
        expected.extend_from_slice(b"xxxx");
        expected.extend_from_slice(&[0; 13]);
        expected
    }

    #[test]
    fn decodes_every_command() {
        assert_eq!(decompress(&FIXTURE).unwrap(), fixture_output());
    }

    #[test]
    fn info_counts_commands() {
        let info = stream_info(&FIXTURE).unwrap();
        assert_eq!(info.compressed_size(), 14);
        assert_eq!(info.decompressed_size, 25);
        assert_eq!(info.command_count(), 5);
        assert_eq!(info.commands[&CommandKind::WindowCopy], 1);
        assert_eq!(info.commands[&CommandKind::RleShortZero], 1);
        assert_eq!(info.commands.get(&CommandKind::RleValue), Some(&1));
    }

    #[test]
    fn trailing_bytes_past_header_size_are_ignored() {
        let mut input = FIXTURE.to_vec();
        input.extend_from_slice(&[0xAB; 8]);
        assert_eq!(decompress(&input).unwrap(), fixture_output());
    }

    #[test]
    fn reserved_header_bit_is_ignored() {
        let mut input = FIXTURE;
        input[0] |= 0x80;
        assert_eq!(decompress(&input).unwrap(), fixture_output());
    }

    #[test]
    fn lookback_before_start() {
        match decompress(&[0x00, 0x00, 0x00, 0x06, 0x00, 0x01]) {
            Err(Lzkn64Error::BadLookBack { offset, available }) => {
                assert_eq!((offset, available), (1, 0));
            }
            other => panic!("expected bad lookback, got {:?}", other),
        }
    }

    #[test]
    fn lookback_of_zero() {
        let input = [0x00, 0x00, 0x00, 0x09, 0x82, 1, 2, 0x00, 0x00];
        assert!(matches!(
            decompress(&input),
            Err(Lzkn64Error::BadLookBack { offset: 0, available: 2 })
        ));
    }

    #[test]
    fn decode_into_exact_and_short_buffers() {
        let mut decoder = Decoder::for_bytes(&FIXTURE);

        let mut exact = [0xEEu8; 25];
        assert_eq!(decoder.decode_into(&mut exact).unwrap(), 25);
        assert_eq!(&exact[..], &fixture_output()[..]);

        let mut short = [0u8; 20];
        match decoder.decode_into(&mut short) {
            Err(Lzkn64Error::BufferCapacityExceeded { required, capacity }) => {
                assert_eq!((required, capacity), (25, 20));
            }
            other => panic!("expected capacity error, got {:?}", other),
        }
    }

    #[test]
    fn logs_commands_with_output_offsets() {
        let mut log = Vec::new();
        Decoder::for_bytes(&FIXTURE)
            .with_logging(&mut log)
            .decode()
            .unwrap();

        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("0000 - Raw Copy: [61, 62]"));
        assert!(log.contains("0002 - Window Copy: length: 6 offset: 2"));
        assert!(log.contains("000f - RLE Zero (long): 10"));
    }

    #[test]
    fn header_only_stream() {
        assert_eq!(decompress(&[0, 0, 0, 4]).unwrap(), Vec::<u8>::new());
    }
}
