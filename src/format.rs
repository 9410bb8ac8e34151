//! Information and structures for LZKN64 streams.
//!
//! An LZKN64 stream is a four byte header followed by a sequence of byte-aligned
//! commands. There is no trailer; the header tells the decoder where the commands end.
//!
//! ## Header
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | big endian size of the whole stream, header included |
//!
//! The top bit of the size is reserved for archive flags and is ignored when reading.
//! The header can be extracted into a [`StreamHeader`] with [`StreamHeader::from_bytes`].
//!
//! ## Commands
//! | Command            | First byte  | Layout                  | Extra bytes      | Output length |
//! | ------------------ | ----------- | ----------------------- | ---------------- | ------------- |
//! | Sliding window copy| `0x00-0x7F` | `0LLLLLOO OOOOOOOO`     | -                | `L + 2`       |
//! | Raw copy           | `0x80-0x9F` | `100LLLLL`              | `L` literals     | `L`           |
//! | RLE any value      | `0xC0-0xDF` | `110LLLLL`              | value            | `L + 2`       |
//! | RLE short zero     | `0xE0-0xFE` | `111LLLLL`              | -                | `L + 2`       |
//! | RLE long zero      | `0xFF`      | `11111111`              | `L`              | `L + 2`       |
//!
//! `0xA0-0xBF` is not assigned to any command. The sliding window copy stores a ten bit
//! offset back into the already decoded output, which may be shorter than the length
//! to repeat a pattern.
//!
//! ## An Example
//! The string "abababab" followed by four zeroes could be compressed as:
//! ```text
//! 0000000A <- stream size of 10 bytes
//! 82 61 62 <- raw copy "ab"
//! 10 02    <- copy 4 + 2 bytes from 2 bytes back: 0 00100 0000000010
//! E2       <- four zeroes
//! ```

use crate::errors::Lzkn64Error;
use bitstream_io::{BigEndian, BitReader, BitWriter};
use std::{fmt, io::Write};

/// Size of the stream header in bytes
pub const HEADER_SIZE: usize = 4;

// every length field is five bits, except for the long zero run
const LENGTH_MASK: u8 = 0x1F;
// lengths are stored with this subtracted (raw copies excepted)
pub(crate) const MIN_LENGTH: usize = 2;

pub(crate) const WINDOW_COPY_MAX_OFFSET: usize = 0x3FF;
pub(crate) const WINDOW_COPY_MAX_LENGTH: usize = LENGTH_MASK as usize + MIN_LENGTH;
pub(crate) const RAW_COPY_MAX_LENGTH: usize = LENGTH_MASK as usize;
pub(crate) const RLE_SHORT_MAX_LENGTH: usize = LENGTH_MASK as usize + MIN_LENGTH;
/// `0xE0 | 0x1F` is the long zero run tag
pub(crate) const RLE_SHORT_ZERO_MAX_LENGTH: usize = RLE_SHORT_MAX_LENGTH - 1;
pub(crate) const RLE_LONG_MAX_LENGTH: usize = 0xFF + MIN_LENGTH;

const RAW_COPY_PREFIX: u8 = 0b100;
const RLE_VALUE_PREFIX: u8 = 0b110;
const RLE_SHORT_ZERO_PREFIX: u8 = 0b111;
const RLE_LONG_ZERO_TAG: u8 = 0xFF;

/// Upper bound on the compressed size of `input_size` bytes: the header,
/// plus every 31 literal bytes turning into a 32 byte raw copy.
pub const fn max_compressed_size(input_size: usize) -> usize {
    HEADER_SIZE + input_size + (input_size + RAW_COPY_MAX_LENGTH - 1) / RAW_COPY_MAX_LENGTH
}

/// The information stored at the start of an LZKN64 stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// size of the compressed stream, including the header
    pub size: u32,
}

impl StreamHeader {
    pub(crate) const RESERVED_FLAG: u32 = 0x8000_0000;

    /// Parse the header at the start of `input`, and check that `input` holds the
    /// whole stream.
    pub fn from_bytes(input: &[u8]) -> Result<Self, Lzkn64Error> {
        let raw: [u8; HEADER_SIZE] = input
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or(Lzkn64Error::TruncatedStream {
                needed: HEADER_SIZE,
                available: input.len(),
            })?;

        let size = u32::from_be_bytes(raw) & !Self::RESERVED_FLAG;
        if (size as usize) < HEADER_SIZE {
            return Err(Lzkn64Error::InvalidHeader(size));
        }
        if size as usize > input.len() {
            return Err(Lzkn64Error::TruncatedStream {
                needed: size as usize,
                available: input.len(),
            });
        }

        Ok(Self { size })
    }

    /// Write out `self` to the big endian `BitWriter`
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, BigEndian>) -> Result<(), Lzkn64Error> {
        wtr.write(32, self.size).map_err(Into::into)
    }
}

/// The five kinds of LZKN64 commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    WindowCopy,
    RawCopy,
    RleValue,
    RleShortZero,
    RleLongZero,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WindowCopy => write!(f, "sliding window copy"),
            Self::RawCopy => write!(f, "raw copy"),
            Self::RleValue => write!(f, "RLE (any value)"),
            Self::RleShortZero => write!(f, "RLE (short zero)"),
            Self::RleLongZero => write!(f, "RLE (long zero)"),
        }
    }
}

/// A single decoded (or to be encoded) command.
///
/// All lengths are the number of output bytes the command produces,
/// not the value stored in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Copy `length` bytes from `offset` bytes back in the output
    WindowCopy { offset: usize, length: usize },
    /// Copy literal bytes from the stream
    RawCopy(&'a [u8]),
    /// Write `value` `length` times
    RleValue { value: u8, length: usize },
    RleShortZero(usize),
    RleLongZero(usize),
}

impl<'a> Command<'a> {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::WindowCopy { .. } => CommandKind::WindowCopy,
            Self::RawCopy(..) => CommandKind::RawCopy,
            Self::RleValue { .. } => CommandKind::RleValue,
            Self::RleShortZero(..) => CommandKind::RleShortZero,
            Self::RleLongZero(..) => CommandKind::RleLongZero,
        }
    }

    /// Number of bytes this command produces when decoded
    pub fn decoded_len(&self) -> usize {
        match *self {
            Self::WindowCopy { length, .. } => length,
            Self::RawCopy(bytes) => bytes.len(),
            Self::RleValue { length, .. } => length,
            Self::RleShortZero(length) | Self::RleLongZero(length) => length,
        }
    }

    /// Number of bytes this command takes up in the stream
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::RawCopy(bytes) => 1 + bytes.len(),
            Self::RleShortZero(..) => 1,
            Self::WindowCopy { .. } | Self::RleValue { .. } | Self::RleLongZero(..) => 2,
        }
    }

    /// Check that the command can be represented in the stream
    pub fn validate(&self) -> Result<(), Lzkn64Error> {
        let (min, max) = match *self {
            Self::WindowCopy { offset, .. } => {
                if offset == 0 || offset > WINDOW_COPY_MAX_OFFSET {
                    return Err(Lzkn64Error::InvalidOffset(offset));
                }
                (MIN_LENGTH, WINDOW_COPY_MAX_LENGTH)
            }
            Self::RawCopy(..) => (1, RAW_COPY_MAX_LENGTH),
            Self::RleValue { .. } => (MIN_LENGTH, RLE_SHORT_MAX_LENGTH),
            Self::RleShortZero(..) => (MIN_LENGTH, RLE_SHORT_ZERO_MAX_LENGTH),
            Self::RleLongZero(..) => (MIN_LENGTH, RLE_LONG_MAX_LENGTH),
        };

        let length = self.decoded_len();
        if length < min || length > max {
            return Err(Lzkn64Error::InvalidCommandLength {
                kind: self.kind(),
                length,
            });
        }

        Ok(())
    }

    /// Write `self` to the big endian `BitWriter` in the LZKN64 format
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, BigEndian>) -> Result<(), Lzkn64Error> {
        self.validate()?;

        match *self {
            Self::WindowCopy { offset, length } => {
                wtr.write_bit(false)?;
                wtr.write(5, (length - MIN_LENGTH) as u8)?;
                wtr.write(10, offset as u16)?;
            }
            Self::RawCopy(bytes) => {
                wtr.write(3, RAW_COPY_PREFIX)?;
                wtr.write(5, bytes.len() as u8)?;
                wtr.write_bytes(bytes)?;
            }
            Self::RleValue { value, length } => {
                wtr.write(3, RLE_VALUE_PREFIX)?;
                wtr.write(5, (length - MIN_LENGTH) as u8)?;
                wtr.write(8, value)?;
            }
            Self::RleShortZero(length) => {
                wtr.write(3, RLE_SHORT_ZERO_PREFIX)?;
                wtr.write(5, (length - MIN_LENGTH) as u8)?;
            }
            Self::RleLongZero(length) => {
                wtr.write(8, RLE_LONG_ZERO_TAG)?;
                wtr.write(8, (length - MIN_LENGTH) as u8)?;
            }
        }

        Ok(())
    }

    /// Parse the command starting at `stream[at]`. `stream` must end where the
    /// header says the stream ends.
    pub(crate) fn parse(stream: &'a [u8], at: usize) -> Result<Self, Lzkn64Error> {
        let take = move |n: usize| {
            stream
                .get(at..at + n)
                .ok_or(Lzkn64Error::TruncatedStream {
                    needed: at + n,
                    available: stream.len(),
                })
        };

        let tag = take(1)?[0];
        let length = (tag & LENGTH_MASK) as usize;

        let cmd = match tag {
            0x00..=0x7F => {
                let mut bits = BitReader::endian(take(2)?, BigEndian);
                bits.read_bit()?;
                let length: u8 = bits.read(5)?;
                let offset: u16 = bits.read(10)?;

                Self::WindowCopy {
                    offset: offset as usize,
                    length: length as usize + MIN_LENGTH,
                }
            }
            0x80..=0x9F => Self::RawCopy(&take(1 + length)?[1..]),
            0xC0..=0xDF => Self::RleValue {
                value: take(2)?[1],
                length: length + MIN_LENGTH,
            },
            0xE0..=0xFE => Self::RleShortZero(length + MIN_LENGTH),
            RLE_LONG_ZERO_TAG => Self::RleLongZero(take(2)?[1] as usize + MIN_LENGTH),
            _ => return Err(Lzkn64Error::InvalidCommand { tag, offset: at }),
        };

        Ok(cmd)
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WindowCopy { offset, length } => {
                write!(f, "Window Copy: length: {} offset: {}", length, offset)
            }
            Self::RawCopy(bytes) => write!(f, "Raw Copy: {:02x?}", bytes),
            Self::RleValue { value, length } => write!(f, "RLE: {:02x} x {}", value, length),
            Self::RleShortZero(length) => write!(f, "RLE Zero (short): {}", length),
            Self::RleLongZero(length) => write!(f, "RLE Zero (long): {}", length),
        }
    }
}

/// Iterator over the commands of an LZKN64 stream, along with the stream
/// offset of each command. Stops after the first error.
#[derive(Debug, Clone)]
pub struct Commands<'a> {
    stream: &'a [u8],
    pos: usize,
}

impl<'a> Commands<'a> {
    fn new(input: &'a [u8]) -> Result<Self, Lzkn64Error> {
        let header = StreamHeader::from_bytes(input)?;

        Ok(Self {
            stream: &input[..header.size as usize],
            pos: HEADER_SIZE,
        })
    }
}

impl<'a> Iterator for Commands<'a> {
    type Item = Result<(usize, Command<'a>), Lzkn64Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.stream.len() {
            return None;
        }

        let at = self.pos;
        match Command::parse(self.stream, at) {
            Ok(cmd) => {
                self.pos += cmd.encoded_len();
                Some(Ok((at, cmd)))
            }
            Err(e) => {
                self.pos = self.stream.len();
                Some(Err(e))
            }
        }
    }
}

/// Iterate over the commands in the LZKN64 stream `input`
///
/// ```
/// # use lzkn64::{commands, Command};
/// let stream = [0x00, 0x00, 0x00, 0x07, 0x81, 0x41, 0xE1];
/// let cmds = commands(&stream)
///     .unwrap()
///     .map(|c| c.map(|(_, cmd)| cmd))
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
/// assert_eq!(cmds, [Command::RawCopy(b"A"), Command::RleShortZero(3)]);
/// ```
pub fn commands(input: &[u8]) -> Result<Commands<'_>, Lzkn64Error> {
    Commands::new(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(cmd: Command) -> Result<Vec<u8>, Lzkn64Error> {
        let mut buf = Vec::new();
        {
            let mut wtr = BitWriter::endian(&mut buf, BigEndian);
            cmd.write(&mut wtr)?;
        }
        Ok(buf)
    }

    #[test]
    fn window_copy_bit_layout() {
        let cmds = [
            (Command::WindowCopy { offset: 0x3FF, length: 33 }, [0x7F, 0xFF]),
            (Command::WindowCopy { offset: 0x123, length: 5 }, [0x0D, 0x23]),
            (Command::WindowCopy { offset: 1, length: 2 }, [0x00, 0x01]),
        ];

        for &(cmd, bytes) in &cmds {
            assert_eq!(to_bytes(cmd).unwrap(), bytes, "writing {}", cmd);
            assert_eq!(Command::parse(&bytes, 0).unwrap(), cmd);
        }
    }

    #[test]
    fn single_byte_tags() {
        assert_eq!(to_bytes(Command::RleShortZero(2)).unwrap(), [0xE0]);
        assert_eq!(to_bytes(Command::RleShortZero(32)).unwrap(), [0xFE]);
        assert_eq!(to_bytes(Command::RleLongZero(257)).unwrap(), [0xFF, 0xFF]);
        assert_eq!(to_bytes(Command::RleLongZero(33)).unwrap(), [0xFF, 0x1F]);
        assert_eq!(
            to_bytes(Command::RleValue { value: 0x41, length: 33 }).unwrap(),
            [0xDF, 0x41]
        );
        assert_eq!(
            to_bytes(Command::RawCopy(b"xyz")).unwrap(),
            [0x83, b'x', b'y', b'z']
        );
    }

    #[test]
    fn short_zero_of_33_collides_with_long_zero() {
        // 0xE0 | (33 - 2) would be read back as a long zero run
        match Command::RleShortZero(33).validate() {
            Err(Lzkn64Error::InvalidCommandLength { kind, length }) => {
                assert_eq!(kind, CommandKind::RleShortZero);
                assert_eq!(length, 33);
            }
            other => panic!("expected a length error, got {:?}", other),
        }
        assert_eq!(
            Command::parse(&[0xFF, 0x1F], 0).unwrap(),
            Command::RleLongZero(33)
        );
    }

    #[test]
    fn out_of_range_commands() {
        assert!(Command::RawCopy(&[0; 32]).validate().is_err());
        assert!(Command::RawCopy(&[]).validate().is_err());
        assert!(Command::RleLongZero(258).validate().is_err());
        assert!(Command::RleValue { value: 1, length: 34 }.validate().is_err());
        assert!(matches!(
            Command::WindowCopy { offset: 1024, length: 4 }.validate(),
            Err(Lzkn64Error::InvalidOffset(1024))
        ));
        assert!(matches!(
            Command::WindowCopy { offset: 0, length: 4 }.validate(),
            Err(Lzkn64Error::InvalidOffset(0))
        ));
    }

    #[test]
    fn unassigned_tags() {
        for tag in 0xA0..=0xBF {
            match Command::parse(&[tag, 0, 0], 0) {
                Err(Lzkn64Error::InvalidCommand { tag: t, offset: 0 }) => assert_eq!(t, tag),
                other => panic!("tag {:02x} gave {:?}", tag, other),
            }
        }
    }

    #[test]
    fn payload_past_end() {
        match Command::parse(&[0x85, 1, 2], 0) {
            Err(Lzkn64Error::TruncatedStream { needed, available }) => {
                assert_eq!((needed, available), (6, 3));
            }
            other => panic!("expected truncation, got {:?}", other),
        }
        assert!(Command::parse(&[0x04], 0).is_err());
        assert!(Command::parse(&[0xC4], 0).is_err());
        assert!(Command::parse(&[0xFF], 0).is_err());
    }

    #[test]
    fn header_parsing() {
        let hdr = StreamHeader::from_bytes(&[0x80, 0x00, 0x00, 0x05, 0xE0]).unwrap();
        assert_eq!(hdr.size, 5);

        assert!(matches!(
            StreamHeader::from_bytes(&[0x00, 0x00, 0x00, 0x02]),
            Err(Lzkn64Error::InvalidHeader(2))
        ));
        assert!(matches!(
            StreamHeader::from_bytes(&[0x00, 0x00]),
            Err(Lzkn64Error::TruncatedStream { needed: 4, available: 2 })
        ));
        assert!(matches!(
            StreamHeader::from_bytes(&[0x00, 0x00, 0x01, 0x00, 0xE0]),
            Err(Lzkn64Error::TruncatedStream { needed: 0x100, available: 5 })
        ));
    }

    #[test]
    fn iterate_with_offsets() {
        let stream = [0x00, 0x00, 0x00, 0x0A, 0x82, b'a', b'b', 0x00, 0x02, 0xE0];
        let cmds: Vec<_> = commands(&stream)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            cmds,
            [
                (4, Command::RawCopy(b"ab")),
                (7, Command::WindowCopy { offset: 2, length: 2 }),
                (9, Command::RleShortZero(2)),
            ]
        );
    }

    #[test]
    fn worst_case_bound() {
        assert_eq!(max_compressed_size(0), 4);
        assert_eq!(max_compressed_size(31), 4 + 32);
        assert_eq!(max_compressed_size(32), 4 + 34);
    }
}
