use std::io;

use thiserror::Error;

use crate::format::CommandKind;

/// Possible errors that arise from attempting to convert LZKN64 data into its
/// decompressed form, or vise-versa, and from repacking a ROM's file table.
#[derive(Error, Debug)]
pub enum Lzkn64Error {
    /// The stream (or a command inside it) needs more bytes than are available
    #[error("truncated stream: needed {needed} bytes, but only {available} are available")]
    TruncatedStream { needed: usize, available: usize },

    #[error("declared stream size {0} is smaller than the header")]
    InvalidHeader(u32),

    #[error("output buffer too small: need {required} bytes, capacity is {capacity}")]
    BufferCapacityExceeded { required: usize, capacity: usize },

    #[error("bad lookback: offset of {offset} with only {available} bytes decoded")]
    BadLookBack { offset: usize, available: usize },

    #[error("unknown command {tag:#04x} at stream offset {offset:#x}")]
    InvalidCommand { tag: u8, offset: usize },

    #[error("{kind} command cannot encode a length of {length}")]
    InvalidCommandLength { kind: CommandKind, length: usize },

    #[error("sliding window offset {0} is out of range")]
    InvalidOffset(usize),

    #[error("compressed size {0:#x} does not fit in the stream header")]
    StreamTooLarge(usize),

    #[error("file table entry {index} has an invalid address {address:#010x}")]
    InvalidTableEntry { index: usize, address: u32 },

    #[error("file table (ends at {table_end:#x}) overlaps file data starting at {payload_start:#x}")]
    TableOverlap {
        table_end: usize,
        payload_start: usize,
    },

    #[error("{0}")]
    Io(#[from] io::Error),
}
