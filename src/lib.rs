//! Compress and decompress LZKN64 data, the LZ77 and run-length format used by
//! Konami's Nintendo 64 titles.
//!
//! Two encoders are available. [`Variant::Accurate`] reproduces the output of
//! the original compressor byte-for-byte, so that rebuilt game data matches the
//! original ROM. [`Variant::Efficient`] searches a slightly larger window for
//! marginally smaller output. Any LZKN64 stream is decoded by [`decompress`].
//!
//! ```
//! let data = b"a string that repeats, a string that repeats, a string that repeats";
//! let compressed = lzkn64::compress_accurate(data).unwrap();
//! assert!(compressed.len() < data.len());
//! assert_eq!(lzkn64::decompress(&compressed).unwrap(), &data[..]);
//! ```
//!
//! The [`EncoderBuilder`] and [`Decoder`] types give more control over the
//! input, output, and logging. The [`format`] module describes the stream layout,
//! and the [`archive`] module repacks the file table of a ROM.

pub mod archive;
mod decode;
mod encode;
mod errors;
pub mod format;

pub use decode::{decompress, stream_info, Decoder, StreamInfo};
pub use encode::{compress_accurate, compress_efficient, encode, EncoderBuilder, Variant};
pub use errors::Lzkn64Error;
pub use format::{
    commands, max_compressed_size, Command, CommandKind, Commands, StreamHeader, HEADER_SIZE,
};
