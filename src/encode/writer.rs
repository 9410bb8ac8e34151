use bitstream_io::{BigEndian, BitWriter};

use crate::{
    errors::Lzkn64Error,
    format::{Command, StreamHeader, HEADER_SIZE},
};

use super::Variant;

/// Serializes commands into a caller provided buffer, leaving room for the
/// size header until the stream is finished.
pub(super) struct StreamWriter<'o> {
    header: &'o mut [u8],
    body: BitWriter<&'o mut [u8], BigEndian>,
    capacity: usize,
    /// total bytes written, header included
    position: usize,
}

impl<'o> StreamWriter<'o> {
    pub fn new(output: &'o mut [u8]) -> Result<Self, Lzkn64Error> {
        let capacity = output.len();
        if capacity < HEADER_SIZE {
            return Err(Lzkn64Error::BufferCapacityExceeded {
                required: HEADER_SIZE,
                capacity,
            });
        }

        let (header, body) = output.split_at_mut(HEADER_SIZE);

        Ok(Self {
            header,
            body: BitWriter::endian(body, BigEndian),
            capacity,
            position: HEADER_SIZE,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn push(&mut self, cmd: &Command) -> Result<(), Lzkn64Error> {
        let required = self.position + cmd.encoded_len();
        if required > self.capacity {
            return Err(Lzkn64Error::BufferCapacityExceeded {
                required,
                capacity: self.capacity,
            });
        }

        cmd.write(&mut self.body)?;
        self.position = required;

        Ok(())
    }

    /// Write the size header and return the total size of the stream
    pub fn finish(self, variant: Variant) -> Result<usize, Lzkn64Error> {
        let size = self.position;
        if size > variant.max_stream_size() {
            return Err(Lzkn64Error::StreamTooLarge(size));
        }

        let mut wtr = BitWriter::endian(self.header, BigEndian);
        StreamHeader { size: size as u32 }.write(&mut wtr)?;

        Ok(size)
    }
}
