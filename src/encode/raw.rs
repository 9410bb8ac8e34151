use smallvec::SmallVec;

use crate::format::{Command, RAW_COPY_MAX_LENGTH};

/// Commands emitted for one cursor position: at most two raw copies
/// (a final flush can hold 32 bytes) and the selected command.
pub(super) type Batch<'a> = SmallVec<[Command<'a>; 3]>;

/// Tracks the literal bytes that have been skipped since the last command
#[derive(Debug, Default)]
pub(super) struct RawCopyEmitter {
    /// first byte in the input that hasn't been written out
    start: usize,
}

impl RawCopyEmitter {
    /// Number of literal bytes waiting before `cursor`
    pub fn pending(&self, cursor: usize) -> usize {
        cursor - self.start
    }

    /// Split the skipped bytes up to `end` into raw copies and add them to `batch`
    pub fn flush<'a>(&mut self, input: &'a [u8], end: usize, batch: &mut Batch<'a>) {
        batch.extend(
            input[self.start..end]
                .chunks(RAW_COPY_MAX_LENGTH)
                .map(Command::RawCopy),
        );
        self.start = end;
    }

    /// Mark everything before `cursor` as written by a command
    pub fn skip_to(&mut self, cursor: usize) {
        self.start = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_splits_long_spans() {
        let input: Vec<u8> = (0..70).collect();
        let mut raw = RawCopyEmitter::default();
        let mut batch = Batch::new();

        assert_eq!(raw.pending(70), 70);
        raw.flush(&input, 70, &mut batch);

        let lengths: Vec<_> = batch.iter().map(Command::decoded_len).collect();
        assert_eq!(lengths, [31, 31, 8]);
        assert_eq!(batch[2], Command::RawCopy(&input[62..]));
        assert_eq!(raw.pending(70), 0);
    }

    #[test]
    fn empty_flush_is_a_no_op() {
        let input = [0u8; 10];
        let mut raw = RawCopyEmitter::default();
        let mut batch = Batch::new();

        raw.skip_to(10);
        raw.flush(&input, 10, &mut batch);
        assert!(batch.is_empty());
    }
}
