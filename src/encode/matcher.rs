//! Back-reference and run searches at a single cursor position.

use crate::format::{RLE_LONG_MAX_LENGTH, RLE_SHORT_MAX_LENGTH, WINDOW_COPY_MAX_LENGTH};

use super::Variant;

/// The accurate encoder's run window is cut short near these boundaries
const RUN_BLOCK_SIZE: usize = 0x400;

/// Candidate for a sliding window copy. A `length` of zero means no match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct WindowMatch {
    pub offset: usize,
    pub length: usize,
}

/// Candidate for a run-length command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RunMatch {
    pub value: u8,
    pub length: usize,
}

/// Brute force search for the longest match of `input[cursor..]` in the
/// `variant`'s window behind the cursor.
///
/// Matches may run past the cursor into the data being matched, as the
/// decoder copies one byte at a time. Ties go to the closest offset.
pub(super) fn find_window_match(input: &[u8], cursor: usize, variant: Variant) -> WindowMatch {
    let max_length = (input.len() - cursor).min(WINDOW_COPY_MAX_LENGTH);
    let max_offset = cursor.min(variant.window_size());
    let ahead = &input[cursor..cursor + max_length];

    (1..=max_offset)
        .map(|offset| {
            let length = input[cursor - offset..]
                .iter()
                .zip(ahead)
                .take_while(|(s, d)| s == d)
                .count();

            WindowMatch { offset, length }
        })
        .fold(WindowMatch::default(), |best, cur| {
            if cur.length > best.length {
                cur
            } else {
                best
            }
        })
}

/// Count how many bytes starting at `cursor` repeat the byte at `cursor`,
/// within the `variant`'s limits. The result is always at least one byte.
pub(super) fn find_run(input: &[u8], cursor: usize, variant: Variant) -> RunMatch {
    let value = input[cursor];
    let mut max_length = (input.len() - cursor).min(RLE_LONG_MAX_LENGTH);

    if variant == Variant::Accurate {
        max_length = truncate_run_window(cursor, max_length);
    }
    if value != 0 {
        max_length = max_length.min(variant.max_value_run());
    }

    let length = input[cursor..cursor + max_length]
        .iter()
        .take_while(|&&b| b == value)
        .count();

    RunMatch { value, length }
}

/// The original encoder stops a long run at the first position that lands
/// 33 bytes into a 0x400 byte block.
fn truncate_run_window(cursor: usize, max_length: usize) -> usize {
    if max_length <= RLE_SHORT_MAX_LENGTH {
        return max_length;
    }

    (RLE_SHORT_MAX_LENGTH + 1..=max_length)
        .find(|i| (cursor + i) % RUN_BLOCK_SIZE == RLE_SHORT_MAX_LENGTH)
        .unwrap_or(max_length)
}
