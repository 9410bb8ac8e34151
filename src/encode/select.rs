use crate::format::{Command, MIN_LENGTH, RLE_LONG_MAX_LENGTH, RLE_SHORT_ZERO_MAX_LENGTH};

use super::{
    matcher::{RunMatch, WindowMatch},
    Variant,
};

/// Shortest run worth a command, unless it is a run of zeroes
const MIN_RUN: usize = 3;

/// Pick the command to emit at the cursor from the two candidate matches.
/// `None` means the byte at the cursor should be stored as a literal.
pub(super) fn select(variant: Variant, window: WindowMatch, run: RunMatch) -> Option<Command<'static>> {
    if variant.prefers_window(window, run) {
        return Some(Command::WindowCopy {
            offset: window.offset,
            length: window.length,
        });
    }

    match run {
        RunMatch { value: 0, length } if length >= MIN_RUN => {
            if length <= RLE_SHORT_ZERO_MAX_LENGTH {
                Some(Command::RleShortZero(length))
            } else if length <= RLE_LONG_MAX_LENGTH {
                Some(Command::RleLongZero(length))
            } else {
                None
            }
        }
        RunMatch { value, length } if length >= MIN_RUN => {
            if length <= variant.max_value_run() {
                Some(Command::RleValue { value, length })
            } else {
                None
            }
        }
        RunMatch { value: 0, length: MIN_LENGTH } => Some(Command::RleShortZero(MIN_LENGTH)),
        _ => None,
    }
}

impl Variant {
    fn prefers_window(self, window: WindowMatch, run: RunMatch) -> bool {
        match self {
            Self::Efficient => window.length >= 3,
            Self::Accurate => window.length >= 4 && window.length > run.length,
        }
    }
}
