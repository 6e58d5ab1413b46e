//! Job parameter derivation: output dimensions and fan-out count.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Width used when the size field is absent or unparseable.
pub const DEFAULT_WIDTH: u32 = 1024;

/// Height used when the size field is absent or unparseable.
pub const DEFAULT_HEIGHT: u32 = 1344;

/// Fan-out used when the batch does not request one.
pub const DEFAULT_FANOUT: usize = 4;

pub const MIN_FANOUT: usize = 1;
pub const MAX_FANOUT: usize = 10;

/// Matches the first `<width> x <height>` pair anywhere in a free-form
/// string, e.g. `"Portrait 1024x1344"` or `"768 × 1024 px"`. Each number
/// must stand alone: `"123456x7"` is not a size.
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,5})\s*[xX×*]\s*(\d{1,5})(?:\D|$)").expect("valid regex")
});

/// Output dimensions for every job of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Extract dimensions from a free-form size string.
///
/// Falls back to [`Dimensions::default`] when the input is missing, has no
/// `WxH` pair, or contains a zero/overflowing component.
pub fn parse_size(raw: Option<&str>) -> Dimensions {
    let Some(raw) = raw else {
        return Dimensions::default();
    };

    SIZE_RE
        .captures(raw)
        .and_then(|caps| {
            let width = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let height = caps.get(2)?.as_str().parse::<u32>().ok()?;
            (width > 0 && height > 0).then_some(Dimensions { width, height })
        })
        .unwrap_or_default()
}

/// Clamp a requested fan-out into `[MIN_FANOUT, MAX_FANOUT]`.
///
/// A missing request yields [`DEFAULT_FANOUT`].
pub fn clamp_fanout(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_FANOUT,
        Some(n) if n < MIN_FANOUT as i64 => MIN_FANOUT,
        Some(n) if n > MAX_FANOUT as i64 => MAX_FANOUT,
        Some(n) => n as usize,
    }
}
