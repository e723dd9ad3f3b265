//! Text ranges used by the descriptor parsers to point back into source files.

pub use text_size::{TextRange, TextSize};

/// Converts a byte offset into a [`TextSize`], saturating on (unrealistically) huge inputs.
#[inline]
pub fn text_size(offset: usize) -> TextSize {
    TextSize::from(u32::try_from(offset).unwrap_or(u32::MAX))
}

/// Builds a [`TextRange`] from byte offsets.
#[inline]
pub fn text_range(start: usize, end: usize) -> TextRange {
    TextRange::new(text_size(start), text_size(end))
}
