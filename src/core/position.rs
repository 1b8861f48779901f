/*!
# Source locations

Byte spans stored on every document node and value, and the line index that turns an offset into
a line and column for diagnostics and CLI output.
*/

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Zero-based line and column (in bytes) of a source offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Offset and length of a piece of the source text. `u32` keeps arena entries small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PackedSpan {
    pub start: u32,
    pub len: u32,
}

impl PackedSpan {
    pub fn new(start: u32, len: u32) -> Self { Self { start, len } }
    pub fn end(&self) -> u32 { self.start + self.len }

    /// Span covering `start..end`; an inverted pair gives an empty span at `start`.
    pub fn between(start: usize, end: usize) -> Self {
        Self { start: start as u32, len: end.saturating_sub(start) as u32 }
    }

    pub fn range(&self) -> Range<usize> { self.start as usize..self.end() as usize }
}

impl From<Range<usize>> for PackedSpan {
    fn from(range: Range<usize>) -> Self { Self::between(range.start, range.end) }
}

/// Start offsets of the lines of one text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let newlines = text.bytes().enumerate().filter(|(_, b)| *b == b'\n').map(|(i, _)| i as u32 + 1);
        Self { line_starts: std::iter::once(0).chain(newlines).collect() }
    }

    pub fn to_position(&self, offset: u32) -> Position {
        // line_starts[0] == 0, так что partition_point >= 1
        let line = self.line_starts.partition_point(|start| *start <= offset).saturating_sub(1);
        Position { line, column: (offset - self.line_starts[line]) as usize }
    }
}
