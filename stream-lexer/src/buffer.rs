use stream_common::{Checkpoint, Position};

/// Growable rune arena with a read cursor.
///
/// Input is appended at the end as it arrives; the cursor only moves
/// forward except through [`RuneBuffer::seek`] and [`RuneBuffer::truncate`].
/// A table of line starts turns any rune offset into a [`Position`].
#[derive(Debug, Clone)]
pub struct RuneBuffer {
    runes: Vec<char>,
    current: usize,
    line_starts: Vec<usize>,
    track_lines: bool,
}

impl RuneBuffer {
    pub fn new() -> Self {
        Self::with_capacity(0, true)
    }

    /// Creates an empty buffer. With `track_lines` off every position
    /// reports line 1 and the column is derived from the offset.
    pub fn with_capacity(capacity: usize, track_lines: bool) -> Self {
        Self {
            runes: Vec::with_capacity(capacity),
            current: 0,
            line_starts: vec![0],
            track_lines,
        }
    }

    /// Appends decoded text at the end of the buffer.
    pub fn push_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.runes.push(ch);
            if self.track_lines && ch == '\n' {
                self.line_starts.push(self.runes.len());
            }
        }
    }

    /// Number of runes buffered.
    pub fn len(&self) -> usize {
        self.runes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runes.is_empty()
    }

    /// Current cursor offset.
    pub fn offset(&self) -> usize {
        self.current
    }

    /// Runes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.runes.len() - self.current
    }

    /// Returns true if the cursor reached the end of the buffered input.
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.runes.len()
    }

    /// Returns the rune `n` places after the cursor without advancing.
    pub fn peek(&self, n: usize) -> Option<char> {
        self.runes.get(self.current + n).copied()
    }

    /// Advances the cursor by one rune.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.current += 1;
        Some(ch)
    }

    /// Advances the cursor by up to `n` runes, returning how many were skipped.
    pub fn advance_by(&mut self, n: usize) -> usize {
        let step = n.min(self.remaining());
        self.current += step;
        step
    }

    /// Collects the runes in `from..to` (clamped to the buffer).
    pub fn slice(&self, from: usize, to: usize) -> String {
        let to = to.min(self.runes.len());
        let from = from.min(to);
        self.runes[from..to].iter().collect()
    }

    /// The unread part of the buffer.
    pub fn remaining_str(&self) -> String {
        self.slice(self.current, self.runes.len())
    }

    /// Returns the current position in the source.
    pub fn position(&self) -> Position {
        self.position_at(self.current)
    }

    /// Position of an arbitrary offset; offsets past the end are clamped.
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.runes.len());
        if !self.track_lines {
            return Position::at(1, offset + 1, offset);
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Position::at(line + 1, offset - self.line_starts[line] + 1, offset)
    }

    /// Moves the cursor to `offset`, clamped to the buffered input.
    pub fn seek(&mut self, offset: usize) {
        self.current = offset.min(self.runes.len());
    }

    /// Drops every rune at or after `offset`; the cursor never points past the end.
    pub fn truncate(&mut self, offset: usize) {
        if offset >= self.runes.len() {
            return;
        }
        self.runes.truncate(offset);
        while self.line_starts.last().is_some_and(|&start| start > offset) {
            self.line_starts.pop();
        }
        self.current = self.current.min(offset);
    }

    pub fn clear(&mut self) {
        self.runes.clear();
        self.line_starts.truncate(1);
        self.current = 0;
    }

    /// Creates a checkpoint at the cursor.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.current, self.position())
    }
}

impl Default for RuneBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_table_survives_truncate() {
        let mut buffer = RuneBuffer::new();
        buffer.push_str("a\nb\nc");
        assert_eq!(buffer.position_at(4), Position::at(3, 1, 4));
        buffer.truncate(3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.position_at(3), Position::at(2, 2, 3));
        buffer.push_str("\nz");
        assert_eq!(buffer.position_at(4), Position::at(3, 1, 4));
    }

    #[test]
    fn test_truncate_at_line_start() {
        let mut buffer = RuneBuffer::new();
        buffer.push_str("ab\ncd");
        buffer.truncate(3);
        assert_eq!(buffer.position_at(3), Position::at(2, 1, 3));
    }

    #[test]
    fn test_without_line_tracking() {
        let mut buffer = RuneBuffer::with_capacity(8, false);
        buffer.push_str("a\nb");
        assert_eq!(buffer.position_at(2), Position::at(1, 3, 2));
    }
}
