use crate::Position;

/// A point a stream can be rewound to.
///
/// Returned by `recover` on both streams. For a lexer `index` is the rune
/// offset of the rewind point, for a parser it is the index of the first
/// token that has to arrive again. [`Checkpoint::offset`] is the rune offset
/// in both cases, so the caller knows which part of its input to feed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    index: usize,
    position: Position,
}

impl Checkpoint {
    /// Creates a new checkpoint with the given index and position.
    pub fn new(index: usize, position: Position) -> Self {
        Self { index, position }
    }

    /// Returns the index stored in this checkpoint.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the position stored in this checkpoint.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Rune offset of the checkpoint, the first rune that has to be written again.
    pub fn offset(&self) -> usize {
        self.position.offset
    }
}
