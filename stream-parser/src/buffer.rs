use stream_common::TokenRef;

/// Tokens received by the parser, with a read cursor.
///
/// Tokens are only ever appended at the end; a recovery truncates the tail,
/// so the cost of a rewind is proportional to what it discards.
#[derive(Debug, Default)]
pub struct TokenBuffer {
    tokens: Vec<TokenRef>,
    cursor: usize,
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    pub fn push(&mut self, token: TokenRef) {
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Index of the next unread token.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Tokens buffered after the cursor.
    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.cursor
    }

    pub fn get(&self, index: usize) -> Option<&TokenRef> {
        self.tokens.get(index)
    }

    /// Returns the token `n` places after the cursor without advancing.
    pub fn peek(&self, n: usize) -> Option<&TokenRef> {
        self.tokens.get(self.cursor + n)
    }

    /// Advances the cursor by one token.
    pub fn advance(&mut self) -> Option<TokenRef> {
        let token = self.tokens.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(token)
    }

    /// The most recently consumed token.
    pub fn last_consumed(&self) -> Option<&TokenRef> {
        self.cursor.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// Drops every token starting at or after rune `offset`.
    pub fn truncate_from_offset(&mut self, offset: usize) {
        while self
            .tokens
            .last()
            .is_some_and(|token| token.start.offset >= offset)
        {
            self.tokens.pop();
        }
        self.cursor = self.cursor.min(self.tokens.len());
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.cursor = 0;
    }
}
