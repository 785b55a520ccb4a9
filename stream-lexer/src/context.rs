//! Reading operations available to lexical handlers.
//!
//! Reads past the end of an open stream raise `Interrupt::Suspend`; once the
//! stream is closed they report end of input with `None` / `false` instead.

use regex::Regex;
use stream_common::{Error, Flow, Interrupt};

use crate::lexer::LexerStream;

impl LexerStream {
    /// Consumes one rune.
    pub fn next_char(&mut self) -> Flow<Option<char>> {
        match self.buffer_mut().advance() {
            Some(ch) => Ok(Some(ch)),
            None if self.is_closed() => Ok(None),
            None => Err(Interrupt::Suspend),
        }
    }

    /// Looks `n` runes ahead of the cursor without consuming.
    pub fn la(&self, n: usize) -> Flow<Option<char>> {
        match self.buffer().peek(n) {
            Some(ch) => Ok(Some(ch)),
            None if self.is_closed() => Ok(None),
            None => Err(Interrupt::Suspend),
        }
    }

    /// Runes buffered after the cursor.
    pub fn remaining(&self) -> usize {
        self.buffer().remaining()
    }

    /// Copy of the unread part of the buffer.
    pub fn peek_buffer(&self) -> String {
        self.buffer().remaining_str()
    }

    /// Checks whether the input at the cursor starts with `pattern`.
    ///
    /// Suspends while the buffered runes are a proper prefix of the pattern.
    pub fn peek_match(&self, pattern: &str) -> Flow<bool> {
        for (ahead, expected) in pattern.chars().enumerate() {
            match self.la(ahead)? {
                Some(ch) if ch == expected => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Consumes `pattern` if the input starts with it.
    pub fn try_match(&mut self, pattern: &str) -> Flow<bool> {
        if !self.peek_match(pattern)? {
            return Ok(false);
        }
        self.buffer_mut().advance_by(pattern.chars().count());
        Ok(true)
    }

    /// Consumes `pattern` or fails with `Error::Expected`.
    pub fn expect(&mut self, pattern: &str) -> Flow<()> {
        if self.try_match(pattern)? {
            Ok(())
        } else {
            Err(Error::Expected(pattern.to_owned()).into())
        }
    }

    /// Matches `pattern` anchored at the cursor and returns its capture groups
    /// (group 0 is the whole match, unmatched groups are empty strings).
    ///
    /// A match that reaches the end of an open buffer suspends, since more
    /// input could extend it. Patterns should be written so that a mismatch
    /// can be decided from the runes already buffered.
    pub fn peek_match_regex(&self, pattern: &Regex) -> Flow<Option<Vec<String>>> {
        let rest = self.peek_buffer();
        if rest.is_empty() && !self.is_closed() {
            return Err(Interrupt::Suspend);
        }
        let Some(captures) = pattern.captures(&rest) else {
            return Ok(None);
        };
        let Some(whole) = captures.get(0) else {
            return Ok(None);
        };
        if whole.start() != 0 {
            return Ok(None);
        }
        if whole.end() == rest.len() && !self.is_closed() {
            return Err(Interrupt::Suspend);
        }
        Ok(Some(
            captures
                .iter()
                .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
                .collect(),
        ))
    }

    /// Like [`LexerStream::peek_match_regex`], consuming the match.
    pub fn try_match_regex(&mut self, pattern: &Regex) -> Flow<Option<Vec<String>>> {
        let Some(groups) = self.peek_match_regex(pattern)? else {
            return Ok(None);
        };
        let consumed = groups.first().map_or(0, |whole| whole.chars().count());
        self.buffer_mut().advance_by(consumed);
        Ok(Some(groups))
    }

    pub fn expect_regex(&mut self, pattern: &Regex) -> Flow<Vec<String>> {
        match self.try_match_regex(pattern)? {
            Some(groups) => Ok(groups),
            None => Err(Error::Expected(pattern.as_str().to_owned()).into()),
        }
    }
}
