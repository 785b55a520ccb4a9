//! Adapters between a [`LexerStream`] and the outside world.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use stream_common::{Flow, TokenRef};

use crate::lexer::LexerStream;
use crate::traits::TokenConsumer;

/// A token consumer that just collects what it receives.
///
/// Clones share the same storage, so one handle can be installed on the
/// stream while another one is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct TokenSink {
    tokens: Rc<RefCell<Vec<TokenRef>>>,
}

impl TokenSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.borrow().is_empty()
    }

    /// Snapshot of the collected tokens.
    pub fn tokens(&self) -> Vec<TokenRef> {
        self.tokens.borrow().clone()
    }

    pub fn take(&self) -> Vec<TokenRef> {
        std::mem::take(&mut *self.tokens.borrow_mut())
    }

    /// Drops tokens starting at or after `offset`, mirroring a lexer `recover`.
    pub fn truncate_from(&self, offset: usize) {
        self.tokens
            .borrow_mut()
            .retain(|token| token.start.offset < offset);
    }
}

impl TokenConsumer for TokenSink {
    fn consume_token(&self, _ctx: &mut LexerStream, token: TokenRef) -> Flow<()> {
        self.tokens.borrow_mut().push(token);
        Ok(())
    }
}

impl io::Write for LexerStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        LexerStream::write(self, buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Seeks in runes, not bytes. Targets before the start or past the buffered
/// input are clamped.
impl io::Seek for LexerStream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        if let Some(err) = self.error() {
            return Err(io::Error::new(io::ErrorKind::Other, err.clone()));
        }
        let target = match pos {
            io::SeekFrom::Start(offset) => i128::from(offset),
            io::SeekFrom::Current(delta) => self.position().offset as i128 + i128::from(delta),
            io::SeekFrom::End(delta) => self.buffered_len() as i128 + i128::from(delta),
        };
        let offset = usize::try_from(target.max(0)).unwrap_or(usize::MAX);
        Ok(LexerStream::seek(self, offset) as u64)
    }
}
