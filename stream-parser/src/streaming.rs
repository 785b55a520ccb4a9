//! Glue between the lexer and the parser, and `io::Write` support.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use stream_common::{Error, Flow, Interrupt, TokenRef};
use stream_lexer::{LexerStream, TokenConsumer};

use crate::parser::{ParserState, ParserStream};

/// The lexer's bottom token consumer: buffers each token and runs the
/// parser's handlers right away.
pub(crate) struct ParserFeed {
    state: Rc<RefCell<ParserState>>,
}

impl ParserFeed {
    pub(crate) fn new(state: Rc<RefCell<ParserState>>) -> Self {
        Self { state }
    }
}

impl TokenConsumer for ParserFeed {
    fn consume_token(&self, lexer: &mut LexerStream, token: TokenRef) -> Flow<()> {
        // a parser handler that makes the lexer emit tokens lands here
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| Error::StreamBusy)?;
        state.tokens.push(token);
        state.advance(lexer).map_err(Interrupt::from)
    }
}

impl io::Write for ParserStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ParserStream::write(self, buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
