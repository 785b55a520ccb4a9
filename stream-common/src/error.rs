use crate::{Position, TokenKind};

/// Everything that can go wrong while lexing or parsing a stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid token: expected one of {expected:?}, found {found:?}")]
    InvalidToken {
        expected: Vec<TokenKind>,
        found: TokenKind,
    },

    #[error("no token handler installed")]
    NoTokenHandler,

    #[error("no lexer handler installed")]
    NoLexerHandler,

    #[error("no node handler installed")]
    NoNodeHandler,

    #[error("end of stream")]
    EndOfStream,

    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("expected {0:?}")]
    Expected(String),

    #[error("invalid UTF-8 sequence at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("offset {offset} is outside the buffered input of {len} runes")]
    InvalidOffset { offset: usize, len: usize },

    #[error("composite node closed while it is not the innermost open node")]
    UnbalancedComposite,

    #[error("handler is already installed")]
    HandlerReentry,

    #[error("terminal node is already bound to a token")]
    TerminalAlreadyBound,

    #[error("argument stack is empty")]
    EmptyArgumentStack,

    #[error("unexpected node on the argument stack, expected {expected}")]
    UnexpectedNode { expected: &'static str },

    #[error("stream is busy running a handler")]
    StreamBusy,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Parsing(Box<ParsingError>),
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Errors caused by a broken grammar or misuse of the stream API,
    /// as opposed to errors caused by the input.
    pub fn is_grammar_bug(&self) -> bool {
        match self {
            Error::NoTokenHandler
            | Error::NoLexerHandler
            | Error::NoNodeHandler
            | Error::UnbalancedComposite
            | Error::HandlerReentry
            | Error::TerminalAlreadyBound
            | Error::EmptyArgumentStack
            | Error::UnexpectedNode { .. }
            | Error::StreamBusy => true,
            Error::Parsing(inner) => inner.cause.is_grammar_bug(),
            _ => false,
        }
    }
}

impl From<ParsingError> for Error {
    fn from(err: ParsingError) -> Self {
        Error::Parsing(Box::new(err))
    }
}

/// A classified failure of a stream.
///
/// `position` is where the failure was detected, `recoverable_position` the
/// latest point from which the stream can be resumed with `recover`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{cause} at {position} (recoverable from {recoverable_position})")]
pub struct ParsingError {
    #[source]
    pub cause: Error,
    pub position: Position,
    pub recoverable_position: Position,
    /// Earlier failure that was still stored when this one was recorded.
    pub previous: Option<Box<ParsingError>>,
}

impl ParsingError {
    pub fn new(cause: Error, position: Position, recoverable_position: Position) -> Self {
        Self {
            cause,
            position,
            recoverable_position,
            previous: None,
        }
    }

    /// Appends `older` at the end of this error's chain.
    pub fn chain(mut self, older: ParsingError) -> Self {
        if self == older {
            return self;
        }
        let mut slot = &mut self.previous;
        while let Some(next) = slot {
            slot = &mut next.previous;
        }
        *slot = Some(Box::new(older));
        self
    }

    /// This error followed by every chained predecessor.
    pub fn history(&self) -> impl Iterator<Item = &ParsingError> {
        std::iter::successors(Some(self), |err| err.previous.as_deref())
    }

    pub fn is_grammar_bug(&self) -> bool {
        self.cause.is_grammar_bug()
    }
}
