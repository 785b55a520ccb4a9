pub mod buffer;
pub mod context;
pub mod lexer;
pub mod streaming;
pub mod traits;

pub use buffer::RuneBuffer;
pub use lexer::{LexerOptions, LexerStream};
pub use streaming::TokenSink;
pub use traits::{same_handler, LexerHandler, TokenConsumer};

pub use stream_common::{
    Checkpoint, Error, Flow, Interrupt, ParsingError, Position, Token, TokenKind, TokenRef,
};
