//! Stream Common
//!
//! Shared pieces of `stream-lexer` and `stream-parser`.

pub mod checkpoint;
pub mod error;
pub mod position;
pub mod streaming;
pub mod token;

pub use checkpoint::Checkpoint;
pub use error::{Error, ParsingError};
pub use position::Position;
pub use streaming::{Flow, Interrupt};
pub use token::{Token, TokenKind, TokenRef};
