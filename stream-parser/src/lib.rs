pub mod buffer;
pub mod context;
pub mod node;
pub mod parser;
pub mod streaming;
pub mod traits;

pub use buffer::TokenBuffer;
pub use context::ParseContext;
pub use node::{
    downcast_node, node_as, AsAny, CompositeNode, CompositeNodeBase, Node, NodeRef,
    TerminalNode, TerminalNodeBase,
};
pub use parser::{ParserOptions, ParserStream};
pub use traits::{ParserNodeHandler, ParserTokenHandler};

pub use stream_common::{
    Checkpoint, Error, Flow, Interrupt, ParsingError, Position, Token, TokenKind, TokenRef,
};
pub use stream_lexer::{LexerHandler, LexerOptions, LexerStream};
