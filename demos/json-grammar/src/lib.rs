//! JSON Grammar
//!
//! A small JSON grammar written against `stream-parser`.

pub mod lexer;
pub mod nodes;
pub mod parser;
pub mod value;

pub use lexer::{
    kind_name, lex, CLOSE_ARRAY, CLOSE_OBJECT, COLON, COMMA, IDENT, NUMBER, OPEN_ARRAY,
    OPEN_OBJECT, STRING,
};
pub use nodes::{describe, unescape, Array, JsonString, Literal, Number, Object, Pair, Root};
pub use parser::{parse, parse_chunked, JsonParser};
pub use value::Value;
