use std::rc::Rc;

use stream_common::{Checkpoint, Error, ParsingError};
use stream_parser::{NodeRef, ParserOptions, ParserStream};
use tracing::debug;

use crate::lexer::lex;
use crate::nodes::Root;
use crate::value::Value;

/// A [`ParserStream`] wired with the JSON rules.
pub struct JsonParser {
    stream: ParserStream,
    root: Rc<Root>,
}

impl JsonParser {
    pub fn new() -> Self {
        let root = Rc::new(Root::default());
        let stream = ParserStream::with_handlers(Rc::new(lex), root.clone());
        Self { stream, root }
    }

    pub fn with_options(options: ParserOptions) -> Result<Self, Error> {
        let root = Rc::new(Root::default());
        let mut stream = ParserStream::with_options(options);
        stream.push_lexer_handler(Rc::new(lex))?;
        stream.push_token_parser(root.clone())?;
        Ok(Self { stream, root })
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ParsingError> {
        self.stream.write(bytes)
    }

    pub fn close(&mut self) -> Result<(), ParsingError> {
        self.stream.close()
    }

    /// Rewinds after a failure; top-level values that do not end before the
    /// checkpoint are dropped as well. A value the requested offset falls
    /// inside moves the checkpoint back to its start.
    pub fn recover(&mut self, offset: usize) -> Result<Checkpoint, Error> {
        let mut checkpoint = self.stream.recover(offset)?;
        while let Some(start) = self.root.straddling(checkpoint.offset()) {
            checkpoint = self.stream.recover(start)?;
        }
        self.root.truncate_from(checkpoint.offset());
        debug!(offset = checkpoint.offset(), kept = self.root.len(), "json parser recovered");
        Ok(checkpoint)
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.stream.reset()?;
        self.root.clear();
        Ok(())
    }

    pub fn error(&self) -> Option<ParsingError> {
        self.stream.error()
    }

    pub fn stream(&self) -> &ParserStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut ParserStream {
        &mut self.stream
    }

    /// Completed top-level nodes.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.root.values()
    }

    pub fn values(&self) -> Vec<Value> {
        self.root.values().iter().filter_map(Value::from_node).collect()
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse(input: &str) -> Result<Vec<Value>, ParsingError> {
    parse_chunked(input.as_bytes(), input.len())
}

/// Parses `input` fed in `chunk`-byte writes.
pub fn parse_chunked(input: &[u8], chunk: usize) -> Result<Vec<Value>, ParsingError> {
    let mut parser = JsonParser::new();
    for piece in input.chunks(chunk.max(1)) {
        parser.write(piece)?;
    }
    parser.close()?;
    Ok(parser.values())
}
