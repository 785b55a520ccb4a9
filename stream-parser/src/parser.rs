use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use stream_common::{Checkpoint, Error, Interrupt, ParsingError, Position, TokenRef};
use stream_lexer::{same_handler, LexerHandler, LexerOptions, LexerStream, TokenConsumer};
use tracing::{debug, warn};

use crate::buffer::TokenBuffer;
use crate::context::ParseContext;
use crate::node::{downcast_node, node_start, Node, NodeRef};
use crate::streaming::ParserFeed;
use crate::traits::{ParserNodeHandler, ParserTokenHandler};

/// Tunables of a [`ParserStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    pub lexer: LexerOptions,
    /// Tokens reserved up front in the token buffer.
    pub token_capacity: usize,
    /// How many times in a row handlers may be swapped without consuming a token.
    pub max_shift_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            lexer: LexerOptions::default(),
            token_capacity: 256,
            max_shift_depth: 1024,
        }
    }
}

impl ParserOptions {
    pub fn lexer(mut self, options: LexerOptions) -> Self {
        self.lexer = options;
        self
    }

    pub fn token_capacity(mut self, capacity: usize) -> Self {
        self.token_capacity = capacity;
        self
    }

    pub fn max_shift_depth(mut self, depth: usize) -> Self {
        self.max_shift_depth = depth;
        self
    }
}

/// An entry of the open-node stack, with the handlers it installed.
pub(crate) struct OpenNode {
    pub(crate) node: NodeRef,
    pub(crate) start: Position,
    pub(crate) token_handler: Option<Rc<dyn ParserTokenHandler>>,
    pub(crate) lexer_handler: Option<Rc<dyn LexerHandler>>,
}

/// Everything a parser owns besides its lexer.
pub(crate) struct ParserState {
    pub(crate) tokens: TokenBuffer,
    pub(crate) open: Vec<OpenNode>,
    pub(crate) arguments: Vec<NodeRef>,
    pub(crate) token_handlers: Vec<Rc<dyn ParserTokenHandler>>,
    pub(crate) node_handlers: Vec<Rc<dyn ParserNodeHandler>>,
    pub(crate) error: Option<ParsingError>,
    pub(crate) running: bool,
    /// Index of the furthest token a handler looked at.
    pub(crate) furthest: usize,
    pub(crate) options: ParserOptions,
}

impl ParserState {
    fn new(options: ParserOptions) -> Self {
        Self {
            tokens: TokenBuffer::with_capacity(options.token_capacity),
            open: Vec::new(),
            arguments: Vec::new(),
            token_handlers: Vec::new(),
            node_handlers: Vec::new(),
            error: None,
            running: false,
            furthest: 0,
            options,
        }
    }

    pub(crate) fn examine(&mut self, index: usize) {
        self.furthest = self.furthest.max(index);
    }

    pub(crate) fn current_node(&self) -> Option<NodeRef> {
        self.open.last().map(|entry| Rc::clone(&entry.node))
    }

    pub(crate) fn current_path(&self) -> Vec<NodeRef> {
        self.open.iter().map(|entry| Rc::clone(&entry.node)).collect()
    }

    pub(crate) fn has_token_handler(&self, handler: &Rc<dyn ParserTokenHandler>) -> bool {
        self.token_handlers
            .iter()
            .any(|installed| same_handler(installed, handler))
    }

    pub(crate) fn push_token_parser(
        &mut self,
        handler: Rc<dyn ParserTokenHandler>,
    ) -> Result<(), Error> {
        if self.has_token_handler(&handler) {
            return Err(Error::HandlerReentry);
        }
        self.token_handlers.push(handler);
        Ok(())
    }

    pub(crate) fn remove_token_handler(&mut self, handler: &Rc<dyn ParserTokenHandler>) {
        if let Some(index) = self
            .token_handlers
            .iter()
            .rposition(|installed| same_handler(installed, handler))
        {
            self.token_handlers.remove(index);
        }
    }

    pub(crate) fn pop_argument(&mut self) -> Result<NodeRef, Error> {
        self.arguments.pop().ok_or(Error::EmptyArgumentStack)
    }

    pub(crate) fn try_pop_argument<T: Node>(&mut self) -> Result<Option<Rc<T>>, Error> {
        let Some(top) = self.arguments.last() else {
            return Ok(None);
        };
        match downcast_node::<T>(top) {
            Some(node) => {
                self.arguments.pop();
                Ok(Some(node))
            }
            None => Err(Error::UnexpectedNode {
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// Runs the handlers over the buffered tokens; the single place where
    /// handler outcomes are classified.
    pub(crate) fn advance(&mut self, lexer: &mut LexerStream) -> Result<(), ParsingError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let Some(first) = self.tokens.peek(0).map(|token| token.start) else {
            return Ok(());
        };
        self.running = true;
        let outcome = ParseContext::new(self, lexer).run_handlers();
        self.running = false;
        outcome.map_err(|cause| self.record_failure(cause, first, lexer.position()))
    }

    fn record_failure(&mut self, cause: Error, first: Position, fallback: Position) -> ParsingError {
        let failure = match cause {
            Error::Parsing(inner) => *inner,
            cause => {
                let position = self
                    .tokens
                    .get(self.furthest)
                    .or_else(|| self.tokens.last_consumed())
                    .map_or(fallback, |token| token.start);
                let recoverable = self.open.last().map_or(first, |entry| entry.start);
                ParsingError::new(cause, position, recoverable)
            }
        };
        let failure = match self.error.take() {
            Some(older) => failure.chain(older),
            None => failure,
        };
        if failure.is_grammar_bug() {
            warn!(%failure, "parser failed");
        } else {
            debug!(%failure, "parser failed");
        }
        self.error = Some(failure.clone());
        failure
    }

    /// Takes over a failure reported by the lexer. Lexical failures get the
    /// innermost open node as their recoverable position when that is earlier.
    fn adopt_lexer_failure(&mut self, mut err: ParsingError) -> ParsingError {
        if let Some(own) = &self.error {
            return own.clone();
        }
        if let Some(entry) = self.open.last() {
            if entry.start.offset < err.recoverable_position.offset {
                err.recoverable_position = entry.start;
            }
        }
        self.error = Some(err.clone());
        err
    }

    fn discard_open_from(&mut self, cut: usize, lexer: &mut LexerStream) {
        let discarded: Vec<OpenNode> = self.open.drain(cut..).collect();
        for entry in discarded.into_iter().rev() {
            if let Some(handler) = &entry.token_handler {
                self.remove_token_handler(handler);
            }
            if let Some(handler) = &entry.lexer_handler {
                if lexer.remove_lexer_handler(handler).is_err() {
                    debug!("lexer handler of a discarded node was already gone");
                }
            }
        }
    }

    fn recover(&mut self, offset: usize, lexer: &mut LexerStream) -> Result<Checkpoint, Error> {
        let len = lexer.buffered_len();
        if offset > len {
            return Err(Error::InvalidOffset { offset, len });
        }

        // The shallowest open node starting at or after the offset goes,
        // together with everything above it. Without one, the innermost
        // open node encloses the offset and goes instead.
        let (cut, rewind) = match self
            .open
            .iter()
            .position(|entry| entry.start.offset >= offset)
        {
            Some(k) => (k, self.open[k].start.offset),
            None => match self.open.last() {
                Some(innermost) => (self.open.len() - 1, innermost.start.offset),
                None => (0, offset),
            },
        };
        let discarded = self.open.len() - cut;
        self.discard_open_from(cut, lexer);

        // Completed nodes straddling the rewind point are dropped below, so
        // their first token has to be fed again as well.
        let mut checkpoint = lexer.recover(self.settle(rewind))?;
        loop {
            let settled = self.settle(checkpoint.offset());
            if settled == checkpoint.offset() {
                break;
            }
            checkpoint = lexer.recover(settled)?;
        }
        let boundary = checkpoint.offset();
        self.tokens.truncate_from_offset(boundary);
        self.arguments.retain(|node| {
            let starts_before = node_start(node).map_or(true, |start| start < boundary);
            let ends_before = node
                .end_token()
                .map_or(true, |token| token.end.offset <= boundary);
            starts_before && ends_before
        });
        self.furthest = self.furthest.min(self.tokens.len());
        self.error = None;
        debug!(requested = offset, offset = boundary, discarded, "parser recovered");
        Ok(Checkpoint::new(self.tokens.len(), checkpoint.position()))
    }

    /// Lowers `rewind` to the start of every completed node that begins
    /// before it and ends after it.
    fn settle(&self, mut rewind: usize) -> usize {
        loop {
            let straddling = self
                .arguments
                .iter()
                .filter_map(|node| {
                    let start = node_start(node)?;
                    let end = node.end_token()?.end.offset;
                    (start < rewind && end > rewind).then_some(start)
                })
                .min();
            match straddling {
                Some(start) => rewind = start,
                None => return rewind,
            }
        }
    }

    fn reset(&mut self, lexer: &mut LexerStream) {
        self.discard_open_from(0, lexer);
        self.tokens.clear();
        self.arguments.clear();
        self.error = None;
        self.furthest = 0;
    }
}

fn lock(state: &RefCell<ParserState>) -> Result<RefMut<'_, ParserState>, Error> {
    state.try_borrow_mut().map_err(|_| Error::StreamBusy)
}

/// A resumable parser on top of a [`LexerStream`].
///
/// The parser installs itself as the lexer's bottom token consumer, so every
/// token the lexer finalizes immediately runs the top [`ParserTokenHandler`].
/// Handlers open and close nodes; completed nodes are reported to the top
/// [`ParserNodeHandler`] and collected on the argument stack.
pub struct ParserStream {
    lexer: LexerStream,
    state: Rc<RefCell<ParserState>>,
}

impl ParserStream {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let state = Rc::new(RefCell::new(ParserState::new(options)));
        let mut lexer = LexerStream::with_options(options.lexer);
        lexer.push_lexer_consumer(Rc::new(ParserFeed::new(Rc::clone(&state))));
        Self { lexer, state }
    }

    /// Creates a parser with a bottom lexer handler and token handler.
    pub fn with_handlers(
        lexer_handler: Rc<dyn LexerHandler>,
        token_handler: Rc<dyn ParserTokenHandler>,
    ) -> Self {
        let mut state = ParserState::new(ParserOptions::default());
        state.token_handlers.push(token_handler);
        let state = Rc::new(RefCell::new(state));
        let feed: Rc<dyn TokenConsumer> = Rc::new(ParserFeed::new(Rc::clone(&state)));
        let lexer = LexerStream::with_handlers(lexer_handler, feed);
        Self { lexer, state }
    }

    /// Feeds a chunk of UTF-8 input through the lexer into the parser.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ParsingError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        match self.lexer.write(bytes) {
            Ok(written) => Ok(written),
            Err(err) => Err(self.adopt(err)),
        }
    }

    /// Feeds tokens directly, bypassing the lexer.
    pub fn write_tokens<I>(&mut self, tokens: I) -> Result<usize, ParsingError>
    where
        I: IntoIterator<Item = TokenRef>,
    {
        let mut state = match lock(&self.state) {
            Ok(state) => state,
            Err(cause) => {
                let here = self.lexer.position();
                return Err(ParsingError::new(cause, here, here));
            }
        };
        let before = state.tokens.len();
        for token in tokens {
            state.tokens.push(token);
        }
        let written = state.tokens.len() - before;
        state.advance(&mut self.lexer)?;
        Ok(written)
    }

    pub fn write_token(&mut self, token: TokenRef) -> Result<(), ParsingError> {
        self.write_tokens(std::iter::once(token)).map(|_| ())
    }

    /// Closes the lexer, which delivers the `EOF` token through the parser.
    pub fn close(&mut self) -> Result<(), ParsingError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        match self.lexer.close() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.adopt(err)),
        }
    }

    /// Reopens the stream at `offset` after a failure.
    ///
    /// Open nodes that start at or after the offset are discarded; when none
    /// does, the innermost open node is. The returned checkpoint is the rune
    /// offset actually rewound to: input from there on has to be written again.
    pub fn recover(&mut self, offset: usize) -> Result<Checkpoint, Error> {
        let mut state = lock(&self.state)?;
        state.recover(offset, &mut self.lexer)
    }

    /// Forgets all input, open nodes and completed nodes. The root handlers stay.
    pub fn reset(&mut self) -> Result<(), Error> {
        let mut state = lock(&self.state)?;
        state.reset(&mut self.lexer);
        self.lexer.reset();
        Ok(())
    }

    pub fn position(&self) -> Position {
        self.lexer.position()
    }

    pub fn error(&self) -> Option<ParsingError> {
        self.state.borrow().error.clone()
    }

    pub fn lexer(&self) -> &LexerStream {
        &self.lexer
    }

    pub fn lexer_mut(&mut self) -> &mut LexerStream {
        &mut self.lexer
    }

    pub fn current_node(&self) -> Option<NodeRef> {
        self.state.borrow().current_node()
    }

    pub fn current_path(&self) -> Vec<NodeRef> {
        self.state.borrow().current_path()
    }

    pub fn argument_stack_len(&self) -> usize {
        self.state.borrow().arguments.len()
    }

    pub fn push_argument(&mut self, node: NodeRef) -> Result<(), Error> {
        lock(&self.state)?.arguments.push(node);
        Ok(())
    }

    pub fn pop_argument(&mut self) -> Result<NodeRef, Error> {
        lock(&self.state)?.pop_argument()
    }

    pub fn try_pop_argument<T: Node>(&mut self) -> Result<Option<Rc<T>>, Error> {
        lock(&self.state)?.try_pop_argument()
    }

    pub fn consume_as<T: Node>(&mut self) -> Result<Rc<T>, Error> {
        let mut state = lock(&self.state)?;
        ParseContext::new(&mut state, &mut self.lexer).consume_as()
    }

    /// Opens `node` from outside a handler, installing its handlers.
    pub fn push_in_stack(&mut self, node: NodeRef) -> Result<(), Error> {
        let mut state = lock(&self.state)?;
        ParseContext::new(&mut state, &mut self.lexer)
            .push_in_stack(node)
            .map_err(Interrupt::into_error)
    }

    pub fn push_token_parser(&mut self, handler: Rc<dyn ParserTokenHandler>) -> Result<(), Error> {
        lock(&self.state)?.push_token_parser(handler)
    }

    pub fn pop_token_parser(&mut self) -> Result<Rc<dyn ParserTokenHandler>, Error> {
        lock(&self.state)?
            .token_handlers
            .pop()
            .ok_or(Error::NoTokenHandler)
    }

    pub fn push_node_consumer(&mut self, handler: Rc<dyn ParserNodeHandler>) -> Result<(), Error> {
        lock(&self.state)?.node_handlers.push(handler);
        Ok(())
    }

    pub fn pop_node_consumer(&mut self) -> Result<Rc<dyn ParserNodeHandler>, Error> {
        lock(&self.state)?
            .node_handlers
            .pop()
            .ok_or(Error::NoNodeHandler)
    }

    pub fn push_lexer_handler(&mut self, handler: Rc<dyn LexerHandler>) -> Result<(), Error> {
        self.lexer.push_lexer_handler(handler)
    }

    pub fn pop_lexer_handler(&mut self) -> Result<Rc<dyn LexerHandler>, Error> {
        self.lexer.pop_lexer_handler()
    }

    fn adopt(&mut self, err: ParsingError) -> ParsingError {
        match self.state.try_borrow_mut() {
            Ok(mut state) => state.adopt_lexer_failure(err),
            Err(_) => err,
        }
    }
}

impl Default for ParserStream {
    fn default() -> Self {
        Self::new()
    }
}
