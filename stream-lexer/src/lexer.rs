use std::rc::Rc;

use stream_common::{Checkpoint, Error, Flow, Interrupt, ParsingError, Position, Token, TokenKind};
use tracing::{debug, trace, warn};

use crate::buffer::RuneBuffer;
use crate::traits::{same_handler, LexerHandler, TokenConsumer};

/// Tunables of a [`LexerStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerOptions {
    /// Runes reserved up front in the buffer.
    pub initial_capacity: usize,
    /// Keep a line table so positions carry line and column.
    pub track_lines: bool,
    /// How many times in a row handlers may be swapped without consuming input.
    pub max_shift_depth: usize,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 4096,
            track_lines: true,
            max_shift_depth: 64,
        }
    }
}

impl LexerOptions {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn track_lines(mut self, enabled: bool) -> Self {
        self.track_lines = enabled;
        self
    }

    pub fn max_shift_depth(mut self, depth: usize) -> Self {
        self.max_shift_depth = depth;
        self
    }
}

/// Span of a token already handed to the consumer.
#[derive(Debug, Clone, Copy)]
struct Emitted {
    start: usize,
    end: usize,
}

/// A resumable lexer fed with arbitrary byte chunks.
///
/// Bytes are decoded into a [`RuneBuffer`] and the top [`LexerHandler`] is
/// driven until the buffer is exhausted or the handler has to wait for more
/// input. Finalized tokens go to the top [`TokenConsumer`].
///
/// Cloning takes a snapshot of the buffered input and the pending token; the
/// copy shares the installed handlers and consumers with the original.
#[derive(Clone)]
pub struct LexerStream {
    buffer: RuneBuffer,
    handlers: Vec<Rc<dyn LexerHandler>>,
    consumers: Vec<Rc<dyn TokenConsumer>>,
    pending: Token,
    emitted: Vec<Emitted>,
    carry: Vec<u8>,
    error: Option<ParsingError>,
    closed: bool,
    running: bool,
    options: LexerOptions,
}

impl LexerStream {
    pub fn new() -> Self {
        Self::with_options(LexerOptions::default())
    }

    pub fn with_options(options: LexerOptions) -> Self {
        Self {
            buffer: RuneBuffer::with_capacity(options.initial_capacity, options.track_lines),
            handlers: Vec::new(),
            consumers: Vec::new(),
            pending: Token::default(),
            emitted: Vec::new(),
            carry: Vec::new(),
            error: None,
            closed: false,
            running: false,
            options,
        }
    }

    /// Creates a stream with a bottom handler and consumer already installed.
    pub fn with_handlers(handler: Rc<dyn LexerHandler>, consumer: Rc<dyn TokenConsumer>) -> Self {
        let mut stream = Self::new();
        stream.handlers.push(handler);
        stream.consumers.push(consumer);
        stream
    }

    pub fn options(&self) -> &LexerOptions {
        &self.options
    }

    /// Feeds a chunk of UTF-8 input and runs the handlers over it.
    ///
    /// Returns the number of bytes accepted, which is always the whole chunk:
    /// runes a handler could not finish yet stay buffered for the next call.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ParsingError> {
        if self.running {
            let here = self.position();
            return Err(ParsingError::new(Error::StreamBusy, here, here));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.closed = false;

        let decoded = self.decode(bytes);
        let advanced = self.advance();
        if let Err(cause) = decoded {
            let at = self.buffer.position_at(self.buffer.len());
            let recoverable = self.recoverable_position(self.buffer.offset());
            return Err(self.record_failure(cause, at, recoverable));
        }
        advanced?;
        Ok(bytes.len())
    }

    /// Signals end of input.
    ///
    /// Handlers get to flush a pending token, then a synthetic `EOF` token is
    /// delivered. A pending token nobody can finish is `UnexpectedEof`.
    pub fn close(&mut self) -> Result<(), ParsingError> {
        if self.running {
            let here = self.position();
            return Err(ParsingError::new(Error::StreamBusy, here, here));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let end = self.buffer.position_at(self.buffer.len());
        if !self.carry.is_empty() {
            self.carry.clear();
            let recoverable = self.recoverable_position(self.buffer.offset());
            let cause = Error::InvalidUtf8 {
                offset: self.buffer.len(),
            };
            return Err(self.record_failure(cause, end, recoverable));
        }
        self.advance()?;

        let end = self.buffer.position_at(self.buffer.len());
        self.running = true;
        let delivered = self.deliver(Token::new(TokenKind::EOF, "", end, end));
        self.running = false;
        match delivered {
            Ok(()) | Err(Interrupt::Suspend) | Err(Interrupt::Shift) => Ok(()),
            Err(Interrupt::Fail(cause)) => Err(self.record_failure(cause, end, end)),
        }
    }

    /// Reopens a failed (or closed) stream at `offset`.
    ///
    /// The rewind point is snapped back so it never falls inside a token that
    /// was already delivered or a pending token that straddles it. Everything
    /// buffered after the returned checkpoint is dropped and the token index
    /// counter rolls back with it.
    pub fn recover(&mut self, offset: usize) -> Result<Checkpoint, Error> {
        if self.running {
            return Err(Error::StreamBusy);
        }
        let len = self.buffer.len();
        if offset > len {
            return Err(Error::InvalidOffset { offset, len });
        }

        let mut target = offset;
        if self.pending.kind != TokenKind::INVALID {
            let start = self.pending.start.offset;
            if start >= target || target < self.buffer.offset() {
                target = target.min(start);
                self.pending = Token::default();
            }
        }
        while let Some(last) = self.emitted.last().copied() {
            if last.start >= target {
                self.emitted.pop();
            } else if last.end > target {
                target = last.start;
                self.emitted.pop();
            } else {
                break;
            }
        }

        self.buffer.truncate(target);
        self.carry.clear();
        self.error = None;
        self.closed = false;
        debug!(requested = offset, offset = target, "lexer recovered");
        Ok(Checkpoint::new(target, self.buffer.position_at(target)))
    }

    /// Forgets all buffered input and error state; installed handlers stay.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending = Token::default();
        self.emitted.clear();
        self.carry.clear();
        self.error = None;
        self.closed = false;
    }

    pub fn position(&self) -> Position {
        self.buffer.position()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.buffer.checkpoint()
    }

    /// Moves the cursor to `offset`, clamped to the buffered input, and
    /// returns the offset it landed on.
    pub fn seek(&mut self, offset: usize) -> usize {
        self.buffer.seek(offset);
        self.buffer.offset()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The stored failure, if the stream is failed.
    pub fn error(&self) -> Option<&ParsingError> {
        self.error.as_ref()
    }

    /// Index the next finalized token will get.
    pub fn next_index(&self) -> usize {
        self.emitted.len()
    }

    /// Number of runes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    // ---- token assembly ----

    /// The token being assembled; `TokenKind::INVALID` when none is pending.
    pub fn current_token(&self) -> &Token {
        &self.pending
    }

    pub fn current_token_mut(&mut self) -> &mut Token {
        &mut self.pending
    }

    /// Starts a token whose first runes, `value`, were just consumed.
    pub fn push_start(&mut self, kind: TokenKind, value: &str) {
        let consumed = value.chars().count();
        let start = self
            .buffer
            .position_at(self.buffer.offset().saturating_sub(consumed));
        self.pending = Token::new(kind, value, start, start);
    }

    pub fn append_value(&mut self, text: &str) {
        self.pending.value.push_str(text);
    }

    pub fn append_char(&mut self, ch: char) {
        self.pending.value.push(ch);
    }

    /// Finalizes the pending token at the cursor and delivers it.
    ///
    /// Returns `Interrupt::Shift` when the consumer replaced the active
    /// lexical handler, so the running handler unwinds.
    pub fn push_end(&mut self) -> Flow<()> {
        if self.pending.kind == TokenKind::INVALID {
            return Ok(());
        }
        let mut token = std::mem::take(&mut self.pending);
        token.end = self.position();
        self.deliver(token)
    }

    /// `push_start` followed by `push_end`.
    pub fn push_single(&mut self, kind: TokenKind, value: &str) -> Flow<()> {
        self.push_start(kind, value);
        self.push_end()
    }

    fn deliver(&mut self, mut token: Token) -> Flow<()> {
        let consumer = self.consumers.last().cloned().ok_or(Error::NoTokenHandler)?;
        token.index = self.emitted.len();
        self.emitted.push(Emitted {
            start: token.start.offset,
            end: token.end.offset,
        });
        trace!(kind = ?token.kind, index = token.index, offset = token.start.offset, "token");

        let top = self.handlers.last().cloned();
        consumer.consume_token(self, Rc::new(token))?;
        let unchanged = match (&top, self.handlers.last()) {
            (Some(before), Some(after)) => same_handler(before, after),
            (None, None) => true,
            _ => false,
        };
        if self.running && !unchanged {
            return Err(Interrupt::Shift);
        }
        Ok(())
    }

    // ---- handler stacks ----

    pub fn push_lexer_handler(&mut self, handler: Rc<dyn LexerHandler>) -> Result<(), Error> {
        if self.has_lexer_handler(&handler) {
            return Err(Error::HandlerReentry);
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn pop_lexer_handler(&mut self) -> Result<Rc<dyn LexerHandler>, Error> {
        self.handlers.pop().ok_or(Error::NoLexerHandler)
    }

    /// Removes a specific handler, wherever it sits on the stack.
    pub fn remove_lexer_handler(&mut self, handler: &Rc<dyn LexerHandler>) -> Result<(), Error> {
        let index = self
            .handlers
            .iter()
            .rposition(|installed| same_handler(installed, handler))
            .ok_or(Error::NoLexerHandler)?;
        self.handlers.remove(index);
        Ok(())
    }

    pub fn has_lexer_handler(&self, handler: &Rc<dyn LexerHandler>) -> bool {
        self.handlers
            .iter()
            .any(|installed| same_handler(installed, handler))
    }

    pub fn lexer_handler_depth(&self) -> usize {
        self.handlers.len()
    }

    pub fn push_lexer_consumer(&mut self, consumer: Rc<dyn TokenConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn pop_lexer_consumer(&mut self) -> Result<Rc<dyn TokenConsumer>, Error> {
        self.consumers.pop().ok_or(Error::NoTokenHandler)
    }

    // ---- internals ----

    pub(crate) fn buffer(&self) -> &RuneBuffer {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut RuneBuffer {
        &mut self.buffer
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let joined;
        let data: &[u8] = if self.carry.is_empty() {
            bytes
        } else {
            let mut carried = std::mem::take(&mut self.carry);
            carried.extend_from_slice(bytes);
            joined = carried;
            &joined
        };

        match std::str::from_utf8(data) {
            Ok(text) => {
                self.buffer.push_str(text);
                Ok(())
            }
            Err(err) => {
                let (valid, rest) = data.split_at(err.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    self.buffer.push_str(text);
                }
                match err.error_len() {
                    // a multibyte sequence cut by the chunk boundary
                    None => {
                        self.carry = rest.to_vec();
                        Ok(())
                    }
                    Some(_) => Err(Error::InvalidUtf8 {
                        offset: self.buffer.len(),
                    }),
                }
            }
        }
    }

    fn has_work(&self) -> bool {
        self.buffer.remaining() > 0 || (self.closed && self.pending.kind != TokenKind::INVALID)
    }

    fn progress(&self) -> (usize, usize, TokenKind, usize) {
        (
            self.buffer.offset(),
            self.emitted.len(),
            self.pending.kind,
            self.pending.value.len(),
        )
    }

    /// Last point known to be sound: the start of the pending token, else the
    /// later of `floor` and the end of the last delivered token.
    fn recoverable_position(&self, floor: usize) -> Position {
        if self.pending.kind != TokenKind::INVALID {
            return self.pending.start;
        }
        let last_end = self.emitted.last().map_or(0, |token| token.end);
        self.buffer.position_at(floor.max(last_end))
    }

    fn advance(&mut self) -> Result<(), ParsingError> {
        self.running = true;
        let outcome = self.run_handlers();
        self.running = false;
        outcome.map_err(|(cause, recoverable)| {
            let here = self.position();
            self.record_failure(cause, here, recoverable)
        })
    }

    fn run_handlers(&mut self) -> Result<(), (Error, Position)> {
        let mut idle_shifts = 0;
        while self.has_work() {
            let Some(handler) = self.handlers.last().cloned() else {
                return Err((Error::NoLexerHandler, self.position()));
            };
            let floor = self.buffer.offset();
            let before = self.progress();

            match handler.consume_stream(self) {
                Ok(()) => {
                    let replaced = !self
                        .handlers
                        .last()
                        .is_some_and(|top| same_handler(top, &handler));
                    if !replaced && self.progress() == before {
                        if self.closed && self.pending.kind != TokenKind::INVALID {
                            return Err((Error::UnexpectedEof, self.recoverable_position(floor)));
                        }
                        break;
                    }
                }
                Err(Interrupt::Shift) => {
                    trace!(offset = self.buffer.offset(), "lexer handler shift");
                }
                Err(Interrupt::Suspend) => {
                    trace!(offset = self.buffer.offset(), "lexer suspended");
                    break;
                }
                Err(Interrupt::Fail(cause)) => {
                    return Err((cause, self.recoverable_position(floor)))
                }
            }

            if self.progress() == before {
                idle_shifts += 1;
                if idle_shifts > self.options.max_shift_depth {
                    return Err((
                        Error::msg("lexer handlers kept shifting without consuming input"),
                        self.recoverable_position(floor),
                    ));
                }
            } else {
                idle_shifts = 0;
            }
        }
        Ok(())
    }

    fn record_failure(
        &mut self,
        cause: Error,
        position: Position,
        recoverable: Position,
    ) -> ParsingError {
        let failure = match cause {
            Error::Parsing(inner) => *inner,
            cause => ParsingError::new(cause, position, recoverable),
        };
        let failure = match self.error.take() {
            Some(older) => failure.chain(older),
            None => failure,
        };
        if failure.is_grammar_bug() {
            warn!(%failure, "lexer failed");
        } else {
            debug!(%failure, "lexer failed");
        }
        self.error = Some(failure.clone());
        failure
    }
}

impl Default for LexerStream {
    fn default() -> Self {
        Self::new()
    }
}
