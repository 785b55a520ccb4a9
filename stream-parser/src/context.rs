use std::rc::Rc;

use stream_common::{Error, Flow, Interrupt, TokenKind, TokenRef};
use stream_lexer::{same_handler, LexerHandler, LexerStream};
use tracing::{trace, warn};

use crate::node::{downcast_node, same_node, CompositeNode, Node, NodeRef, TerminalNode};
use crate::parser::{OpenNode, ParserState};
use crate::traits::{ParserNodeHandler, ParserTokenHandler};

/// What a parser handler sees while it runs: the token buffer, the node
/// stacks, the handler stacks and the underlying lexer.
pub struct ParseContext<'a> {
    state: &'a mut ParserState,
    lexer: &'a mut LexerStream,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn new(state: &'a mut ParserState, lexer: &'a mut LexerStream) -> Self {
        Self { state, lexer }
    }

    /// The lexer feeding this parser.
    pub fn lexer(&mut self) -> &mut LexerStream {
        &mut *self.lexer
    }

    // ---- tokens ----

    /// Tokens buffered after the cursor.
    pub fn remaining_tokens(&self) -> usize {
        self.state.tokens.remaining()
    }

    /// Looks `n` tokens ahead; suspends if that token has not arrived yet.
    pub fn peek_token(&mut self, n: usize) -> Flow<TokenRef> {
        let token = self.state.tokens.peek(n).cloned().ok_or(Interrupt::Suspend)?;
        self.state.examine(self.state.tokens.cursor() + n);
        Ok(token)
    }

    /// Like [`ParseContext::peek_token`] without suspending.
    pub fn try_peek_token(&mut self, n: usize) -> Option<TokenRef> {
        self.peek_token(n).ok()
    }

    /// Consumes one token; suspends if none is buffered.
    pub fn next_token(&mut self) -> Flow<TokenRef> {
        let index = self.state.tokens.cursor();
        let token = self.state.tokens.advance().ok_or(Interrupt::Suspend)?;
        self.state.examine(index);
        Ok(token)
    }

    /// Consumes the next token if it has one of `kinds`, otherwise fails with
    /// `Error::InvalidToken` and leaves it in place.
    pub fn consume_next_token(&mut self, kinds: &[TokenKind]) -> Flow<TokenRef> {
        let token = self.peek_token(0)?;
        if !kinds.contains(&token.kind) {
            return Err(Error::InvalidToken {
                expected: kinds.to_vec(),
                found: token.kind,
            }
            .into());
        }
        self.next_token()
    }

    /// The most recently consumed token.
    pub fn last_token(&self) -> Option<TokenRef> {
        self.state.tokens.last_consumed().cloned()
    }

    // ---- open nodes ----

    /// The innermost open node.
    pub fn current_node(&self) -> Option<NodeRef> {
        self.state.current_node()
    }

    /// Open nodes, outermost first.
    pub fn current_path(&self) -> Vec<NodeRef> {
        self.state.current_path()
    }

    /// Opens a composite node starting at `start`, or at the next token.
    pub fn begin_composite<N>(&mut self, node: Rc<N>, start: Option<TokenRef>) -> Flow<()>
    where
        N: CompositeNode + 'static,
    {
        let start = match start {
            Some(token) => token,
            None => self.peek_token(0)?,
        };
        node.set_start_token(start);
        self.push_in_stack(node)
    }

    /// Closes `node`, which must be the innermost open node. The end token
    /// defaults to the last consumed token.
    pub fn end_composite<N>(&mut self, node: &N, end: Option<TokenRef>) -> Flow<()>
    where
        N: CompositeNode + ?Sized,
    {
        let is_top = self
            .state
            .open
            .last()
            .is_some_and(|entry| same_node(&entry.node, node));
        if !is_top {
            warn!(depth = self.state.open.len(), "composite closed out of order");
            return Err(Error::UnbalancedComposite.into());
        }
        if let Some(end) = end.or_else(|| self.last_token()) {
            node.set_end_token(end);
        }
        self.pop_to_out_stack()
    }

    /// Binds `token` to a terminal node and hands it straight to the
    /// completed-node stack. Terminals never become handlers.
    pub fn push_terminal<N>(&mut self, node: Rc<N>, token: TokenRef) -> Flow<()>
    where
        N: TerminalNode + 'static,
    {
        let start = token.start;
        node.set_terminal_token(token)?;
        self.state.open.push(OpenNode {
            node,
            start,
            token_handler: None,
            lexer_handler: None,
        });
        self.pop_to_out_stack()
    }

    /// Opens `node` and installs whatever handlers it provides.
    ///
    /// Installing a token handler from inside the parse loop returns
    /// `Interrupt::Shift`, so the running handler unwinds and the new one
    /// takes over.
    pub fn push_in_stack(&mut self, node: NodeRef) -> Flow<()> {
        let token_handler = Rc::clone(&node).token_handler();
        let lexer_handler = Rc::clone(&node).lexer_handler();
        if let Some(handler) = &token_handler {
            if self.state.has_token_handler(handler) {
                return Err(Error::HandlerReentry.into());
            }
        }
        if let Some(handler) = &lexer_handler {
            if self.lexer.has_lexer_handler(handler) {
                return Err(Error::HandlerReentry.into());
            }
        }

        let start = match node.start_token() {
            Some(token) => token.start,
            None => self
                .state
                .tokens
                .peek(0)
                .map_or_else(|| self.lexer.position(), |token| token.start),
        };
        if let Some(handler) = &lexer_handler {
            self.lexer.push_lexer_handler(Rc::clone(handler))?;
        }
        let shift = token_handler.is_some() && self.state.running;
        if let Some(handler) = &token_handler {
            self.state.token_handlers.push(Rc::clone(handler));
        }
        self.state.open.push(OpenNode {
            node,
            start,
            token_handler,
            lexer_handler,
        });

        if shift {
            trace!(depth = self.state.open.len(), "parser handler shift");
            return Err(Interrupt::Shift);
        }
        Ok(())
    }

    fn pop_to_out_stack(&mut self) -> Flow<()> {
        let entry = self.state.open.pop().ok_or(Error::UnbalancedComposite)?;
        if let Some(handler) = &entry.token_handler {
            self.state.remove_token_handler(handler);
        }
        if let Some(handler) = &entry.lexer_handler {
            self.lexer.remove_lexer_handler(handler)?;
        }
        self.state.arguments.push(Rc::clone(&entry.node));
        if let Some(consumer) = self.state.node_handlers.last().cloned() {
            consumer.consume_node(self, &entry.node)?;
        }
        Ok(())
    }

    // ---- completed nodes ----

    pub fn argument_stack_len(&self) -> usize {
        self.state.arguments.len()
    }

    pub fn push_argument(&mut self, node: NodeRef) {
        self.state.arguments.push(node);
    }

    pub fn pop_argument(&mut self) -> Result<NodeRef, Error> {
        self.state.pop_argument()
    }

    /// Pops the top completed node if there is one; a node of another type
    /// is an error and stays on the stack.
    pub fn try_pop_argument<T: Node>(&mut self) -> Result<Option<Rc<T>>, Error> {
        self.state.try_pop_argument()
    }

    /// The current node if it is a `T`, else the top completed node.
    pub fn consume_as<T: Node>(&mut self) -> Result<Rc<T>, Error> {
        if let Some(node) = self.current_node().and_then(|node| downcast_node::<T>(&node)) {
            return Ok(node);
        }
        self.try_pop_argument::<T>()?
            .ok_or(Error::EmptyArgumentStack)
    }

    // ---- handler stacks ----

    pub fn push_token_parser(&mut self, handler: Rc<dyn ParserTokenHandler>) -> Result<(), Error> {
        self.state.push_token_parser(handler)
    }

    pub fn pop_token_parser(&mut self) -> Result<Rc<dyn ParserTokenHandler>, Error> {
        self.state.token_handlers.pop().ok_or(Error::NoTokenHandler)
    }

    pub fn push_node_consumer(&mut self, handler: Rc<dyn ParserNodeHandler>) {
        self.state.node_handlers.push(handler);
    }

    pub fn pop_node_consumer(&mut self) -> Result<Rc<dyn ParserNodeHandler>, Error> {
        self.state.node_handlers.pop().ok_or(Error::NoNodeHandler)
    }

    pub fn push_lexer_handler(&mut self, handler: Rc<dyn LexerHandler>) -> Result<(), Error> {
        self.lexer.push_lexer_handler(handler)
    }

    pub fn pop_lexer_handler(&mut self) -> Result<Rc<dyn LexerHandler>, Error> {
        self.lexer.pop_lexer_handler()
    }

    // ---- loop ----

    /// Drives the top token handler over the buffered tokens.
    pub(crate) fn run_handlers(&mut self) -> Result<(), Error> {
        let mut idle_shifts = 0;
        while self.state.tokens.remaining() > 0 {
            let handler = self
                .state
                .token_handlers
                .last()
                .cloned()
                .ok_or(Error::NoTokenHandler)?;
            let before = self.state.tokens.cursor();

            match handler.consume_token_stream(self) {
                Ok(()) => {
                    let unchanged = self
                        .state
                        .token_handlers
                        .last()
                        .is_some_and(|top| same_handler(top, &handler));
                    if unchanged {
                        break;
                    }
                }
                Err(Interrupt::Shift) => {
                    trace!(cursor = self.state.tokens.cursor(), "parser shifted");
                }
                Err(Interrupt::Suspend) => {
                    trace!(cursor = self.state.tokens.cursor(), "parser suspended");
                    break;
                }
                Err(Interrupt::Fail(err)) => return Err(err),
            }

            if self.state.tokens.cursor() == before {
                idle_shifts += 1;
                if idle_shifts > self.state.options.max_shift_depth {
                    return Err(Error::msg(
                        "parser handlers kept shifting without consuming tokens",
                    ));
                }
            } else {
                idle_shifts = 0;
            }
        }
        Ok(())
    }
}
