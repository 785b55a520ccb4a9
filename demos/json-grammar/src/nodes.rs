//! Parse tree of the reference grammar.
//!
//! Containers are their own token handlers: an open `Object`, `Pair` or
//! `Array` parses its members until it closes itself. Grammar state only
//! moves when a token is consumed or a completed child is popped, never when
//! a child is opened, so a discarded child leaves its parent ready to read it
//! again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stream_common::{Error, Flow, Interrupt, TokenKind, TokenRef};
use stream_lexer::{LexerHandler, LexerStream};
use stream_parser::{
    node_as, CompositeNode, CompositeNodeBase, Node, NodeRef, ParseContext, ParserTokenHandler,
    TerminalNode, TerminalNodeBase,
};

use crate::lexer::{
    lex, CLOSE_ARRAY, CLOSE_OBJECT, COLON, COMMA, IDENT, NUMBER, OPEN_ARRAY,
    OPEN_OBJECT, STRING,
};

const VALUE_START: [TokenKind; 5] = [OPEN_OBJECT, OPEN_ARRAY, STRING, NUMBER, IDENT];

macro_rules! terminal_node {
    ($name:ident) => {
        impl Node for $name {
            fn start_token(&self) -> Option<TokenRef> {
                self.base.token()
            }

            fn end_token(&self) -> Option<TokenRef> {
                self.base.token()
            }
        }

        impl TerminalNode for $name {
            fn set_terminal_token(&self, token: TokenRef) -> Result<(), Error> {
                self.base.bind(token)
            }
        }
    };
}

macro_rules! composite_spans {
    ($name:ident) => {
        impl CompositeNode for $name {
            fn set_start_token(&self, token: TokenRef) {
                self.base.set_start_token(token);
            }

            fn set_end_token(&self, token: TokenRef) {
                self.base.set_end_token(token);
            }
        }
    };
}

fn unexpected(token: &TokenRef, expected: &[TokenKind]) -> Interrupt {
    if token.is_eof() {
        return Error::UnexpectedEof.into();
    }
    Error::InvalidToken {
        expected: expected.to_vec(),
        found: token.kind,
    }
    .into()
}

/// Opens the value starting with `token`. `also` lists the other kinds the
/// caller would have accepted, for the diagnostic.
pub(crate) fn begin_value(
    ctx: &mut ParseContext<'_>,
    token: TokenRef,
    also: &[TokenKind],
) -> Flow<()> {
    match token.kind {
        OPEN_OBJECT => ctx.begin_composite(Rc::new(Object::default()), Some(token)),
        OPEN_ARRAY => ctx.begin_composite(Rc::new(Array::default()), Some(token)),
        STRING => ctx.push_terminal(Rc::new(JsonString::default()), token),
        NUMBER => ctx.push_terminal(Rc::new(Number::default()), token),
        IDENT if matches!(token.value.as_str(), "true" | "false" | "null") => {
            ctx.push_terminal(Rc::new(Literal::default()), token)
        }
        IDENT => Err(Error::Expected(format!("a value, found bare word `{}`", token.value)).into()),
        _ => {
            let mut expected = VALUE_START.to_vec();
            expected.extend_from_slice(also);
            Err(unexpected(&token, &expected))
        }
    }
}

/// Strips the quotes of a raw string literal and resolves its escapes.
/// `\u` escapes are kept as written.
pub fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => out.push_str("\\u"),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ---- terminals ----

#[derive(Debug, Default)]
pub struct JsonString {
    base: TerminalNodeBase,
}

impl JsonString {
    /// The literal as written, quotes included.
    pub fn raw(&self) -> String {
        self.base.token().map(|t| t.value.clone()).unwrap_or_default()
    }

    pub fn value(&self) -> String {
        unescape(&self.raw())
    }
}

terminal_node!(JsonString);

#[derive(Debug, Default)]
pub struct Number {
    base: TerminalNodeBase,
}

impl Number {
    pub fn text(&self) -> String {
        self.base.token().map(|t| t.value.clone()).unwrap_or_default()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.text().parse().ok()
    }
}

terminal_node!(Number);

/// `true`, `false` or `null`.
#[derive(Debug, Default)]
pub struct Literal {
    base: TerminalNodeBase,
}

impl Literal {
    pub fn keyword(&self) -> String {
        self.base.token().map(|t| t.value.clone()).unwrap_or_default()
    }
}

terminal_node!(Literal);

// ---- containers ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Members {
    Start,
    AfterPair,
    AfterComma,
}

#[derive(Debug)]
pub struct Object {
    base: CompositeNodeBase,
    state: Cell<Members>,
    pairs: RefCell<Vec<Rc<Pair>>>,
}

impl Default for Object {
    fn default() -> Self {
        Self {
            base: CompositeNodeBase::new(),
            state: Cell::new(Members::Start),
            pairs: RefCell::new(Vec::new()),
        }
    }
}

impl Object {
    pub fn pairs(&self) -> Vec<Rc<Pair>> {
        self.pairs.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.base.is_complete()
    }
}

impl Node for Object {
    fn start_token(&self) -> Option<TokenRef> {
        self.base.start_token()
    }

    fn end_token(&self) -> Option<TokenRef> {
        self.base.end_token()
    }

    fn token_handler(self: Rc<Self>) -> Option<Rc<dyn ParserTokenHandler>> {
        Some(self)
    }

    fn lexer_handler(self: Rc<Self>) -> Option<Rc<dyn LexerHandler>> {
        Some(self)
    }
}

composite_spans!(Object);

impl LexerHandler for Object {
    fn consume_stream(&self, ctx: &mut LexerStream) -> Flow<()> {
        lex(ctx)
    }
}

impl ParserTokenHandler for Object {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        loop {
            if let Some(pair) = ctx.try_pop_argument::<Pair>()? {
                self.pairs.borrow_mut().push(pair);
                self.state.set(Members::AfterPair);
                continue;
            }
            let token = ctx.next_token()?;
            match (self.state.get(), token.kind) {
                (Members::Start | Members::AfterPair, CLOSE_OBJECT) => {
                    return ctx.end_composite(self, Some(token));
                }
                (Members::Start | Members::AfterComma, STRING) => {
                    let pair = Rc::new(Pair::new(Rc::clone(&token)));
                    ctx.begin_composite(pair, Some(token))?;
                }
                (Members::AfterPair, COMMA) => self.state.set(Members::AfterComma),
                (Members::Start, _) => return Err(unexpected(&token, &[STRING, CLOSE_OBJECT])),
                (Members::AfterPair, _) => return Err(unexpected(&token, &[COMMA, CLOSE_OBJECT])),
                (Members::AfterComma, _) => return Err(unexpected(&token, &[STRING])),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairState {
    AfterKey,
    AfterColon,
    AfterValue,
}

/// `"key": value` inside an object. It stays open after its value until the
/// next `,` or `}` shows up, so a broken member is recovered as a whole.
#[derive(Debug)]
pub struct Pair {
    base: CompositeNodeBase,
    key: TokenRef,
    state: Cell<PairState>,
    value: RefCell<Option<NodeRef>>,
}

impl Pair {
    fn new(key: TokenRef) -> Self {
        Self {
            base: CompositeNodeBase::new(),
            key,
            state: Cell::new(PairState::AfterKey),
            value: RefCell::new(None),
        }
    }

    pub fn key_token(&self) -> &TokenRef {
        &self.key
    }

    pub fn key(&self) -> String {
        unescape(&self.key.value)
    }

    pub fn value(&self) -> Option<NodeRef> {
        self.value.borrow().clone()
    }
}

impl Node for Pair {
    fn start_token(&self) -> Option<TokenRef> {
        self.base.start_token()
    }

    fn end_token(&self) -> Option<TokenRef> {
        self.base.end_token()
    }

    fn token_handler(self: Rc<Self>) -> Option<Rc<dyn ParserTokenHandler>> {
        Some(self)
    }
}

composite_spans!(Pair);

impl ParserTokenHandler for Pair {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        loop {
            match self.state.get() {
                PairState::AfterKey => {
                    let token = ctx.next_token()?;
                    if token.kind != COLON {
                        return Err(unexpected(&token, &[COLON]));
                    }
                    self.state.set(PairState::AfterColon);
                }
                PairState::AfterColon => {
                    if ctx.argument_stack_len() > 0 {
                        let value = ctx.pop_argument()?;
                        *self.value.borrow_mut() = Some(value);
                        self.state.set(PairState::AfterValue);
                        continue;
                    }
                    let token = ctx.next_token()?;
                    begin_value(ctx, token, &[])?;
                }
                PairState::AfterValue => {
                    let token = ctx.peek_token(0)?;
                    if token.kind != COMMA && token.kind != CLOSE_OBJECT {
                        return Err(unexpected(&token, &[COMMA, CLOSE_OBJECT]));
                    }
                    let end = self.value.borrow().as_ref().and_then(|v| v.end_token());
                    return ctx.end_composite(self, end);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Items {
    Start,
    AfterValue,
    AfterComma,
}

#[derive(Debug)]
pub struct Array {
    base: CompositeNodeBase,
    state: Cell<Items>,
    items: RefCell<Vec<NodeRef>>,
}

impl Default for Array {
    fn default() -> Self {
        Self {
            base: CompositeNodeBase::new(),
            state: Cell::new(Items::Start),
            items: RefCell::new(Vec::new()),
        }
    }
}

impl Array {
    pub fn items(&self) -> Vec<NodeRef> {
        self.items.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.base.is_complete()
    }
}

impl Node for Array {
    fn start_token(&self) -> Option<TokenRef> {
        self.base.start_token()
    }

    fn end_token(&self) -> Option<TokenRef> {
        self.base.end_token()
    }

    fn token_handler(self: Rc<Self>) -> Option<Rc<dyn ParserTokenHandler>> {
        Some(self)
    }

    fn lexer_handler(self: Rc<Self>) -> Option<Rc<dyn LexerHandler>> {
        Some(self)
    }
}

composite_spans!(Array);

impl LexerHandler for Array {
    fn consume_stream(&self, ctx: &mut LexerStream) -> Flow<()> {
        lex(ctx)
    }
}

impl ParserTokenHandler for Array {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        loop {
            if ctx.argument_stack_len() > 0 {
                let item = ctx.pop_argument()?;
                self.items.borrow_mut().push(item);
                self.state.set(Items::AfterValue);
                continue;
            }
            let token = ctx.next_token()?;
            match (self.state.get(), token.kind) {
                (Items::Start | Items::AfterValue, CLOSE_ARRAY) => {
                    return ctx.end_composite(self, Some(token));
                }
                (Items::AfterValue, COMMA) => self.state.set(Items::AfterComma),
                (Items::AfterValue, _) => return Err(unexpected(&token, &[COMMA, CLOSE_ARRAY])),
                (Items::Start, _) => begin_value(ctx, token, &[CLOSE_ARRAY])?,
                (Items::AfterComma, _) => begin_value(ctx, token, &[])?,
            }
        }
    }
}

// ---- document ----

/// Bottom token handler: collects completed top-level values until `EOF`.
#[derive(Debug, Default)]
pub struct Root {
    values: RefCell<Vec<NodeRef>>,
}

impl Root {
    pub fn values(&self) -> Vec<NodeRef> {
        self.values.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }

    /// Earliest start of a value that begins before `offset` and ends after it.
    pub fn straddling(&self, offset: usize) -> Option<usize> {
        self.values
            .borrow()
            .iter()
            .filter_map(|node| {
                let start = node.start_token()?.start.offset;
                let end = node.end_token()?.end.offset;
                (start < offset && end > offset).then_some(start)
            })
            .min()
    }

    /// Drops values that do not lie entirely before `offset`.
    pub fn truncate_from(&self, offset: usize) {
        self.values.borrow_mut().retain(|node| {
            node.end_token()
                .is_some_and(|token| token.end.offset <= offset)
        });
    }
}

impl ParserTokenHandler for Root {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        loop {
            while ctx.argument_stack_len() > 0 {
                let value = ctx.pop_argument()?;
                self.values.borrow_mut().push(value);
            }
            let token = ctx.next_token()?;
            if token.is_eof() {
                return Ok(());
            }
            begin_value(ctx, token, &[])?;
        }
    }
}

/// One line summary of a node: its kind, a short label and its span.
pub fn describe(node: &NodeRef) -> String {
    let label = if let Some(string) = node_as::<JsonString>(node) {
        format!("string {}", string.raw())
    } else if let Some(number) = node_as::<Number>(node) {
        format!("number {}", number.text())
    } else if let Some(literal) = node_as::<Literal>(node) {
        literal.keyword()
    } else if let Some(pair) = node_as::<Pair>(node) {
        format!("pair {}", pair.key_token().value)
    } else if let Some(object) = node_as::<Object>(node) {
        format!("object ({} members)", object.pairs.borrow().len())
    } else if let Some(array) = node_as::<Array>(node) {
        format!("array ({} items)", array.items.borrow().len())
    } else {
        "node".to_string()
    };
    match (node.start_token(), node.end_token()) {
        (Some(start), Some(end)) => format!("{label} [{}..{}]", start.start, end.end),
        (Some(start), None) => format!("{label} [{}..]", start.start),
        _ => label,
    }
}
