//! A tiny s-expression grammar used by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use stream_parser::{
    node_as, CompositeNode, CompositeNodeBase, Error, Flow, LexerStream, Node, NodeRef,
    ParseContext, ParserStream, ParserTokenHandler, Position, TerminalNode, TerminalNodeBase,
    Token, TokenKind, TokenRef,
};

pub const OPEN: TokenKind = TokenKind::user(0);
pub const CLOSE: TokenKind = TokenKind::user(1);
pub const ATOM: TokenKind = TokenKind::user(2);

pub fn lex(ctx: &mut LexerStream) -> Flow<()> {
    loop {
        if ctx.current_token().kind == ATOM {
            match ctx.la(0)? {
                Some(ch) if ch.is_alphanumeric() => {
                    ctx.next_char()?;
                    ctx.append_char(ch);
                }
                _ => ctx.push_end()?,
            }
            continue;
        }
        match ctx.next_char()? {
            None => return Ok(()),
            Some('(') => ctx.push_single(OPEN, "(")?,
            Some(')') => ctx.push_single(CLOSE, ")")?,
            Some(ch) if ch.is_whitespace() => {}
            Some(ch) if ch.is_alphanumeric() => ctx.push_start(ATOM, &ch.to_string()),
            Some(ch) => return Err(Error::UnexpectedChar(ch).into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Atom {
    base: TerminalNodeBase,
}

impl Atom {
    pub fn text(&self) -> String {
        self.base.token().map(|t| t.value.clone()).unwrap_or_default()
    }
}

impl Node for Atom {
    fn start_token(&self) -> Option<TokenRef> {
        self.base.token()
    }

    fn end_token(&self) -> Option<TokenRef> {
        self.base.token()
    }
}

impl TerminalNode for Atom {
    fn set_terminal_token(&self, token: TokenRef) -> Result<(), Error> {
        self.base.bind(token)
    }
}

/// A parenthesized list; parses its own contents while open.
#[derive(Debug, Default)]
pub struct List {
    base: CompositeNodeBase,
    pub children: RefCell<Vec<NodeRef>>,
}

impl Node for List {
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

impl CompositeNode for List {
    fn set_start_token(&self, token: TokenRef) {
        self.base.set_start_token(token);
    }

    fn set_end_token(&self, token: TokenRef) {
        self.base.set_end_token(token);
    }
}

impl ParserTokenHandler for List {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        loop {
            while ctx.argument_stack_len() > 0 {
                let child = ctx.pop_argument()?;
                self.children.borrow_mut().push(child);
            }
            let token = ctx.next_token()?;
            if token.kind == CLOSE {
                return ctx.end_composite(self, Some(token));
            }
            accept(ctx, token)?;
        }
    }
}

/// A composite without handler capabilities.
#[derive(Debug, Default)]
pub struct Group {
    base: CompositeNodeBase,
}

impl Node for Group {
    fn start_token(&self) -> Option<TokenRef> {
        self.base.start_token()
    }

    fn end_token(&self) -> Option<TokenRef> {
        self.base.end_token()
    }
}

impl CompositeNode for Group {
    fn set_start_token(&self, token: TokenRef) {
        self.base.set_start_token(token);
    }

    fn set_end_token(&self, token: TokenRef) {
        self.base.set_end_token(token);
    }
}

pub fn accept(ctx: &mut ParseContext<'_>, token: TokenRef) -> Flow<()> {
    match token.kind {
        OPEN => ctx.begin_composite(Rc::new(List::default()), Some(token)),
        ATOM => ctx.push_terminal(Rc::new(Atom::default()), token),
        TokenKind::EOF => Err(Error::UnexpectedEof.into()),
        found => Err(Error::InvalidToken {
            expected: vec![OPEN, ATOM],
            found,
        }
        .into()),
    }
}

/// Root handler collecting top-level items.
#[derive(Debug, Default)]
pub struct Document {
    pub items: RefCell<Vec<NodeRef>>,
}

impl ParserTokenHandler for Document {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        loop {
            while ctx.argument_stack_len() > 0 {
                let item = ctx.pop_argument()?;
                self.items.borrow_mut().push(item);
            }
            let token = ctx.next_token()?;
            if token.is_eof() {
                return Ok(());
            }
            accept(ctx, token)?;
        }
    }
}

impl Document {
    pub fn render(&self) -> String {
        render_all(&self.items.borrow())
    }
}

pub fn render(node: &NodeRef) -> String {
    if let Some(atom) = node_as::<Atom>(node) {
        return atom.text();
    }
    if let Some(list) = node_as::<List>(node) {
        return format!("({})", render_all(&list.children.borrow()));
    }
    "?".to_string()
}

fn render_all(nodes: &[NodeRef]) -> String {
    nodes.iter().map(render).collect::<Vec<_>>().join(" ")
}

pub fn parser() -> (ParserStream, Rc<Document>) {
    let document = Rc::new(Document::default());
    let stream = ParserStream::with_handlers(Rc::new(lex), document.clone());
    (stream, document)
}

pub fn parse_in_chunks(input: &str, chunk: usize) -> String {
    let (mut stream, document) = parser();
    for piece in input.as_bytes().chunks(chunk) {
        stream.write(piece).unwrap();
    }
    stream.close().unwrap();
    document.render()
}

pub fn token(kind: TokenKind, value: &str, offset: usize) -> TokenRef {
    let len = value.chars().count();
    Rc::new(Token::new(
        kind,
        value,
        Position::at(1, offset + 1, offset),
        Position::at(1, offset + len + 1, offset + len),
    ))
}
