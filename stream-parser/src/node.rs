use std::any::Any;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use stream_common::{Error, TokenRef};
use stream_lexer::LexerHandler;

use crate::traits::ParserTokenHandler;

/// Upcast helper so `dyn Node` values can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Nodes are shared between the open-node stack, the argument stack and
/// whatever tree the grammar builds.
pub type NodeRef = Rc<dyn Node>;

/// A node of the parse tree.
///
/// Besides its token span a node may expose capabilities: a node that
/// returns a [`ParserTokenHandler`] becomes the active sub-parser while it is
/// open, and one that returns a [`LexerHandler`] switches the lexical rules
/// for the same span.
pub trait Node: AsAny + fmt::Debug {
    fn start_token(&self) -> Option<TokenRef>;

    fn end_token(&self) -> Option<TokenRef>;

    fn token_handler(self: Rc<Self>) -> Option<Rc<dyn ParserTokenHandler>> {
        None
    }

    fn lexer_handler(self: Rc<Self>) -> Option<Rc<dyn LexerHandler>> {
        None
    }
}

/// A node built from several tokens and child nodes, opened and closed in
/// LIFO order.
pub trait CompositeNode: Node {
    fn set_start_token(&self, token: TokenRef);

    fn set_end_token(&self, token: TokenRef);
}

/// A node standing for exactly one token.
pub trait TerminalNode: Node {
    fn set_terminal_token(&self, token: TokenRef) -> Result<(), Error>;
}

/// Token span storage for composite nodes.
#[derive(Debug, Default)]
pub struct CompositeNodeBase {
    start: RefCell<Option<TokenRef>>,
    end: RefCell<Option<TokenRef>>,
}

impl CompositeNodeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_token(&self) -> Option<TokenRef> {
        self.start.borrow().clone()
    }

    pub fn end_token(&self) -> Option<TokenRef> {
        self.end.borrow().clone()
    }

    pub fn set_start_token(&self, token: TokenRef) {
        *self.start.borrow_mut() = Some(token);
    }

    pub fn set_end_token(&self, token: TokenRef) {
        *self.end.borrow_mut() = Some(token);
    }

    /// Whether the node has seen its end token.
    pub fn is_complete(&self) -> bool {
        self.end.borrow().is_some()
    }
}

/// Token storage for terminal nodes; the token can be bound once.
#[derive(Debug, Default)]
pub struct TerminalNodeBase {
    token: OnceCell<TokenRef>,
}

impl TerminalNodeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<TokenRef> {
        self.token.get().cloned()
    }

    pub fn bind(&self, token: TokenRef) -> Result<(), Error> {
        self.token
            .set(token)
            .map_err(|_| Error::TerminalAlreadyBound)
    }
}

/// Borrows a node as its concrete type.
pub fn node_as<T: Node>(node: &NodeRef) -> Option<&T> {
    (**node).as_any().downcast_ref::<T>()
}

/// Shares a node as its concrete type.
pub fn downcast_node<T: Node>(node: &NodeRef) -> Option<Rc<T>> {
    AsAny::into_any_rc(Rc::clone(node)).downcast::<T>().ok()
}

/// Start offset of a node, if it has a start token.
pub fn node_start(node: &NodeRef) -> Option<usize> {
    node.start_token().map(|token| token.start.offset)
}

/// Whether `node` and `other` are the same allocation.
pub fn same_node<T: ?Sized>(node: &NodeRef, other: &T) -> bool {
    std::ptr::eq(
        Rc::as_ptr(node).cast::<()>(),
        (other as *const T).cast::<()>(),
    )
}
