use std::rc::Rc;

use stream_common::{Flow, TokenRef};

use crate::lexer::LexerStream;

/// A lexical handler: reads runes from the stream and assembles tokens.
///
/// Handlers are stacked; the stream always drives the top one. A handler
/// returns `Ok(())` when it has nothing more to do with the buffered input,
/// and propagates `Interrupt::Suspend` from reads past the end of the buffer.
pub trait LexerHandler {
    fn consume_stream(&self, ctx: &mut LexerStream) -> Flow<()>;
}

impl<F> LexerHandler for F
where
    F: Fn(&mut LexerStream) -> Flow<()>,
{
    fn consume_stream(&self, ctx: &mut LexerStream) -> Flow<()> {
        self(ctx)
    }
}

/// Receives every finalized token of a stream.
///
/// The stream is handed back so a consumer can swap the active lexical
/// handler; the stream notices the swap and re-dispatches.
pub trait TokenConsumer {
    fn consume_token(&self, ctx: &mut LexerStream, token: TokenRef) -> Flow<()>;
}

impl<F> TokenConsumer for F
where
    F: Fn(&mut LexerStream, TokenRef) -> Flow<()>,
{
    fn consume_token(&self, ctx: &mut LexerStream, token: TokenRef) -> Flow<()> {
        self(ctx, token)
    }
}

/// Identity of shared handlers, ignoring vtables.
pub fn same_handler<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>())
}
