use stream_common::{Error, Flow};

use crate::context::ParseContext;
use crate::node::NodeRef;

/// A syntactic handler: pulls tokens from the context and builds nodes.
///
/// The parser drives the top handler of its stack. A handler returns
/// `Ok(())` when it is done with the buffered tokens and propagates
/// `Interrupt::Suspend` from reads past the last buffered token; opening a
/// node that is a handler itself unwinds with `Interrupt::Shift`.
pub trait ParserTokenHandler {
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()>;
}

impl<F> ParserTokenHandler for F
where
    F: Fn(&mut ParseContext<'_>) -> Flow<()>,
{
    fn consume_token_stream(&self, ctx: &mut ParseContext<'_>) -> Flow<()> {
        self(ctx)
    }
}

/// Notified of every node that leaves the open-node stack.
pub trait ParserNodeHandler {
    fn consume_node(&self, ctx: &mut ParseContext<'_>, node: &NodeRef) -> Result<(), Error>;
}

impl<F> ParserNodeHandler for F
where
    F: Fn(&mut ParseContext<'_>, &NodeRef) -> Result<(), Error>,
{
    fn consume_node(&self, ctx: &mut ParseContext<'_>, node: &NodeRef) -> Result<(), Error> {
        self(ctx, node)
    }
}
