//! Control signals of the streaming engines.
//!
//! Handler code returns [`Flow`] values. Besides real failures, two
//! non-error outcomes travel through the same channel so that `?` unwinds
//! every frame between the point that detected them and the stream's
//! advance loop:
//!
//! - [`Interrupt::Suspend`]: a handler read past the buffered input and has
//!   to wait for the next `write`.
//! - [`Interrupt::Shift`]: the active handler was replaced; the advance loop
//!   re-dispatches to the new top of the handler stack.

use crate::{Error, ParsingError};

#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    Suspend,
    Shift,
    Fail(Error),
}

pub type Flow<T> = Result<T, Interrupt>;

impl Interrupt {
    pub fn is_suspend(&self) -> bool {
        matches!(self, Interrupt::Suspend)
    }

    /// Collapses the signal into an error for callers outside an advance loop.
    pub fn into_error(self) -> Error {
        match self {
            Interrupt::Suspend => Error::EndOfStream,
            Interrupt::Shift => Error::msg("handler shift outside of an advance loop"),
            Interrupt::Fail(err) => err,
        }
    }
}

impl From<Error> for Interrupt {
    fn from(err: Error) -> Self {
        Interrupt::Fail(err)
    }
}

impl From<ParsingError> for Interrupt {
    fn from(err: ParsingError) -> Self {
        Interrupt::Fail(Error::Parsing(Box::new(err)))
    }
}
