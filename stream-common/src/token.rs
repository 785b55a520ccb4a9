use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::Position;

/// Identifier of a token category.
///
/// A handful of ids are reserved by the engines; grammars allocate their own
/// kinds with [`TokenKind::user`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKind(u16);

impl TokenKind {
    /// No token pending.
    pub const INVALID: TokenKind = TokenKind(0);
    /// Synthetic end of input, emitted once by `close`.
    pub const EOF: TokenKind = TokenKind(1);
    /// End of the buffered stream.
    pub const EOS: TokenKind = TokenKind(2);

    const FIRST_USER: u16 = 16;

    /// Largest id accepted by [`TokenKind::user`].
    pub const MAX_USER: u16 = u16::MAX - Self::FIRST_USER;

    /// The `id`-th grammar-defined kind.
    ///
    /// Panics if `id` is above [`TokenKind::MAX_USER`], which fails the build
    /// when used in a `const` item.
    pub const fn user(id: u16) -> Self {
        match Self::try_user(id) {
            Some(kind) => kind,
            None => panic!("user token kind id out of range"),
        }
    }

    pub const fn try_user(id: u16) -> Option<Self> {
        match Self::FIRST_USER.checked_add(id) {
            Some(raw) => Some(TokenKind(raw)),
            None => None,
        }
    }

    pub const fn id(self) -> u16 {
        self.0
    }

    pub const fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_USER
    }
}

impl Default for TokenKind {
    fn default() -> Self {
        TokenKind::INVALID
    }
}

impl fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TokenKind::INVALID => f.write_str("INVALID"),
            TokenKind::EOF => f.write_str("EOF"),
            TokenKind::EOS => f.write_str("EOS"),
            TokenKind(id) if id < Self::FIRST_USER => write!(f, "Reserved({id})"),
            TokenKind(id) => write!(f, "Kind({})", id - Self::FIRST_USER),
        }
    }
}

/// Tokens are shared between the lexer, the parser's token buffer and nodes.
pub type TokenRef = Rc<Token>;

/// A finalized (or pending) lexical token.
///
/// `start` is inclusive and `end` exclusive. `index` is the position of the
/// token in the emission order of its stream.
#[derive(Clone, Default)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub start: Position,
    pub end: Position,
    pub index: usize,
    /// Opaque payload attached by grammars; ignored by equality.
    pub user_data: Option<Rc<dyn Any>>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            kind,
            value: value.into(),
            start,
            end,
            index: 0,
            user_data: None,
        }
    }

    pub fn with_user_data(mut self, data: Rc<dyn Any>) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Same as [`Token::value`].
    pub fn text(&self) -> &str {
        &self.value
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Length of the token in runes.
    pub fn span_len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EOF
    }

    /// Typed view of the attached payload.
    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data.as_deref().and_then(|data| data.downcast_ref::<T>())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.value == other.value
            && self.start == other.start
            && self.end == other.end
            && self.index == other.index
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Token");
        s.field("kind", &self.kind)
            .field("value", &self.value)
            .field("start", &self.start.offset)
            .field("end", &self.end.offset)
            .field("index", &self.index);
        if self.user_data.is_some() {
            s.field("user_data", &"..");
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_kinds() {
        assert!(TokenKind::INVALID.is_reserved());
        assert!(TokenKind::EOF.is_reserved());
        assert!(!TokenKind::user(0).is_reserved());
        assert_ne!(TokenKind::user(0), TokenKind::user(1));
        assert_eq!(TokenKind::default(), TokenKind::INVALID);
        assert_eq!(format!("{:?}", TokenKind::user(3)), "Kind(3)");
    }

    #[test]
    fn test_user_kind_range() {
        let last = TokenKind::user(TokenKind::MAX_USER);
        assert_eq!(last.id(), u16::MAX);
        assert_eq!(format!("{last:?}"), format!("Kind({})", TokenKind::MAX_USER));
        assert_eq!(TokenKind::try_user(TokenKind::MAX_USER + 1), None);
        assert_eq!(TokenKind::try_user(2), Some(TokenKind::user(2)));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_user_kind_overflow_panics() {
        let id = std::hint::black_box(u16::MAX);
        let _ = TokenKind::user(id);
    }

    #[test]
    fn test_token_span() {
        let token = Token::new(
            TokenKind::user(0),
            "héllo",
            Position::at(1, 3, 2),
            Position::at(1, 8, 7),
        );
        assert_eq!(token.span_len(), 5);
        assert_eq!(token.text(), "héllo");
        assert!(!token.is_eof());
    }

    #[test]
    fn test_equality_ignores_user_data() {
        let plain = Token::new(TokenKind::user(1), "x", Position::new(), Position::at(1, 2, 1));
        let tagged = plain.clone().with_user_data(Rc::new(42u32));
        assert_eq!(plain, tagged);
        assert_eq!(tagged.user_data::<u32>(), Some(&42));
        assert_eq!(tagged.user_data::<String>(), None);
        assert!(format!("{tagged:?}").contains("user_data"));
    }
}
