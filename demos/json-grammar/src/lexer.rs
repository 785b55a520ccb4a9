//! Lexical rules of the reference grammar.

use stream_common::{Error, Flow, TokenKind};
use stream_lexer::LexerStream;

pub const OPEN_OBJECT: TokenKind = TokenKind::user(0);
pub const CLOSE_OBJECT: TokenKind = TokenKind::user(1);
pub const OPEN_ARRAY: TokenKind = TokenKind::user(2);
pub const CLOSE_ARRAY: TokenKind = TokenKind::user(3);
pub const COLON: TokenKind = TokenKind::user(4);
pub const COMMA: TokenKind = TokenKind::user(5);
/// Raw string literal, quotes and escapes included.
pub const STRING: TokenKind = TokenKind::user(6);
pub const NUMBER: TokenKind = TokenKind::user(7);
/// Bare words; only `true`, `false` and `null` are valid values.
pub const IDENT: TokenKind = TokenKind::user(8);

/// Human readable name of a token kind, for diagnostics.
pub fn kind_name(kind: TokenKind) -> &'static str {
    match kind {
        OPEN_OBJECT => "`{`",
        CLOSE_OBJECT => "`}`",
        OPEN_ARRAY => "`[`",
        CLOSE_ARRAY => "`]`",
        COLON => "`:`",
        COMMA => "`,`",
        STRING => "string",
        NUMBER => "number",
        IDENT => "identifier",
        TokenKind::EOF => "end of input",
        _ => "unknown token",
    }
}

fn is_number_char(ch: char) -> bool {
    ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-')
}

/// Tokenizes JSON text.
///
/// Every decision is taken on lookahead before anything is consumed, so a
/// suspended run resumes exactly where it stopped whatever the chunking.
pub fn lex(ctx: &mut LexerStream) -> Flow<()> {
    loop {
        match ctx.current_token().kind {
            STRING => string_body(ctx)?,
            NUMBER => match ctx.la(0)? {
                Some(ch) if is_number_char(ch) => {
                    ctx.next_char()?;
                    ctx.append_char(ch);
                }
                _ => ctx.push_end()?,
            },
            IDENT => match ctx.la(0)? {
                Some(ch) if ch.is_alphanumeric() || ch == '_' => {
                    ctx.next_char()?;
                    ctx.append_char(ch);
                }
                _ => ctx.push_end()?,
            },
            _ => match ctx.next_char()? {
                None => return Ok(()),
                Some(ch) if ch.is_whitespace() => {}
                Some('{') => ctx.push_single(OPEN_OBJECT, "{")?,
                Some('}') => ctx.push_single(CLOSE_OBJECT, "}")?,
                Some('[') => ctx.push_single(OPEN_ARRAY, "[")?,
                Some(']') => ctx.push_single(CLOSE_ARRAY, "]")?,
                Some(':') => ctx.push_single(COLON, ":")?,
                Some(',') => ctx.push_single(COMMA, ",")?,
                Some('"') => ctx.push_start(STRING, "\""),
                Some(ch) if ch == '-' || ch.is_ascii_digit() => {
                    ctx.push_start(NUMBER, &ch.to_string())
                }
                Some(ch) if ch.is_alphabetic() || ch == '_' => {
                    ctx.push_start(IDENT, &ch.to_string())
                }
                Some(ch) => return Err(Error::UnexpectedChar(ch).into()),
            },
        }
    }
}

/// One step inside a string literal.
fn string_body(ctx: &mut LexerStream) -> Flow<()> {
    match ctx.la(0)? {
        None => Err(Error::UnexpectedEof.into()),
        Some('"') => {
            ctx.next_char()?;
            ctx.append_char('"');
            ctx.push_end()
        }
        Some('\\') => {
            let escaped = match ctx.la(1)? {
                Some(ch) if matches!(ch, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => ch,
                Some(ch) => {
                    ctx.next_char()?;
                    ctx.next_char()?;
                    return Err(Error::UnexpectedChar(ch).into());
                }
                None => return Err(Error::UnexpectedEof.into()),
            };
            ctx.next_char()?;
            ctx.next_char()?;
            ctx.append_char('\\');
            ctx.append_char(escaped);
            Ok(())
        }
        Some(ch) if ch.is_control() => {
            ctx.next_char()?;
            Err(Error::UnexpectedChar(ch).into())
        }
        Some(ch) => {
            ctx.next_char()?;
            ctx.append_char(ch);
            Ok(())
        }
    }
}
