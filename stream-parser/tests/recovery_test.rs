mod common;

use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use stream_parser::{Error, Flow, ParseContext, ParserStream};

/// A parser whose bottom handler leaves completed nodes on the argument stack.
fn collecting_parser() -> ParserStream {
    let handler = |ctx: &mut ParseContext<'_>| -> Flow<()> {
        loop {
            let token = ctx.next_token()?;
            if token.is_eof() {
                return Ok(());
            }
            accept(ctx, token)?;
        }
    };
    ParserStream::with_handlers(Rc::new(lex), Rc::new(handler))
}

#[test]
fn test_recover_discards_nodes_after_offset() {
    let (mut stream, document) = parser();
    let err = stream.write(b"(a (b $").unwrap_err();
    assert_eq!(err.recoverable_position.offset, 3);

    let checkpoint = stream.recover(3).unwrap();
    assert_eq!(checkpoint.offset(), 3);
    assert_eq!(stream.current_path().len(), 1);
    assert!(stream.error().is_none());

    stream.write(b"(b c) d)").unwrap();
    stream.close().unwrap();
    assert_eq!(document.render(), "(a (b c) d)");
}

#[test]
fn test_recover_matches_clean_parse() {
    let broken = "(x (y z) (w $ q) v)";
    let fixed = "(x (y z) (w q) v)";

    let (mut stream, document) = parser();
    let err = stream.write(broken.as_bytes()).unwrap_err();
    let checkpoint = stream.recover(err.recoverable_position.offset).unwrap();
    let resume: String = fixed.chars().skip(checkpoint.offset()).collect();
    stream.write(resume.as_bytes()).unwrap();
    stream.close().unwrap();

    assert_eq!(document.render(), parse_in_chunks(fixed, fixed.len()));
}

#[test]
fn test_failures_are_deterministic() {
    let run = || {
        let (mut stream, _document) = parser();
        stream.write(b"(a (b $ c))").unwrap_err()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_recover_without_open_nodes() {
    let (mut stream, document) = parser();
    let err = stream.write(b"a $").unwrap_err();
    assert_eq!(err.recoverable_position.offset, 1);

    let checkpoint = stream.recover(1).unwrap();
    assert_eq!(checkpoint.offset(), 1);
    stream.write(b" b").unwrap();
    stream.close().unwrap();
    assert_eq!(document.render(), "a b");
}

#[test]
fn test_recover_inside_innermost_node_rewinds_to_its_start() {
    let (mut stream, document) = parser();
    stream.write(b"(a b $").unwrap_err();

    let checkpoint = stream.recover(2).unwrap();
    assert_eq!(checkpoint.offset(), 0);
    assert!(stream.current_path().is_empty());

    stream.write(b"(a b c)").unwrap();
    stream.close().unwrap();
    assert_eq!(document.render(), "(a b c)");
}

#[test]
fn test_recover_past_input_is_rejected() {
    let (mut stream, _document) = parser();
    stream.write(b"(a $").unwrap_err();
    assert_eq!(
        stream.recover(100).unwrap_err(),
        Error::InvalidOffset { offset: 100, len: 4 }
    );
    // the failure is still in place
    assert!(stream.error().is_some());
}

#[test]
fn test_recover_after_close() {
    let (mut stream, document) = parser();
    stream.write(b"(a (b").unwrap();
    let err = stream.close().unwrap_err();
    assert_eq!(err.cause, Error::UnexpectedEof);

    stream.recover(err.recoverable_position.offset).unwrap();
    stream.write(b"(b))").unwrap();
    stream.close().unwrap();
    assert_eq!(document.render(), "(a (b))");
}

#[test]
fn test_reset_forgets_everything() {
    let (mut stream, document) = parser();
    stream.write(b"(a (b $").unwrap_err();

    stream.reset().unwrap();
    assert!(stream.error().is_none());
    assert!(stream.current_path().is_empty());
    assert_eq!(stream.argument_stack_len(), 0);
    assert_eq!(stream.position().offset, 0);

    stream.write(b"(x)").unwrap();
    stream.close().unwrap();
    assert_eq!(document.render(), "(x)");
}

#[test]
fn test_recover_inside_completed_node_rewinds_to_its_start() {
    let mut stream = collecting_parser();
    stream.write(b"(a b) c ").unwrap();
    assert_eq!(stream.argument_stack_len(), 2);

    let checkpoint = stream.recover(2).unwrap();
    assert_eq!(checkpoint.offset(), 0);
    assert_eq!(checkpoint.index(), 0);
    assert_eq!(stream.argument_stack_len(), 0);

    stream.write(b"(a b) c ").unwrap();
    assert_eq!(stream.argument_stack_len(), 2);
    let atom = stream.try_pop_argument::<Atom>().unwrap().unwrap();
    assert_eq!(atom.text(), "c");
    let list = stream.try_pop_argument::<List>().unwrap().unwrap();
    assert_eq!(list.children.borrow().len(), 2);
}

#[test]
fn test_recover_between_nodes_keeps_earlier_ones() {
    let mut stream = collecting_parser();
    stream.write(b"(a b) c ").unwrap();

    let checkpoint = stream.recover(6).unwrap();
    assert_eq!(checkpoint.offset(), 6);
    // `(`, `a`, `b` and `)` stay buffered
    assert_eq!(checkpoint.index(), 4);
    assert_eq!(stream.argument_stack_len(), 1);
}
