mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use stream_parser::{
    Error, Flow, Interrupt, NodeRef, ParseContext, ParserStream, ParserTokenHandler, TokenKind,
};

#[test]
fn test_nested_lists() {
    assert_eq!(parse_in_chunks("(a (b c) d) e", 64), "(a (b c) d) e");
}

#[test]
fn test_chunk_invariance() {
    let input = "(define (sq x) (mul x x))\n(sq 12)";
    let whole = parse_in_chunks(input, input.len());
    assert_eq!(whole, "(define (sq x) (mul x x)) (sq 12)");
    for chunk in 1..6 {
        assert_eq!(parse_in_chunks(input, chunk), whole, "chunk size {chunk}");
    }
}

#[test]
fn test_io_copy_into_parser() {
    let (mut stream, document) = parser();
    let mut input: &[u8] = b"(x (y))";
    std::io::copy(&mut input, &mut stream).unwrap();
    stream.close().unwrap();
    assert_eq!(document.render(), "(x (y))");
}

#[test]
fn test_node_consumer_sees_completion_order() {
    let (mut stream, _document) = parser();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    stream
        .push_node_consumer(Rc::new(
            move |ctx: &mut ParseContext<'_>, node: &NodeRef| -> Result<(), Error> {
                record
                    .borrow_mut()
                    .push((render(node), ctx.current_path().len()));
                Ok(())
            },
        ))
        .unwrap();

    stream.write(b"(a (b c) d) e").unwrap();
    stream.close().unwrap();

    let expected: Vec<(String, usize)> = vec![
        ("a".into(), 1),
        ("b".into(), 2),
        ("c".into(), 2),
        ("(b c)".into(), 1),
        ("d".into(), 1),
        ("(a (b c) d)".into(), 0),
        ("e".into(), 0),
    ];
    assert_eq!(*seen.borrow(), expected);
}

#[test]
fn test_end_composite_requires_top_of_stack() {
    let outer = Rc::new(Group::default());
    let inner = Rc::new(Group::default());
    let handler = {
        let (outer, inner) = (outer.clone(), inner.clone());
        move |ctx: &mut ParseContext<'_>| -> Flow<()> {
            let token = ctx.next_token()?;
            ctx.begin_composite(outer.clone(), Some(token.clone()))?;
            ctx.begin_composite(inner.clone(), Some(token))?;
            ctx.end_composite(&*outer, None)
        }
    };

    let mut stream = ParserStream::new();
    stream.push_token_parser(Rc::new(handler)).unwrap();
    let err = stream.write_token(token(ATOM, "x", 0)).unwrap_err();

    assert_eq!(err.cause, Error::UnbalancedComposite);
    assert!(err.is_grammar_bug());
    assert_eq!(stream.current_path().len(), 2);
    // the failed stream keeps answering with the same error
    assert_eq!(stream.write(b"(").unwrap_err(), err);
}

#[test]
fn test_consume_next_token_leaves_token_in_place() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    let handler = move |ctx: &mut ParseContext<'_>| -> Flow<()> {
        match ctx.consume_next_token(&[OPEN]) {
            Err(Interrupt::Fail(Error::InvalidToken { expected, found })) => {
                assert_eq!(expected, vec![OPEN]);
                assert_eq!(found, ATOM);
            }
            other => panic!("unexpected {other:?}"),
        }
        let token = ctx.next_token()?;
        record.borrow_mut().push(token.value.clone());
        Ok(())
    };

    let mut stream = ParserStream::new();
    stream.push_token_parser(Rc::new(handler)).unwrap();
    stream.write_token(token(ATOM, "kept", 0)).unwrap();
    assert_eq!(*seen.borrow(), vec!["kept".to_string()]);
}

#[test]
fn test_invalid_token_position() {
    let mut stream = ParserStream::new();
    stream.push_token_parser(Rc::new(Document::default())).unwrap();
    let err = stream
        .write_tokens(vec![token(OPEN, "(", 0), token(ATOM, "a", 1), token(TokenKind::user(9), "?", 3)])
        .unwrap_err();
    assert_eq!(
        err.cause,
        Error::InvalidToken {
            expected: vec![OPEN, ATOM],
            found: TokenKind::user(9)
        }
    );
    assert_eq!(err.position.offset, 3);
    assert_eq!(err.recoverable_position.offset, 0);
}

#[test]
fn test_lookahead_suspends_until_token_arrives() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    let handler = move |ctx: &mut ParseContext<'_>| -> Flow<()> {
        let second = ctx.peek_token(1)?;
        let first = ctx.next_token()?;
        ctx.next_token()?;
        record
            .borrow_mut()
            .push(format!("{}{}", first.value, second.value));
        Ok(())
    };

    let mut stream = ParserStream::new();
    stream.push_token_parser(Rc::new(handler)).unwrap();
    stream.write_token(token(ATOM, "a", 0)).unwrap();
    assert!(seen.borrow().is_empty());
    stream.write_token(token(ATOM, "b", 2)).unwrap();
    assert_eq!(*seen.borrow(), vec!["ab".to_string()]);
}

#[test]
fn test_argument_stack_is_typed() {
    let mut stream = ParserStream::new();
    stream.push_argument(Rc::new(Atom::default())).unwrap();

    assert!(matches!(
        stream.try_pop_argument::<List>(),
        Err(Error::UnexpectedNode { .. })
    ));
    assert_eq!(stream.argument_stack_len(), 1);
    assert!(stream.try_pop_argument::<Atom>().unwrap().is_some());
    assert!(stream.try_pop_argument::<Atom>().unwrap().is_none());
    assert!(matches!(stream.pop_argument(), Err(Error::EmptyArgumentStack)));
    assert!(matches!(
        stream.consume_as::<Atom>(),
        Err(Error::EmptyArgumentStack)
    ));
}

#[test]
fn test_consume_as_prefers_current_node() {
    let mut stream = ParserStream::new();
    let list = Rc::new(List::default());
    stream.push_in_stack(list.clone()).unwrap();
    stream.push_argument(Rc::new(Atom::default())).unwrap();

    let current = stream.consume_as::<List>().unwrap();
    assert!(Rc::ptr_eq(&current, &list));
    assert_eq!(stream.argument_stack_len(), 1);
}

#[test]
fn test_handler_reentry_is_rejected() {
    let mut stream = ParserStream::new();
    let list = Rc::new(List::default());
    stream.push_in_stack(list.clone()).unwrap();
    assert_eq!(stream.push_in_stack(list), Err(Error::HandlerReentry));
    assert_eq!(stream.current_path().len(), 1);

    let handler: Rc<dyn ParserTokenHandler> = Rc::new(Document::default());
    stream.push_token_parser(handler.clone()).unwrap();
    assert_eq!(stream.push_token_parser(handler), Err(Error::HandlerReentry));
}

#[test]
fn test_missing_handlers() {
    let mut stream = ParserStream::new();
    stream.push_lexer_handler(Rc::new(lex)).unwrap();
    let err = stream.write(b"(a").unwrap_err();
    assert_eq!(err.cause, Error::NoTokenHandler);
    assert!(err.is_grammar_bug());

    let mut stream = ParserStream::new();
    assert!(matches!(stream.pop_token_parser(), Err(Error::NoTokenHandler)));
    assert!(matches!(stream.pop_node_consumer(), Err(Error::NoNodeHandler)));
    assert!(matches!(stream.pop_lexer_handler(), Err(Error::NoLexerHandler)));
}

#[test]
fn test_unclosed_list_at_close() {
    let (mut stream, _document) = parser();
    stream.write(b"(a (b").unwrap();
    let err = stream.close().unwrap_err();
    assert_eq!(err.cause, Error::UnexpectedEof);
    assert_eq!(err.position.offset, 5);
    assert_eq!(err.recoverable_position.offset, 3);
}

#[test]
fn test_lexical_failure_points_at_open_node() {
    let (mut stream, _document) = parser();
    let err = stream.write(b"(a (b $").unwrap_err();
    assert_eq!(err.cause, Error::UnexpectedChar('$'));
    assert_eq!(err.position.offset, 7);
    assert_eq!(err.recoverable_position.offset, 3);
    assert_eq!(stream.error(), Some(err));
}
