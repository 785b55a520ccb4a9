use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use stream_lexer::{Error, Flow, LexerStream, TokenKind, TokenSink};

const NUMBER: TokenKind = TokenKind::user(0);
const IDENT: TokenKind = TokenKind::user(1);
const OPERATOR: TokenKind = TokenKind::user(2);

fn rules(ctx: &mut LexerStream) -> Flow<()> {
    loop {
        let kind = ctx.current_token().kind;
        if kind == NUMBER || kind == IDENT {
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
            Some(ch) if ch.is_whitespace() => {}
            Some(ch) if ch.is_ascii_digit() => ctx.push_start(NUMBER, &ch.to_string()),
            Some(ch) if ch.is_alphabetic() => ctx.push_start(IDENT, &ch.to_string()),
            Some(ch) if "+-*/=()".contains(ch) => ctx.push_single(OPERATOR, &ch.to_string())?,
            Some(ch) => return Err(Error::UnexpectedChar(ch).into()),
        }
    }
}

fn source(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("let value{i} = (alpha{i} + {i}) * beta - {} / gamma\n", i * 7))
        .collect()
}

fn lex_in_chunks(input: &[u8], chunk: usize) -> usize {
    let sink = TokenSink::new();
    let mut lexer = LexerStream::with_handlers(Rc::new(rules), Rc::new(sink.clone()));
    for piece in input.chunks(chunk) {
        if lexer.write(piece).is_err() {
            return 0;
        }
    }
    if lexer.close().is_err() {
        return 0;
    }
    sink.len()
}

fn bench_chunked(c: &mut Criterion) {
    let input = source(2_000);
    let mut group = c.benchmark_group("lexer_chunked");
    group.throughput(Throughput::Bytes(input.len() as u64));

    for chunk in [1, 64, 4096, input.len()] {
        group.bench_function(format!("chunk_{chunk}"), |b| {
            b.iter(|| lex_in_chunks(black_box(input.as_bytes()), chunk))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chunked);
criterion_main!(benches);
