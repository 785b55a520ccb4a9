//! Reads JSON from stdin in small chunks and prints every node as it
//! completes, indented by the number of nodes still open around it.
//!
//! Usage: `json-tree [chunk-size] < document.json`

use std::io::{self, Read};
use std::process::ExitCode;
use std::rc::Rc;

use json_grammar::{describe, JsonParser};
use stream_common::{Error, ParsingError};
use stream_parser::{NodeRef, ParseContext};

const DEFAULT_CHUNK: usize = 64;

fn report(err: &ParsingError) {
    eprintln!("error: {err}");
    for older in err.history().skip(1) {
        eprintln!("  after: {older}");
    }
}

fn print_node(ctx: &mut ParseContext<'_>, node: &NodeRef) -> Result<(), Error> {
    let depth = ctx.current_path().len();
    println!("{}{}", "  ".repeat(depth), describe(node));
    Ok(())
}

fn main() -> ExitCode {
    let chunk = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_CHUNK);

    let mut parser = JsonParser::new();
    if let Err(err) = parser.stream_mut().push_node_consumer(Rc::new(print_node)) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let mut stdin = io::stdin().lock();
    let mut buf = vec![0u8; chunk];
    loop {
        let read = match stdin.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                eprintln!("error: reading stdin: {err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = parser.write(&buf[..read]) {
            report(&err);
            return ExitCode::FAILURE;
        }
    }
    if let Err(err) = parser.close() {
        report(&err);
        return ExitCode::FAILURE;
    }

    for value in parser.values() {
        println!("= {value}");
    }
    ExitCode::SUCCESS
}
