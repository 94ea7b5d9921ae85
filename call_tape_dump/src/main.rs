// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![doc = "Dump tool for binary call traces.\n\n\
          Prints every call in a trace file, one per line, in the order the \n\
          calls completed. Parser warnings (incomplete calls, orphaned \n\
          leaves) go to the logger; set `RUST_LOG=warn` to see them.\n"]

use anyhow::{Context, Result, bail};

use call_tape::parser::Parser;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    let (Some(path), None) = (args.next(), args.next()) else {
        bail!("usage: call_tape_dump <trace-file>");
    };

    let mut parser = Parser::open(&path)
        .with_context(|| format!("cannot open trace {}", path.to_string_lossy()))?;

    loop {
        match parser.next_call() {
            Ok(Some(call)) => println!("{call}"),
            Ok(None) => break,
            Err(e) => bail!("malformed trace: {e}"),
        }
    }

    Ok(())
}
