// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `call_tape`: a streaming decoder for compact binary call traces.
//!
//! A trace is a gzip-compressed log of function invocations recorded by an
//! API-interception tracer. Each record carries one call's name, positional
//! arguments, and optional return value as a typed value tree; function,
//! enum, bitmask, and struct signatures are defined inline on first reference
//! and back-referenced by id afterwards. The parser is a pull decoder: open a
//! file, then request one completed [`call::Call`] at a time. Calls surface
//! in LEAVE order, which may differ from ENTER order when the producer
//! interleaves records.
//!
//! ## Example
//!
//! ```no_run
//! use call_tape::parser::Parser;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parser = Parser::open("app.trace")?;
//! while let Some(call) = parser.next_call()? {
//!     println!("{call}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod format;
pub mod parser;
pub mod signature;
pub mod source;
pub mod value;
pub mod writer;
