// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pull-style trace parser: event loop, signature interning, and call
//! assembly.
//!
//! One logical reader drives [`Parser::next_call`] to completion before
//! issuing the next; there are no suspension points and no shared state
//! between parsers. Recoverable conditions (incomplete calls at end of
//! stream, a LEAVE for an unknown serial, a misplaced zero bitmask flag) are
//! logged and skipped. Unknown tags are fatal: the stream is out of sync and
//! the parser refuses to resume.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;

use log::warn;

use crate::call::Call;
use crate::format::{CallDetail, Event, TRACE_VERSION, ValueTag};
use crate::signature::{BitmaskFlag, BitmaskSig, EnumSig, FunctionSig, SigTable, StructSig};
use crate::source::ByteSource;
use crate::value::Value;

/// A fatal decode failure.
///
/// The producer and consumer share a closed tag set, so an unknown tag means
/// corruption or an incompatible future producer. After one of these the
/// byte position is meaningless and every later [`Parser::next_call`] returns
/// the same error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// An unknown top-level event tag.
    UnknownEvent(u8),
    /// An unknown call-detail tag.
    UnknownCallDetail(u8),
    /// An unknown value tag.
    UnknownValueTag(u8),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEvent(b) => write!(f, "unknown event {b:#04x}"),
            Self::UnknownCallDetail(b) => write!(f, "unknown call detail {b:#04x}"),
            Self::UnknownValueTag(b) => write!(f, "unknown value tag {b:#04x}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure to open a trace.
#[derive(Debug)]
pub enum OpenError {
    /// The file could not be opened.
    Io(io::Error),
    /// The trace declares a format version newer than [`TRACE_VERSION`].
    UnsupportedVersion(u64),
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot open trace: {e}"),
            Self::UnsupportedVersion(v) => {
                write!(f, "unsupported trace format version {v}")
            }
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::UnsupportedVersion(_) => None,
        }
    }
}

impl From<io::Error> for OpenError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A pull-style decoder for compact binary call traces.
///
/// The parser owns the byte source, the signature tables, and every call
/// between its ENTER and its LEAVE; a completed call is handed to the caller
/// on LEAVE. Dropping the parser releases everything still owned.
#[derive(Debug)]
pub struct Parser {
    src: ByteSource,
    version: u64,
    next_call_no: u32,
    pending: Vec<Call>,
    functions: SigTable<FunctionSig>,
    enums: SigTable<EnumSig>,
    bitmasks: SigTable<BitmaskSig>,
    structs: SigTable<StructSig>,
    fatal: Option<ParseError>,
}

impl Parser {
    /// Opens a trace file and validates its format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        Self::from_reader(File::open(path)?)
    }

    /// Wraps an already-open gzip stream and validates its format version.
    pub fn from_reader(reader: impl Read + 'static) -> Result<Self, OpenError> {
        let mut src = ByteSource::new(Box::new(reader));
        let version = src.read_uint();
        if version > TRACE_VERSION {
            return Err(OpenError::UnsupportedVersion(version));
        }
        Ok(Self {
            src,
            version,
            next_call_no: 0,
            pending: Vec::new(),
            functions: SigTable::new(),
            enums: SigTable::new(),
            bitmasks: SigTable::new(),
            structs: SigTable::new(),
            fatal: None,
        })
    }

    /// The format version declared in the trace header.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Decodes events until the next completed call.
    ///
    /// Returns `Ok(None)` at end of stream; calls still pending at that point
    /// are reported as incomplete and discarded. Calls surface in LEAVE
    /// order, which is why a returned call's serial may be lower than one
    /// returned earlier.
    pub fn next_call(&mut self) -> Result<Option<Call>, ParseError> {
        if let Some(e) = self.fatal {
            return Err(e);
        }
        match self.next_call_inner() {
            Err(e) => {
                self.fatal = Some(e);
                Err(e)
            }
            ok => ok,
        }
    }

    /// Releases the byte source, all pending calls, and all signatures.
    ///
    /// Calling it twice is a no-op; [`Parser::next_call`] reports end of
    /// stream afterwards. Dropping the parser has the same effect.
    pub fn close(&mut self) {
        self.src.close();
        self.pending.clear();
        self.functions.clear();
        self.enums.clear();
        self.bitmasks.clear();
        self.structs.clear();
    }

    fn next_call_inner(&mut self) -> Result<Option<Call>, ParseError> {
        loop {
            let Some(byte) = self.src.read_byte() else {
                for call in &self.pending {
                    warn!("incomplete call {call}");
                }
                return Ok(None);
            };
            match Event::from_byte(byte) {
                Some(Event::Enter) => self.parse_enter()?,
                Some(Event::Leave) => {
                    if let Some(call) = self.parse_leave()? {
                        return Ok(Some(call));
                    }
                }
                None => return Err(ParseError::UnknownEvent(byte)),
            }
        }
    }

    fn parse_enter(&mut self) -> Result<(), ParseError> {
        let id = self.src.read_uint() as usize;
        let sig = match self.functions.lookup(id) {
            Some(sig) => sig,
            None => {
                let name = self.src.read_name();
                let count = self.src.read_uint();
                let mut arg_names = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    arg_names.push(self.src.read_name());
                }
                self.functions
                    .define(id, Rc::new(FunctionSig { name, arg_names }))
            }
        };

        let mut call = Call::new(sig, self.next_call_no);
        self.next_call_no += 1;

        // A detail stream cut short by EOF abandons the half-formed call.
        if self.parse_call_details(&mut call)? {
            self.pending.push(call);
        }
        Ok(())
    }

    fn parse_leave(&mut self) -> Result<Option<Call>, ParseError> {
        let no = self.src.read_uint();
        let Some(index) = self.pending.iter().position(|c| u64::from(c.no) == no) else {
            warn!("leave for unknown call {no}");
            // Consume the orphaned record's detail stream to stay in sync.
            let mut orphan = Call::new(
                Rc::new(FunctionSig {
                    name: String::new(),
                    arg_names: Vec::new(),
                }),
                u32::try_from(no).unwrap_or(u32::MAX),
            );
            self.parse_call_details(&mut orphan)?;
            return Ok(None);
        };
        let mut call = self.pending.remove(index);
        if self.parse_call_details(&mut call)? {
            Ok(Some(call))
        } else {
            Ok(None)
        }
    }

    // Returns false when the stream ends mid-record; the caller discards the
    // call.
    fn parse_call_details(&mut self, call: &mut Call) -> Result<bool, ParseError> {
        loop {
            let Some(byte) = self.src.read_byte() else {
                return Ok(false);
            };
            match CallDetail::from_byte(byte) {
                Some(CallDetail::End) => return Ok(true),
                Some(CallDetail::Arg) => {
                    let index = self.src.read_uint() as usize;
                    let Some(value) = self.parse_value()? else {
                        return Ok(false);
                    };
                    call.set_arg(index, value);
                }
                Some(CallDetail::Ret) => {
                    let Some(value) = self.parse_value()? else {
                        return Ok(false);
                    };
                    call.ret = Some(value);
                }
                None => return Err(ParseError::UnknownCallDetail(byte)),
            }
        }
    }

    // Decodes one value. `Ok(None)` is the no-value sentinel for a stream
    // that ended where a value was expected.
    fn parse_value(&mut self) -> Result<Option<Value>, ParseError> {
        let Some(byte) = self.src.read_byte() else {
            return Ok(None);
        };
        let Some(tag) = ValueTag::from_byte(byte) else {
            return Err(ParseError::UnknownValueTag(byte));
        };
        let value = match tag {
            ValueTag::Null => Value::Null,
            ValueTag::False => Value::Bool(false),
            ValueTag::True => Value::Bool(true),
            ValueTag::SInt => {
                // The wire carries the magnitude of a non-positive number.
                let magnitude = self.src.read_uint();
                Value::SInt((magnitude as i64).wrapping_neg())
            }
            ValueTag::UInt => Value::UInt(self.src.read_uint()),
            ValueTag::Float => Value::Float(f64::from(self.src.read_f32())),
            ValueTag::Double => Value::Float(self.src.read_f64()),
            ValueTag::String => Value::String(self.src.read_string()),
            ValueTag::Enum => {
                let id = self.src.read_uint() as usize;
                let sig = match self.enums.lookup(id) {
                    Some(sig) => sig,
                    None => {
                        let name = self.src.read_name();
                        let Some(value) = self.parse_value()? else {
                            return Ok(None);
                        };
                        self.enums.define(id, Rc::new(EnumSig { name, value }))
                    }
                };
                Value::Enum(sig)
            }
            ValueTag::Bitmask => {
                let id = self.src.read_uint() as usize;
                let sig = match self.bitmasks.lookup(id) {
                    Some(sig) => sig,
                    None => {
                        let count = self.src.read_uint();
                        let mut flags = Vec::with_capacity(count as usize);
                        for i in 0..count {
                            let name = self.src.read_name();
                            let value = self.src.read_uint();
                            if value == 0 && i != 0 {
                                warn!("bitmask flag {name} is zero but is not the first flag");
                            }
                            flags.push(BitmaskFlag { name, value });
                        }
                        self.bitmasks.define(id, Rc::new(BitmaskSig { flags }))
                    }
                };
                // Every reference carries the raw mask bits, first or not.
                let bits = self.src.read_uint();
                Value::Bitmask(sig, bits)
            }
            ValueTag::Array => {
                let len = self.src.read_uint();
                let mut values = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    let Some(value) = self.parse_value()? else {
                        return Ok(None);
                    };
                    values.push(value);
                }
                Value::Array(values)
            }
            ValueTag::Struct => {
                let id = self.src.read_uint() as usize;
                let sig = match self.structs.lookup(id) {
                    Some(sig) => sig,
                    None => {
                        let name = self.src.read_name();
                        let count = self.src.read_uint();
                        let mut member_names = Vec::with_capacity(count as usize);
                        for _ in 0..count {
                            member_names.push(self.src.read_name());
                        }
                        self.structs
                            .define(id, Rc::new(StructSig { name, member_names }))
                    }
                };
                let mut members = Vec::with_capacity(sig.member_names.len());
                for _ in 0..sig.member_names.len() {
                    let Some(value) = self.parse_value()? else {
                        return Ok(None);
                    };
                    members.push(value);
                }
                Value::Struct(sig, members)
            }
            ValueTag::Blob => {
                let len = self.src.read_uint();
                Value::Blob(self.src.read_bytes(len))
            }
            ValueTag::Opaque => Value::Pointer(self.src.read_uint()),
        };
        Ok(Some(value))
    }
}

impl Drop for Parser {
    fn drop(&mut self) {
        self.close();
    }
}
