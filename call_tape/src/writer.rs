// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A compliant trace writer.
//!
//! Producers and round-trip tests use this to emit the same byte stream the
//! parser consumes. Signatures are interned by identity: the first record
//! referencing a signature carries its defining payload, every later record
//! carries the id alone. A trace written from a sequence of calls parses
//! back to structurally equal calls.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::{self, Write};
use std::rc::Rc;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::call::Call;
use crate::format::{self, CallDetail, Event, TRACE_VERSION, ValueTag};
use crate::signature::{BitmaskSig, EnumSig, FunctionSig, StructSig};
use crate::value::Value;

/// A gzip-compressing writer for the compact call-trace format.
pub struct TraceWriter<W: Write> {
    out: GzEncoder<W>,
    next_no: u32,
    functions: InternTable<FunctionSig>,
    enums: InternTable<EnumSig>,
    bitmasks: InternTable<BitmaskSig>,
    structs: InternTable<StructSig>,
}

impl<W: Write> TraceWriter<W> {
    /// Starts a trace on `out`, writing the version header.
    pub fn new(out: W) -> io::Result<Self> {
        let mut out = GzEncoder::new(out, Compression::default());
        format::write_uint(&mut out, TRACE_VERSION)?;
        Ok(Self {
            out,
            next_no: 0,
            functions: InternTable::new(),
            enums: InternTable::new(),
            bitmasks: InternTable::new(),
            structs: InternTable::new(),
        })
    }

    /// Writes the ENTER record for `call`: function signature and every
    /// present argument.
    ///
    /// ENTER records never carry a serial number; the decoder assigns them by
    /// counting ENTERs from zero. Enters must therefore be written in exact
    /// `no` order (0, 1, 2, ...); a call out of sequence is refused with
    /// [`io::ErrorKind::InvalidInput`] before anything hits the stream.
    pub fn write_enter(&mut self, call: &Call) -> io::Result<()> {
        if call.no != self.next_no {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("call {} entered out of order, expected {}", call.no, self.next_no),
            ));
        }
        self.next_no += 1;
        self.out.write_all(&[Event::Enter as u8])?;
        let sig = call.signature();
        let (id, first) = self.functions.intern(sig);
        format::write_uint(&mut self.out, id)?;
        if first {
            format::write_string(&mut self.out, sig.name.as_bytes())?;
            format::write_uint(&mut self.out, sig.arg_names.len() as u64)?;
            for name in &sig.arg_names {
                format::write_string(&mut self.out, name.as_bytes())?;
            }
        }
        for (index, arg) in call.args.iter().enumerate() {
            if let Some(value) = arg {
                self.out.write_all(&[CallDetail::Arg as u8])?;
                format::write_uint(&mut self.out, index as u64)?;
                self.write_value(value)?;
            }
        }
        self.out.write_all(&[CallDetail::End as u8])
    }

    /// Writes the LEAVE record for `call`: its serial number and return
    /// value, if any.
    ///
    /// The serial is the LEAVE's match key, so it must belong to a call whose
    /// ENTER was already written; anything else is refused with
    /// [`io::ErrorKind::InvalidInput`].
    pub fn write_leave(&mut self, call: &Call) -> io::Result<()> {
        if call.no >= self.next_no {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("leave for call {} that was never entered", call.no),
            ));
        }
        self.out.write_all(&[Event::Leave as u8])?;
        format::write_uint(&mut self.out, u64::from(call.no))?;
        if let Some(ret) = &call.ret {
            self.out.write_all(&[CallDetail::Ret as u8])?;
            self.write_value(ret)?;
        }
        self.out.write_all(&[CallDetail::End as u8])
    }

    /// Writes `call` as an adjacent ENTER/LEAVE pair.
    pub fn write_call(&mut self, call: &Call) -> io::Result<()> {
        self.write_enter(call)?;
        self.write_leave(call)
    }

    /// Flushes the compressor and returns the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.out.finish()
    }

    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Null => self.out.write_all(&[ValueTag::Null as u8]),
            Value::Bool(false) => self.out.write_all(&[ValueTag::False as u8]),
            Value::Bool(true) => self.out.write_all(&[ValueTag::True as u8]),
            Value::SInt(v) => {
                // Magnitude encoding: this tag only ever carries zero or
                // negative numbers; positives travel as UInt.
                self.out.write_all(&[ValueTag::SInt as u8])?;
                format::write_uint(&mut self.out, v.unsigned_abs())
            }
            Value::UInt(v) => {
                self.out.write_all(&[ValueTag::UInt as u8])?;
                format::write_uint(&mut self.out, *v)
            }
            Value::Float(v) => {
                // The in-memory model is always 64-bit, so the narrow wire
                // width never round-trips.
                self.out.write_all(&[ValueTag::Double as u8])?;
                self.out.write_all(&v.to_ne_bytes())
            }
            Value::String(bytes) => {
                self.out.write_all(&[ValueTag::String as u8])?;
                format::write_string(&mut self.out, bytes)
            }
            Value::Enum(sig) => {
                self.out.write_all(&[ValueTag::Enum as u8])?;
                let (id, first) = self.enums.intern(sig);
                format::write_uint(&mut self.out, id)?;
                if first {
                    format::write_string(&mut self.out, sig.name.as_bytes())?;
                    self.write_value(&sig.value)?;
                }
                Ok(())
            }
            Value::Bitmask(sig, bits) => {
                self.out.write_all(&[ValueTag::Bitmask as u8])?;
                let (id, first) = self.bitmasks.intern(sig);
                format::write_uint(&mut self.out, id)?;
                if first {
                    format::write_uint(&mut self.out, sig.flags.len() as u64)?;
                    for flag in &sig.flags {
                        format::write_string(&mut self.out, flag.name.as_bytes())?;
                        format::write_uint(&mut self.out, flag.value)?;
                    }
                }
                format::write_uint(&mut self.out, *bits)
            }
            Value::Array(values) => {
                self.out.write_all(&[ValueTag::Array as u8])?;
                format::write_uint(&mut self.out, values.len() as u64)?;
                for v in values {
                    self.write_value(v)?;
                }
                Ok(())
            }
            Value::Struct(sig, members) => {
                self.out.write_all(&[ValueTag::Struct as u8])?;
                let (id, first) = self.structs.intern(sig);
                format::write_uint(&mut self.out, id)?;
                if first {
                    format::write_string(&mut self.out, sig.name.as_bytes())?;
                    format::write_uint(&mut self.out, sig.member_names.len() as u64)?;
                    for name in &sig.member_names {
                        format::write_string(&mut self.out, name.as_bytes())?;
                    }
                }
                // The parser reads exactly one value per declared member.
                debug_assert_eq!(members.len(), sig.member_names.len());
                for v in members {
                    self.write_value(v)?;
                }
                Ok(())
            }
            Value::Blob(bytes) => {
                self.out.write_all(&[ValueTag::Blob as u8])?;
                format::write_uint(&mut self.out, bytes.len() as u64)?;
                self.out.write_all(bytes)
            }
            Value::Pointer(addr) => {
                self.out.write_all(&[ValueTag::Opaque as u8])?;
                format::write_uint(&mut self.out, *addr)
            }
        }
    }
}

// Assigns ids by identity, first come first numbered.
struct InternTable<T> {
    ids: HashMap<*const T, u64>,
    // Pins each signature so its address, and with it its id, stays unique
    // for the writer's lifetime.
    keep: Vec<Rc<T>>,
}

impl<T> InternTable<T> {
    fn new() -> Self {
        Self {
            ids: HashMap::new(),
            keep: Vec::new(),
        }
    }

    // Returns the id for `sig` and whether this is its first reference.
    fn intern(&mut self, sig: &Rc<T>) -> (u64, bool) {
        let next = self.ids.len() as u64;
        match self.ids.entry(Rc::as_ptr(sig)) {
            Entry::Occupied(e) => (*e.get(), false),
            Entry::Vacant(e) => {
                e.insert(next);
                self.keep.push(sig.clone());
                (next, true)
            }
        }
    }
}
