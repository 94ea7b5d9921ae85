// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The gzip-decompressing byte source behind the parser.
//!
//! All reads are best effort: end of input and decompressor errors both
//! collapse into "nothing more to read", which is how the call assembler
//! expects a truncated stream to behave. Only tag-byte reads can observe end
//! of stream directly; integer and payload reads yield whatever bits were
//! still present.

use std::io::{self, BufReader, Read};

use flate2::read::MultiGzDecoder;

/// A single-consumer, forward-only byte source over a gzip stream.
///
/// Concatenated gzip members (RFC 1952) are decompressed transparently.
pub struct ByteSource {
    inner: Option<BufReader<MultiGzDecoder<Box<dyn Read>>>>,
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("inner", &self.inner.is_some())
            .finish()
    }
}

impl ByteSource {
    /// Wraps `reader`, treating its contents as a gzip stream.
    #[must_use]
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self {
            inner: Some(BufReader::new(MultiGzDecoder::new(reader))),
        }
    }

    /// Reads one byte, or `None` at end of stream.
    ///
    /// A decompressor error ends the stream the same way EOF does; the
    /// underlying reader is released and later reads short-circuit.
    pub fn read_byte(&mut self) -> Option<u8> {
        loop {
            let inner = self.inner.as_mut()?;
            let mut buf = [0u8; 1];
            match inner.read(&mut buf) {
                Ok(1) => return Some(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                _ => {
                    self.close();
                    return None;
                }
            }
        }
    }

    /// Reads a little-endian 7-bit continuation varint.
    ///
    /// End of stream mid-varint terminates the read and yields the bits
    /// accumulated so far. Groups past bit 63 are ignored; the producer
    /// guarantees at most 64 significant bits.
    pub fn read_uint(&mut self) -> u64 {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let Some(byte) = self.read_byte() else {
                break;
            };
            if shift < u64::BITS {
                value |= u64::from(byte & 0x7f) << shift;
            }
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        value
    }

    /// Reads a length-prefixed string payload.
    ///
    /// The bytes are returned as is; the wire format does not promise UTF-8.
    pub fn read_string(&mut self) -> Vec<u8> {
        let len = self.read_uint();
        self.read_bytes(len)
    }

    /// Reads a length-prefixed identifier, replacing invalid UTF-8.
    pub fn read_name(&mut self) -> String {
        String::from_utf8_lossy(&self.read_string()).into_owned()
    }

    /// Reads up to `len` raw bytes, stopping early at end of stream.
    pub fn read_bytes(&mut self, len: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        let Some(inner) = self.inner.as_mut() else {
            return buf;
        };
        match inner.by_ref().take(len).read_to_end(&mut buf) {
            Ok(n) if n as u64 == len => {}
            _ => self.close(),
        }
        buf
    }

    /// Reads a single-precision float stored in the writer's host byte order.
    pub fn read_f32(&mut self) -> f32 {
        let mut raw = [0u8; 4];
        self.read_exact_or_eof(&mut raw);
        f32::from_ne_bytes(raw)
    }

    /// Reads a double-precision float stored in the writer's host byte order.
    pub fn read_f64(&mut self) -> f64 {
        let mut raw = [0u8; 8];
        self.read_exact_or_eof(&mut raw);
        f64::from_ne_bytes(raw)
    }

    /// Releases the underlying reader. Further reads report end of stream.
    /// Idempotent.
    pub fn close(&mut self) {
        self.inner = None;
    }

    // Fills `buf`, leaving any bytes the stream no longer has zeroed.
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) {
        let Some(inner) = self.inner.as_mut() else {
            return;
        };
        let mut filled = 0;
        while filled < buf.len() {
            match inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        if filled < buf.len() {
            self.close();
        }
    }
}
