// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interned signatures and the id-indexed tables that hold them.
//!
//! The producer assigns each function, enum, bitmask, and struct a small
//! non-negative id and writes the defining payload at the first reference
//! only; every later reference carries the id alone. Signatures live for the
//! parser's lifetime and are shared into decoded values via `Rc`, so a
//! back-reference always resolves to the same object as the first.

use std::rc::Rc;

use crate::value::Value;

/// Interned metadata for a traced function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSig {
    /// Function name.
    pub name: String,
    /// Declared argument names, in positional order.
    pub arg_names: Vec<String>,
}

/// Interned metadata for an enum constant: its name and canonical value.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumSig {
    /// Constant name.
    pub name: String,
    /// The canonical value of the constant, usually an integer.
    pub value: Value,
}

/// One named flag of a bitmask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmaskFlag {
    /// Flag name.
    pub name: String,
    /// The flag's bit pattern. Zero is reserved for a leading "none" flag.
    pub value: u64,
}

/// Interned flag dictionary for a bitmask type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmaskSig {
    /// Flags in declaration order.
    pub flags: Vec<BitmaskFlag>,
}

/// Interned metadata for a struct type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructSig {
    /// Struct name.
    pub name: String,
    /// Member names, in declaration order.
    pub member_names: Vec<String>,
}

/// An id-indexed interning table populated on first reference.
///
/// Ids are issued by the producer; the table assumes neither density nor
/// order of first appearance, so slots are grown with empty entries as
/// needed.
#[derive(Debug)]
pub(crate) struct SigTable<T> {
    slots: Vec<Option<Rc<T>>>,
}

impl<T> SigTable<T> {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Looks up `id`, growing the table when the id is beyond its length.
    ///
    /// A miss means the defining payload follows in the stream and must be
    /// installed with [`SigTable::define`].
    pub(crate) fn lookup(&mut self, id: usize) -> Option<Rc<T>> {
        if id >= self.slots.len() {
            self.slots.resize(id + 1, None);
            return None;
        }
        self.slots[id].clone()
    }

    /// Installs the definition for `id` and returns it. Last writer wins.
    pub(crate) fn define(&mut self, id: usize, sig: Rc<T>) -> Rc<T> {
        if id >= self.slots.len() {
            self.slots.resize(id + 1, None);
        }
        self.slots[id] = Some(sig.clone());
        sig
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<T> Default for SigTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
