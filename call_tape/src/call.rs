// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Assembled call records.

use std::fmt;
use std::rc::Rc;

use crate::signature::FunctionSig;
use crate::value::Value;

/// One invocation record of a traced function.
///
/// A call owns its value trees; dropping the call drops them. The function
/// signature is shared with the parser and with every other call of the same
/// function.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    /// Per-trace serial number, assigned in ENTER order starting at 0.
    pub no: u32,
    sig: Rc<FunctionSig>,
    /// Positional arguments. Positions may arrive out of order and some may
    /// be absent; slots never observed in the stream stay `None`.
    pub args: Vec<Option<Value>>,
    /// Return value, if the producer recorded one.
    pub ret: Option<Value>,
}

impl Call {
    /// Creates an empty call record for `sig` with serial number `no`.
    #[must_use]
    pub fn new(sig: Rc<FunctionSig>, no: u32) -> Self {
        Self {
            no,
            sig,
            args: Vec::new(),
            ret: None,
        }
    }

    /// The traced function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.sig.name
    }

    /// The interned function signature.
    #[must_use]
    pub fn signature(&self) -> &Rc<FunctionSig> {
        &self.sig
    }

    /// The argument at `index`, if it was present in the stream.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index).and_then(Option::as_ref)
    }

    /// Records the argument at `index`, growing the argument vector with
    /// absent slots as needed.
    pub fn set_arg(&mut self, index: usize, value: Value) {
        if index >= self.args.len() {
            self.args.resize(index + 1, None);
        }
        self.args[index] = Some(value);
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.no, self.sig.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(name) = self.sig.arg_names.get(i) {
                write!(f, "{name} = ")?;
            }
            match arg {
                Some(value) => write!(f, "{value}")?,
                None => write!(f, "?")?,
            }
        }
        write!(f, ")")?;
        if let Some(ret) = &self.ret {
            write!(f, " = {ret}")?;
        }
        Ok(())
    }
}
