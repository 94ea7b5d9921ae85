// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The polymorphic value tree decoded from call arguments and returns.

use std::fmt;
use std::rc::Rc;

use crate::signature::{BitmaskSig, EnumSig, StructSig};

/// A decoded value tree node.
///
/// Values form trees of arbitrary depth with no cyclic sharing inside one
/// call. Enum, bitmask, and struct nodes reference their interned signature;
/// the signature is owned by the parser and shared across every value decoded
/// from the same stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer. Only zero and negative values travel with this tag;
    /// positive integers are carried as [`Value::UInt`].
    SInt(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A float. Single and double wire widths both decode to 64 bits.
    Float(f64),
    /// A string payload. UTF-8 is expected but not validated.
    String(Vec<u8>),
    /// A reference to an interned enum constant.
    Enum(Rc<EnumSig>),
    /// Raw mask bits plus the flag dictionary that names them.
    Bitmask(Rc<BitmaskSig>, u64),
    /// A fixed-length sequence of values.
    Array(Vec<Value>),
    /// One value per declared member, in declaration order.
    Struct(Rc<StructSig>, Vec<Value>),
    /// An opaque byte buffer.
    Blob(Vec<u8>),
    /// An opaque address captured from the traced process.
    Pointer(u64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::SInt(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(bytes) => {
                write!(f, "\"{}\"", String::from_utf8_lossy(bytes).escape_debug())
            }
            Self::Enum(sig) => write!(f, "{}", sig.name),
            Self::Bitmask(sig, bits) => fmt_bitmask(f, sig, *bits),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::Struct(sig, members) => {
                write!(f, "{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match sig.member_names.get(i) {
                        Some(name) => write!(f, "{name} = {member}")?,
                        None => write!(f, "{member}")?,
                    }
                }
                write!(f, "}}")
            }
            Self::Blob(bytes) => write!(f, "blob({})", bytes.len()),
            Self::Pointer(addr) => write!(f, "{addr:#x}"),
        }
    }
}

// Renders set flags by name, the unnamed remainder in hex.
fn fmt_bitmask(f: &mut fmt::Formatter<'_>, sig: &BitmaskSig, bits: u64) -> fmt::Result {
    if bits == 0 {
        if let Some(flag) = sig.flags.first() {
            if flag.value == 0 {
                return write!(f, "{}", flag.name);
            }
        }
        return write!(f, "0x0");
    }

    let mut remaining = bits;
    let mut first = true;
    for flag in &sig.flags {
        if flag.value != 0 && remaining & flag.value == flag.value {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{}", flag.name)?;
            remaining &= !flag.value;
            first = false;
        }
    }
    if remaining != 0 {
        if !first {
            write!(f, " | ")?;
        }
        write!(f, "{remaining:#x}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::signature::BitmaskFlag;

    fn mask_sig() -> Rc<BitmaskSig> {
        Rc::new(BitmaskSig {
            flags: vec![
                BitmaskFlag {
                    name: "NONE".into(),
                    value: 0,
                },
                BitmaskFlag {
                    name: "READ".into(),
                    value: 1,
                },
                BitmaskFlag {
                    name: "WRITE".into(),
                    value: 2,
                },
            ],
        })
    }

    #[test]
    fn scalars_render_plainly() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::SInt(-42).to_string(), "-42");
        assert_eq!(Value::UInt(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Pointer(0xdead).to_string(), "0xdead");
    }

    #[test]
    fn strings_are_quoted_and_escaped() {
        assert_eq!(Value::String(b"abc".to_vec()).to_string(), "\"abc\"");
        assert_eq!(Value::String(b"a\nb".to_vec()).to_string(), "\"a\\nb\"");
        assert_eq!(Value::String(Vec::new()).to_string(), "\"\"");
    }

    #[test]
    fn bitmask_renders_set_flags_by_name() {
        let sig = mask_sig();
        assert_eq!(Value::Bitmask(sig.clone(), 3).to_string(), "READ | WRITE");
        assert_eq!(Value::Bitmask(sig.clone(), 0).to_string(), "NONE");
        assert_eq!(Value::Bitmask(sig, 5).to_string(), "READ | 0x4");
    }

    #[test]
    fn aggregates_render_recursively() {
        let arr = Value::Array(vec![Value::UInt(1), Value::Null]);
        assert_eq!(arr.to_string(), "[1, NULL]");

        let sig = Rc::new(StructSig {
            name: "point".into(),
            member_names: vec!["x".into(), "y".into()],
        });
        let v = Value::Struct(sig, vec![Value::SInt(-1), Value::UInt(2)]);
        assert_eq!(v.to_string(), "{x = -1, y = 2}");

        assert_eq!(Value::Blob(vec![0, 1, 2]).to_string(), "blob(3)");
    }

    #[test]
    fn sint_zero_and_uint_zero_differ_by_tag() {
        assert_ne!(Value::SInt(0), Value::UInt(0));
        assert_eq!(Value::SInt(0), Value::SInt(-0));
    }
}
