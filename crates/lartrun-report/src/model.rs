//! Typed decoding of counterexample models.
//!
//! Every nondeterministic call carries a [`NondetKind`] fixed when the call
//! record is created. Reported values are decoded against that kind; values
//! that cannot be represented in it are kept as "undecodable" (`None`).

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::diagnostics::NondetCall;

const NONDET_PREFIX: &str = "__VERIFIER_nondet_";

/// The kind of value a nondeterministic call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NondetKind {
    Float,
    Double,
    Pointer,
    Bool,
    Integer { bits: u8, signed: bool },
    Unknown,
}

impl NondetKind {
    /// Infer the kind from a call-site name.
    ///
    /// The SV-COMP generator names are matched exactly first. Other names
    /// fall back to keyword matching, floating point before integers.
    pub fn from_call(call: &str) -> Self {
        let suffix = call.strip_prefix(NONDET_PREFIX).unwrap_or(call);
        if let Some(kind) = Self::from_suffix(suffix) {
            return kind;
        }

        let name = suffix.to_ascii_lowercase();
        if name.contains("float") {
            return NondetKind::Float;
        }
        if name.contains("double") {
            return NondetKind::Double;
        }
        if name.contains("pointer") {
            return NondetKind::Pointer;
        }
        if name.contains("bool") {
            return NondetKind::Bool;
        }
        let signed = !(name.contains("unsigned") || name.starts_with('u'));
        let bits = if name.contains("long") {
            64
        } else if name.contains("short") {
            16
        } else if name.contains("char") {
            8
        } else if name.contains("int") || name.contains("unsigned") {
            32
        } else {
            return NondetKind::Unknown;
        };
        NondetKind::Integer { bits, signed }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        let int = |bits, signed| Some(NondetKind::Integer { bits, signed });
        match suffix {
            "bool" | "_Bool" => Some(NondetKind::Bool),
            "float" => Some(NondetKind::Float),
            "double" => Some(NondetKind::Double),
            "pointer" => Some(NondetKind::Pointer),
            "char" | "s8" => int(8, true),
            "uchar" | "u8" => int(8, false),
            "short" | "s16" => int(16, true),
            "ushort" | "u16" => int(16, false),
            "int" | "s32" => int(32, true),
            "uint" | "unsigned" | "unsigned_int" | "u32" => int(32, false),
            "long" | "longlong" | "loff_t" | "s64" => int(64, true),
            "ulong" | "ulonglong" | "size_t" | "u64" => int(64, false),
            _ => None,
        }
    }
}

/// A decoded model value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModelValue {
    Bool(bool),
    Signed { bits: u8, value: i64 },
    Unsigned { bits: u8, value: u64 },
    Float(f32),
    Double(f64),
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            ModelValue::Signed { value, .. } => write!(f, "{value}"),
            ModelValue::Unsigned { value, .. } => write!(f, "{value}"),
            ModelValue::Float(v) => write!(f, "{v}"),
            ModelValue::Double(v) => write!(f, "{v}"),
        }
    }
}

impl ModelValue {
    /// Decode a reported value. Returns `None` when the value is undecodable.
    pub fn decode(kind: NondetKind, raw: &str) -> Option<ModelValue> {
        let raw = raw.trim();
        match kind {
            NondetKind::Pointer | NondetKind::Unknown => None,
            NondetKind::Bool => {
                let value = fit(parse_integer(raw)?, 8)?;
                Some(ModelValue::Bool(value != 0))
            }
            NondetKind::Integer { bits, signed } => {
                let masked = fit(parse_integer(raw)?, bits)?;
                if signed {
                    let shift = 64 - u32::from(bits);
                    let value = ((masked << shift) as i64) >> shift;
                    Some(ModelValue::Signed { bits, value })
                } else {
                    Some(ModelValue::Unsigned {
                        bits,
                        value: masked,
                    })
                }
            }
            NondetKind::Float => {
                if let Some(pattern) = parse_bit_pattern(raw) {
                    let bits = u32::try_from(fit(pattern, 32)?).ok()?;
                    return Some(ModelValue::Float(f32::from_bits(bits)));
                }
                raw.parse::<f32>().ok().map(ModelValue::Float)
            }
            NondetKind::Double => {
                if let Some(pattern) = parse_bit_pattern(raw) {
                    return Some(ModelValue::Double(f64::from_bits(fit(pattern, 64)?)));
                }
                raw.parse::<f64>().ok().map(ModelValue::Double)
            }
        }
    }
}

/// Decimal (optionally negative), `0x`/`#x` hexadecimal or `#b` binary.
fn parse_integer(raw: &str) -> Option<i128> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let magnitude = match parse_bit_pattern(digits) {
        Some(value) => value,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<i128>().ok()?
        }
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Only the explicitly radix-marked forms.
fn parse_bit_pattern(raw: &str) -> Option<i128> {
    let (digits, radix) = if let Some(d) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("#x")) {
        (d, 16)
    } else if let Some(d) = raw.strip_prefix("#b") {
        (d, 2)
    } else {
        return None;
    };
    if digits.is_empty() || digits.len() > 64 || digits.starts_with(['+', '-']) {
        return None;
    }
    i128::from_str_radix(digits, radix).ok()
}

/// Accept values in `-2^(bits-1) ..= 2^bits - 1` and return their low `bits`.
fn fit(value: i128, bits: u8) -> Option<u64> {
    let bits = u32::from(bits);
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << bits) - 1;
    if value < min || value > max {
        return None;
    }
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    Some((value as u64) & mask)
}

/// One nondeterministic input of a counterexample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVariable {
    pub call: String,
    pub line: u32,
    pub value: Option<ModelValue>,
}

/// Pair the ordered call records with the reported values.
///
/// Value indices are 1-based unless the stream reports a `var_0`.
pub fn assemble(calls: &[NondetCall], values: &BTreeMap<usize, String>) -> Vec<ModelVariable> {
    let base = usize::from(!values.contains_key(&0));
    if let Some((&last, _)) = values.last_key_value() {
        if last >= calls.len() + base {
            debug!(
                "model reports index {last} but only {} nondet calls were recorded",
                calls.len()
            );
        }
    }
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| ModelVariable {
            call: call.call.clone(),
            line: call.line,
            value: values
                .get(&(i + base))
                .and_then(|raw| ModelValue::decode(call.kind, raw)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(bits: u8, signed: bool) -> NondetKind {
        NondetKind::Integer { bits, signed }
    }

    #[test]
    fn kinds_of_svcomp_generators() {
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_int"), int(32, true));
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_uint"), int(32, false));
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_unsigned"), int(32, false));
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_uchar"), int(8, false));
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_ulong"), int(64, false));
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_short"), int(16, true));
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_bool"), NondetKind::Bool);
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_float"), NondetKind::Float);
        assert_eq!(NondetKind::from_call("__VERIFIER_nondet_pointer"), NondetKind::Pointer);
    }

    #[test]
    fn keyword_fallback_prefers_floating_point() {
        assert_eq!(NondetKind::from_call("nondet_float_or_int"), NondetKind::Float);
        assert_eq!(NondetKind::from_call("my_unsigned_long_gen"), int(64, false));
        assert_eq!(NondetKind::from_call("any_char"), int(8, true));
        assert_eq!(NondetKind::from_call("opaque"), NondetKind::Unknown);
    }

    #[test]
    fn integers_in_every_radix() {
        let k = int(32, true);
        assert_eq!(ModelValue::decode(k, "-7"), Some(ModelValue::Signed { bits: 32, value: -7 }));
        assert_eq!(ModelValue::decode(k, "0x10"), Some(ModelValue::Signed { bits: 32, value: 16 }));
        assert_eq!(
            ModelValue::decode(k, "#xffffffff"),
            Some(ModelValue::Signed { bits: 32, value: -1 })
        );
        assert_eq!(ModelValue::decode(k, "#b101"), Some(ModelValue::Signed { bits: 32, value: 5 }));
    }

    #[test]
    fn out_of_range_and_garbage_are_undecodable() {
        assert_eq!(ModelValue::decode(int(8, false), "256"), None);
        assert_eq!(ModelValue::decode(int(8, true), "-129"), None);
        assert_eq!(ModelValue::decode(int(32, true), "12abc"), None);
        assert_eq!(ModelValue::decode(int(32, true), ""), None);
        assert_eq!(ModelValue::decode(int(32, true), "0x-5"), None);
        assert_eq!(ModelValue::decode(int(32, true), "#x+ff"), None);
        assert_eq!(ModelValue::decode(int(32, true), "#b-1"), None);
        assert_eq!(ModelValue::decode(NondetKind::Pointer, "0"), None);
        assert_eq!(ModelValue::decode(NondetKind::Double, "pi"), None);
    }

    #[test]
    fn unsigned_reinterprets_negative_values() {
        assert_eq!(
            ModelValue::decode(int(8, false), "-1"),
            Some(ModelValue::Unsigned { bits: 8, value: 255 })
        );
        assert_eq!(
            ModelValue::decode(int(64, false), "18446744073709551615"),
            Some(ModelValue::Unsigned { bits: 64, value: u64::MAX })
        );
    }

    #[test]
    fn floats_from_decimal_and_bit_patterns() {
        assert_eq!(ModelValue::decode(NondetKind::Float, "1.5"), Some(ModelValue::Float(1.5)));
        assert_eq!(
            ModelValue::decode(NondetKind::Float, "#x3fc00000"),
            Some(ModelValue::Float(1.5))
        );
        assert_eq!(
            ModelValue::decode(NondetKind::Double, "0x3ff8000000000000"),
            Some(ModelValue::Double(1.5))
        );
    }

    #[test]
    fn bool_displays_as_c_integer() {
        assert_eq!(ModelValue::decode(NondetKind::Bool, "1"), Some(ModelValue::Bool(true)));
        assert_eq!(ModelValue::Bool(false).to_string(), "0");
    }

    #[test]
    fn assemble_detects_index_base() {
        let calls = vec![
            NondetCall::new("__VERIFIER_nondet_int", None, 3),
            NondetCall::new("__VERIFIER_nondet_pointer", None, 4),
            NondetCall::new("__VERIFIER_nondet_char", None, 5),
        ];
        let one_based: BTreeMap<usize, String> =
            [(1, "5".to_string()), (2, "0".to_string()), (3, "-2".to_string())].into();
        let vars = assemble(&calls, &one_based);
        assert_eq!(vars[0].value, Some(ModelValue::Signed { bits: 32, value: 5 }));
        assert_eq!(vars[1].value, None);
        assert_eq!(vars[2].value, Some(ModelValue::Signed { bits: 8, value: -2 }));

        let zero_based: BTreeMap<usize, String> = [(0, "9".to_string())].into();
        let vars = assemble(&calls, &zero_based);
        assert_eq!(vars[0].value, Some(ModelValue::Signed { bits: 32, value: 9 }));
        assert_eq!(vars[2].value, None);
        assert_eq!(vars[2].line, 5);
    }
}
