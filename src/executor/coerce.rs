//! Text -> typed value coercion.
//!
//! Rules:
//! - Empty input yields the target's zero value (`Absent` for `Text`); it never fails.
//! - Integers and handles accept `0x` hex (case-insensitive, two's complement for
//!   signed targets), then decimal, then any integral numeric text such as `12.0`.
//! - Enumerations accept hex, decimal (must be a defined ordinal), then a
//!   case-insensitive variant name.
//! - Booleans accept `true`/`false` in any case; floats use Rust's
//!   locale-independent parser.

use thiserror::Error;

use super::types::{EnumSpec, SemanticType, Value};

/// A token that could not be converted. Makes the resolver skip the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot coerce '{token}' to {target}: {reason}")]
pub struct CoercionFailure {
    pub token: String,
    pub target: String,
    pub reason: &'static str,
}

impl CoercionFailure {
    fn new(token: &str, target: SemanticType, reason: &'static str) -> Self {
        Self {
            token: token.to_string(),
            target: target.to_string(),
            reason,
        }
    }
}

/// Convert `token` to a value of `target`.
pub fn coerce(token: &str, target: SemanticType) -> Result<Value, CoercionFailure> {
    if token.is_empty() {
        return Ok(target.zero());
    }

    let fail = |reason| CoercionFailure::new(token, target, reason);

    match target {
        SemanticType::Text => Ok(Value::Text(token.to_string())),

        SemanticType::Int32 => integer(
            token,
            |h| u32::from_str_radix(h, 16).ok().map(|v| v as i32),
            |d| d.parse::<i32>().ok(),
        )
        .map(Value::Int32)
        .ok_or_else(|| fail("not a 32-bit integer")),

        SemanticType::UInt32 => integer(
            token,
            |h| u32::from_str_radix(h, 16).ok(),
            |d| d.parse::<u32>().ok(),
        )
        .map(Value::UInt32)
        .ok_or_else(|| fail("not an unsigned 32-bit integer")),

        SemanticType::Handle => integer(
            token,
            |h| usize::from_str_radix(h, 16).ok().map(|v| v as isize),
            |d| d.parse::<isize>().ok(),
        )
        .map(Value::Handle)
        .ok_or_else(|| fail("not a native handle")),

        SemanticType::UHandle => integer(
            token,
            |h| usize::from_str_radix(h, 16).ok(),
            |d| d.parse::<usize>().ok(),
        )
        .map(Value::UHandle)
        .ok_or_else(|| fail("not an unsigned native handle")),

        SemanticType::Bool => {
            let t = token.trim();
            if t.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if t.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(fail("not a boolean"))
            }
        }

        SemanticType::Float64 => token
            .trim()
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|_| fail("not a number")),

        SemanticType::Enum(spec) => enumeration(token, spec).ok_or_else(|| fail("no such variant")),
    }
}

fn hex_digits(token: &str) -> Option<&str> {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
}

/// hex, then decimal, then generic numeric conversion.
fn integer<T>(
    token: &str,
    hex: impl Fn(&str) -> Option<T>,
    decimal: impl Fn(&str) -> Option<T>,
) -> Option<T>
where
    T: TryFrom<i128>,
{
    if let Some(digits) = hex_digits(token) {
        return hex(digits);
    }
    decimal(token).or_else(|| generic_integral(token).and_then(|v| T::try_from(v).ok()))
}

/// Any textual number that denotes an integral value (`" 7 "`, `+7`, `7.0`, `7e2`).
fn generic_integral(token: &str) -> Option<i128> {
    let t = token.trim();
    if let Ok(v) = t.parse::<i128>() {
        return Some(v);
    }
    let f = t.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e30 {
        Some(f as i128)
    } else {
        None
    }
}

fn enumeration(token: &str, spec: &'static EnumSpec) -> Option<Value> {
    let ordinal = match hex_digits(token) {
        Some(digits) => i64::from_str_radix(digits, 16).ok(),
        None => token.parse::<i64>().ok(),
    };
    let ordinal = match ordinal {
        Some(ord) => ord,
        None => spec.by_name(token.trim())?,
    };
    let variant = spec.by_ordinal(ordinal)?;
    Some(Value::Enum {
        ordinal,
        variant: Some(variant),
    })
}
