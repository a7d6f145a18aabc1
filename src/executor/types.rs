use serde::Serialize;
use std::fmt;

/// A closed set of named variants with their ordinals.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub variants: &'static [(&'static str, i64)],
}

impl EnumSpec {
    pub fn by_name(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(v, _)| v.eq_ignore_ascii_case(name))
            .map(|&(_, ord)| ord)
    }

    pub fn by_ordinal(&self, ordinal: i64) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|&&(_, ord)| ord == ordinal)
            .map(|&(name, _)| name)
    }
}

/// Mouse buttons understood by the input catalog.
pub static MOUSE_BUTTON: EnumSpec = EnumSpec {
    name: "MouseButton",
    variants: &[("Left", 0), ("Middle", 1), ("Right", 2)],
};

/// Press/release/click.
pub static KEY_DIRECTION: EnumSpec = EnumSpec {
    name: "KeyDirection",
    variants: &[("Click", 0), ("Press", 1), ("Release", 2)],
};

/// Named (non-character) keys.
pub static KEY: EnumSpec = EnumSpec {
    name: "Key",
    variants: &[
        ("Enter", 0),
        ("Tab", 1),
        ("Escape", 2),
        ("Space", 3),
        ("Backspace", 4),
        ("Delete", 5),
        ("Up", 6),
        ("Down", 7),
        ("Left", 8),
        ("Right", 9),
        ("Home", 10),
        ("End", 11),
        ("PageUp", 12),
        ("PageDown", 13),
        ("Control", 14),
        ("Shift", 15),
        ("Alt", 16),
        ("Meta", 17),
    ],
};

/// The parameter kinds an action can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Int32,
    UInt32,
    Float64,
    Bool,
    Text,
    Enum(&'static EnumSpec),
    /// Pointer-sized signed handle.
    Handle,
    /// Pointer-sized unsigned handle.
    UHandle,
}

impl SemanticType {
    /// Text is the only reference-like type; it coerces empty input to `Value::Absent`.
    pub fn is_value_type(&self) -> bool {
        !matches!(self, SemanticType::Text)
    }

    /// The value an empty token coerces to.
    pub fn zero(&self) -> Value {
        match self {
            SemanticType::Int32 => Value::Int32(0),
            SemanticType::UInt32 => Value::UInt32(0),
            SemanticType::Float64 => Value::Float64(0.0),
            SemanticType::Bool => Value::Bool(false),
            SemanticType::Text => Value::Absent,
            SemanticType::Enum(spec) => Value::Enum {
                ordinal: 0,
                variant: spec.by_ordinal(0),
            },
            SemanticType::Handle => Value::Handle(0),
            SemanticType::UHandle => Value::UHandle(0),
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Int32 => f.write_str("Int32"),
            SemanticType::UInt32 => f.write_str("UInt32"),
            SemanticType::Float64 => f.write_str("Float64"),
            SemanticType::Bool => f.write_str("Bool"),
            SemanticType::Text => f.write_str("Text"),
            SemanticType::Enum(spec) => f.write_str(spec.name),
            SemanticType::Handle => f.write_str("Handle"),
            SemanticType::UHandle => f.write_str("UHandle"),
        }
    }
}

/// A typed argument or action result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Absent,
    Int32(i32),
    UInt32(u32),
    Float64(f64),
    Bool(bool),
    Text(String),
    Enum {
        ordinal: i64,
        variant: Option<&'static str>,
    },
    Handle(isize),
    UHandle(usize),
    List(Vec<Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Textual form substituted into an enclosing step's argument list.
    pub fn to_token(&self) -> String {
        self.to_string()
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int32(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::Enum { ordinal, .. } => Some(ordinal),
            Value::Handle(v) => i64::try_from(v).ok(),
            Value::UHandle(v) => i64::try_from(v).ok(),
            Value::Bool(b) => Some(b.into()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// `None` for `Absent`; the text of a `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Enum {
                variant: Some(name),
                ..
            } => f.write_str(name),
            Value::Enum { ordinal, .. } => write!(f, "{ordinal}"),
            Value::Handle(v) => write!(f, "{v}"),
            Value::UHandle(v) => write!(f, "{v}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_lookup_is_case_insensitive() {
        assert_eq!(MOUSE_BUTTON.by_name("right"), Some(2));
        assert_eq!(MOUSE_BUTTON.by_name("RIGHT"), Some(2));
        assert_eq!(MOUSE_BUTTON.by_name("back"), None);
        assert_eq!(KEY.by_ordinal(0), Some("Enter"));
    }

    #[test]
    fn test_tokens() {
        assert_eq!(Value::Absent.to_token(), "");
        assert_eq!(Value::Handle(-5).to_token(), "-5");
        assert_eq!(
            Value::Enum {
                ordinal: 1,
                variant: Some("Middle")
            }
            .to_token(),
            "Middle"
        );
        assert_eq!(
            Value::List(vec![Value::text("a"), Value::Int32(2)]).to_token(),
            "a 2"
        );
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(SemanticType::Int32.zero(), Value::Int32(0));
        assert_eq!(SemanticType::Text.zero(), Value::Absent);
        assert_eq!(
            SemanticType::Enum(&MOUSE_BUTTON).zero(),
            Value::Enum {
                ordinal: 0,
                variant: Some("Left")
            }
        );
    }
}
