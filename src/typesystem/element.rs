use std::fmt;

use crate::typesystem::TypeToken;

/// Declared type of a field, array element or method parameter.
///
/// Primitive element types occupy a single slot. [`ElementType::Object`]
/// occupies a single slot holding an object handle (or null).
/// [`ElementType::ValueType`] refers to a registered value type and occupies
/// as many slots as that type's flattened layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// `bool`
    Boolean,
    /// UTF-16 code unit or Unicode scalar, stored as its code point
    Char,
    /// 32-bit signed integer
    I4,
    /// 64-bit signed integer
    I8,
    /// 32-bit float
    R4,
    /// 64-bit float
    R8,
    /// Reference to a heap object
    Object,
    /// Inline value type
    ValueType(TypeToken),
}

impl ElementType {
    /// Returns `true` for element types stored as a raw primitive slot.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, ElementType::Object | ElementType::ValueType(_))
    }

    /// Returns the value-type token, if this is a value type.
    #[must_use]
    pub fn value_type(&self) -> Option<TypeToken> {
        match self {
            ElementType::ValueType(token) => Some(*token),
            _ => None,
        }
    }

    /// Short name, used in error messages and signature display.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Boolean => "bool",
            ElementType::Char => "char",
            ElementType::I4 => "int32",
            ElementType::I8 => "int64",
            ElementType::R4 => "float32",
            ElementType::R8 => "float64",
            ElementType::Object => "object",
            ElementType::ValueType(_) => "valuetype",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::ValueType(token) => write!(f, "valuetype {token}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_classification() {
        assert!(ElementType::I4.is_primitive());
        assert!(ElementType::R8.is_primitive());
        assert!(!ElementType::Object.is_primitive());
        assert!(!ElementType::ValueType(TypeToken::from_row(1)).is_primitive());
    }

    #[test]
    fn test_display() {
        assert_eq!(ElementType::I4.to_string(), "int32");
        assert_eq!(
            ElementType::ValueType(TypeToken::from_row(3)).to_string(),
            "valuetype 0x02000003"
        );
    }
}
