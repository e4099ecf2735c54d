//! Method signatures used as redirection keys.

use std::fmt;

use crate::typesystem::{ElementType, TypeToken};

/// Key of a redirected method: declaring type, name and parameter types.
///
/// Overloads differ only in their parameter lists, so the full list is part
/// of the key. Instance methods (including value-type constructors) take an
/// extra `this` operand below their arguments; it is counted by
/// [`arity`](Self::arity) but not listed in `parameters`.
///
/// # Example
///
/// ```rust
/// use crossbind::{ElementType, MethodSignature, TypeToken};
///
/// let vector = TypeToken::from_row(2);
/// let ctor = MethodSignature::new(
///     vector,
///     ".ctor",
///     [ElementType::R4, ElementType::R4, ElementType::R4],
/// )
/// .instance();
///
/// assert_eq!(ctor.arity(), 4);
/// assert_eq!(ctor.to_string(), "instance 0x02000002::.ctor(float32, float32, float32)");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Type declaring the method.
    pub declaring_type: TypeToken,
    /// Method name (`op_Addition`, `.ctor`, ...).
    pub name: String,
    /// Declared parameter types, excluding `this`.
    pub parameters: Vec<ElementType>,
    /// Whether the method takes a `this` operand.
    pub has_this: bool,
}

impl MethodSignature {
    /// Creates a static method signature.
    #[must_use]
    pub fn new(
        declaring_type: TypeToken,
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = ElementType>,
    ) -> Self {
        MethodSignature {
            declaring_type,
            name: name.into(),
            parameters: parameters.into_iter().collect(),
            has_this: false,
        }
    }

    /// Marks the signature as an instance method.
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// Number of operands the method consumes, `this` included.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len() + usize::from(self.has_this)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_this {
            write!(f, "instance ")?;
        }
        write!(f, "{}::{}(", self.declaring_type, self.name)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parameter}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloads_are_distinct_keys() {
        let token = TypeToken::from_row(1);
        let by_int = MethodSignature::new(token, "op_Implicit", [ElementType::I4]);
        let by_value = MethodSignature::new(token, "op_Implicit", [ElementType::ValueType(token)]);
        assert_ne!(by_int, by_value);
        assert_ne!(by_int, by_int.clone().instance());
        assert_eq!(by_int, MethodSignature::new(token, "op_Implicit", vec![ElementType::I4]));
    }

    #[test]
    fn test_display() {
        let token = TypeToken::from_row(1);
        let signature = MethodSignature::new(
            token,
            "op_Addition",
            [ElementType::ValueType(token), ElementType::ValueType(token)],
        );
        assert_eq!(
            signature.to_string(),
            "0x02000001::op_Addition(valuetype 0x02000001, valuetype 0x02000001)"
        );
        assert_eq!(signature.arity(), 2);
    }
}
