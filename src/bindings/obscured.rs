//! `ObscuredInt`: an integer stored XOR-masked with a per-value key.

use crate::{
    redirect::{MethodSignature, RedirectionTableBuilder},
    typesystem::{ElementType, TypeRegistryBuilder, TypeToken},
    value_type, Result,
};

value_type! {
    /// Integer kept in memory as `obscured ^ key`, so the plain value never
    /// appears in a field.
    ///
    /// ```rust
    /// use crossbind::ObscuredInt;
    ///
    /// let value = ObscuredInt::new(42);
    /// assert_eq!(value.value(), 42);
    /// assert_ne!(value.obscured, 42);
    /// assert_eq!(ObscuredInt::with_key(42, 7).obscured, 42 ^ 7);
    /// ```
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ObscuredInt as "JEngine.Core.JInt" {
        /// Masked value.
        pub obscured: i32,
        /// Mask.
        pub key: i32,
    }
}

impl ObscuredInt {
    /// Masks `value` with a key derived from it.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self::with_key(value, derive_key(value))
    }

    /// Masks `value` with an explicit key.
    #[must_use]
    pub fn with_key(value: i32, key: i32) -> Self {
        ObscuredInt {
            obscured: value ^ key,
            key,
        }
    }

    /// The plain value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.obscured ^ self.key
    }
}

impl From<i32> for ObscuredInt {
    fn from(value: i32) -> Self {
        ObscuredInt::new(value)
    }
}

impl From<ObscuredInt> for i32 {
    fn from(value: ObscuredInt) -> Self {
        value.value()
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn derive_key(value: i32) -> i32 {
    let mixed = (value as u32 ^ 0x5bd1_e995).wrapping_mul(0x9e37_79b9);
    (mixed.rotate_left(13) | 1) as i32
}

/// Registers `ObscuredInt` and its operator and constructor redirections.
///
/// # Errors
///
/// Returns [`MarshalError::DuplicateType`](crate::MarshalError::DuplicateType) or
/// [`MarshalError::DuplicateRedirection`](crate::MarshalError::DuplicateRedirection)
/// if the bindings were already registered.
pub fn register(
    types: &mut TypeRegistryBuilder,
    redirections: &RedirectionTableBuilder,
) -> Result<TypeToken> {
    let token = types.register_value_type::<ObscuredInt>()?;
    let this = ElementType::ValueType(token);

    redirections.register_fn(
        MethodSignature::new(token, ".ctor", [ElementType::I4]).instance(),
        |ctx| {
            let value: i32 = ctx.pop_scalar()?;
            ctx.construct(&ObscuredInt::new(value))
        },
    )?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Implicit", [ElementType::I4]),
        |ctx| {
            let value: i32 = ctx.pop_scalar()?;
            ctx.push(&ObscuredInt::new(value))
        },
    )?;

    redirections.register_fn(MethodSignature::new(token, "op_Implicit", [this]), |ctx| {
        let value: ObscuredInt = ctx.pop()?;
        ctx.push_scalar(value.value())
    })?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Addition", [this, this]),
        |ctx| {
            let b: ObscuredInt = ctx.pop()?;
            let a: ObscuredInt = ctx.pop()?;
            ctx.push(&ObscuredInt::new(a.value().wrapping_add(b.value())))
        },
    )?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Subtraction", [this, this]),
        |ctx| {
            let b: ObscuredInt = ctx.pop()?;
            let a: ObscuredInt = ctx.pop()?;
            ctx.push(&ObscuredInt::new(a.value().wrapping_sub(b.value())))
        },
    )?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Equality", [this, this]),
        |ctx| {
            let b: ObscuredInt = ctx.pop()?;
            let a: ObscuredInt = ctx.pop()?;
            ctx.push_scalar(a.value() == b.value())
        },
    )?;

    Ok(token)
}
