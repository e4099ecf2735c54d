//! `Vector3`: three-component float vector.

use std::ops::{Add, Mul, Sub};

use crate::{
    redirect::{MethodSignature, RedirectionTableBuilder},
    typesystem::{ElementType, TypeRegistryBuilder, TypeToken},
    value_type, Result,
};

value_type! {
    /// Three-component vector of `f32`.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Vector3 as "UnityEngine.Vector3" {
        /// X component.
        pub x: f32,
        /// Y component.
        pub y: f32,
        /// Z component.
        pub z: f32,
    }
}

impl Vector3 {
    /// Creates a vector.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(&self, other: &Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Registers `Vector3` and its operator and constructor redirections.
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
    let token = types.register_value_type::<Vector3>()?;
    let this = ElementType::ValueType(token);

    redirections.register_fn(
        MethodSignature::new(
            token,
            ".ctor",
            [ElementType::R4, ElementType::R4, ElementType::R4],
        )
        .instance(),
        |ctx| {
            let z: f32 = ctx.pop_scalar()?;
            let y: f32 = ctx.pop_scalar()?;
            let x: f32 = ctx.pop_scalar()?;
            ctx.construct(&Vector3::new(x, y, z))
        },
    )?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Addition", [this, this]),
        |ctx| {
            let b: Vector3 = ctx.pop()?;
            let a: Vector3 = ctx.pop()?;
            ctx.push(&(a + b))
        },
    )?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Subtraction", [this, this]),
        |ctx| {
            let b: Vector3 = ctx.pop()?;
            let a: Vector3 = ctx.pop()?;
            ctx.push(&(a - b))
        },
    )?;

    redirections.register_fn(
        MethodSignature::new(token, "op_Multiply", [this, ElementType::R4]),
        |ctx| {
            let scale: f32 = ctx.pop_scalar()?;
            let a: Vector3 = ctx.pop()?;
            ctx.push(&(a * scale))
        },
    )?;

    redirections.register_fn(MethodSignature::new(token, "Dot", [this, this]), |ctx| {
        let b: Vector3 = ctx.pop()?;
        let a: Vector3 = ctx.pop()?;
        ctx.push_scalar(a.dot(&b))
    })?;

    Ok(token)
}
