//! Built-in value types and their redirections.
//!
//! Each binding module declares its native type with
//! [`value_type!`](crate::value_type) and exposes a `register` function that
//! adds the type to the registry and its trampolines to the redirection
//! table. [`initialize`] runs all of them in dependency order and is what
//! [`Runtime::builder`](crate::Runtime::builder) calls.
//!
//! | Type | Name | Redirected methods |
//! |------|------|--------------------|
//! | [`ObscuredInt`] | `JEngine.Core.JInt` | `.ctor(int32)`, `op_Implicit` both ways, `op_Addition`, `op_Subtraction`, `op_Equality` |
//! | [`Vector3`] | `UnityEngine.Vector3` | `.ctor(float32, float32, float32)`, `op_Addition`, `op_Subtraction`, `op_Multiply(Vector3, float32)`, `Dot` |

pub mod obscured;
pub mod vector;

pub use obscured::ObscuredInt;
pub use vector::Vector3;

use crate::{redirect::RedirectionTableBuilder, typesystem::TypeRegistryBuilder, Result};

/// Registers every built-in binding.
///
/// # Errors
///
/// Fails with [`MarshalError::DuplicateType`](crate::MarshalError::DuplicateType)
/// or [`MarshalError::DuplicateRedirection`](crate::MarshalError::DuplicateRedirection)
/// if a binding collides with an earlier registration.
pub fn initialize(
    types: &mut TypeRegistryBuilder,
    redirections: &RedirectionTableBuilder,
) -> Result<()> {
    obscured::register(types, redirections)?;
    vector::register(types, redirections)?;
    log::debug!(
        "built-in bindings registered: {} type(s), {} redirection(s)",
        types.len(),
        redirections.len()
    );
    Ok(())
}
