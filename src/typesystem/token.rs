use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a registered type.
///
/// Type tokens follow the metadata token layout: the high byte holds the table
/// (always [`TypeToken::TABLE`] for types registered with the
/// [`TypeRegistryBuilder`](crate::TypeRegistryBuilder)) and the low 24 bits
/// hold the row, assigned in registration order starting at 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeToken(pub u32);

impl TypeToken {
    /// Table byte used for registered type definitions.
    pub const TABLE: u8 = 0x02;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        TypeToken(value)
    }

    /// Creates a type-definition token for the given row.
    #[must_use]
    pub const fn from_row(row: u32) -> Self {
        TypeToken(((Self::TABLE as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for TypeToken {
    fn from(value: u32) -> Self {
        TypeToken(value)
    }
}

impl From<TypeToken> for u32 {
    fn from(token: TypeToken) -> Self {
        token.0
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TypeToken(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row() {
        let token = TypeToken::from_row(5);
        assert_eq!(token.value(), 0x0200_0005);
        assert_eq!(token.table(), TypeToken::TABLE);
        assert_eq!(token.row(), 5);
        assert!(!token.is_null());
    }

    #[test]
    fn test_display() {
        let token = TypeToken::from_row(1);
        assert_eq!(format!("{token}"), "0x02000001");
        assert!(format!("{token:?}").contains("row: 1"));
    }
}
