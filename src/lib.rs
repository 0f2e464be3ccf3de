#![forbid(unsafe_code)]
pub mod container;
pub(crate) mod decl;
pub mod flag;
pub mod types;


use std::borrow::Cow;

use num_enum::TryFromPrimitive;
use serde::Serialize;

pub use container::CtfContainer;

/// Numeric handle to one type record in a container (or its parent).
///
/// Identifier 0 is reserved and never names a type; the first real type
/// is 1. In a child container, identifiers at or below the parent boundary
/// address the parent's types.
pub type TypeId = i64;

/// On-disk format version, from the preamble version byte.
///
/// The two versions differ in record widths, the info-word layout, and the
/// struct-member representation; see [`flag`] for the exact bit layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive)]
#[repr(u8)]
pub enum CtfVersion {
    V1 = 1,
    V2 = 3,
}

/// Integer and pointer widths of the target program.
///
/// The container does not record its own data model; the opener infers it
/// from the object file and supplies it here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataModel {
    Ilp32,
    Lp64,
}

impl DataModel {
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            DataModel::Lp64
        } else {
            DataModel::Ilp32
        }
    }

    pub fn int_size(&self) -> u64 {
        4
    }

    pub fn pointer_size(&self) -> u64 {
        match self {
            DataModel::Ilp32 => 4,
            DataModel::Lp64 => 8,
        }
    }
}

/// Errors reported by the query API.
///
/// Every query returns its error directly instead of parking it in a
/// per-container errno slot, so read-only containers can be shared across
/// threads without extra synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtfError {
    /// Invalid type identifier.
    BadId,
    /// Type is not a struct or union.
    NotStructOrUnion,
    /// Type is not an enum.
    NotEnum,
    /// Type is not an integer or float.
    NotIntFp,
    /// Type is not an array.
    NotArray,
    /// Type does not reference another type.
    NotRef,
    /// Buffer is too small to hold the type name; `needed` bytes would fit.
    NameLen { needed: usize },
    /// Member name not found.
    NoMemberName,
    /// Enum element name not found.
    NoEnumName,
    /// No type information found.
    NoType,
    /// Parent container is not available.
    NoParent,
    /// Type data corruption detected.
    Corrupt,
}

impl core::fmt::Display for CtfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CtfError::BadId => write!(f, "invalid type identifier"),
            CtfError::NotStructOrUnion => {
                write!(f, "type is not a struct or union")
            }
            CtfError::NotEnum => write!(f, "type is not an enum"),
            CtfError::NotIntFp => {
                write!(f, "type is not an integer or float")
            }
            CtfError::NotArray => write!(f, "type is not an array"),
            CtfError::NotRef => {
                write!(f, "type does not reference another type")
            }
            CtfError::NameLen { needed } => write!(
                f,
                "buffer is too small to hold type name ({needed} bytes needed)"
            ),
            CtfError::NoMemberName => write!(f, "member name not found"),
            CtfError::NoEnumName => write!(f, "enum element name not found"),
            CtfError::NoType => write!(f, "no type information found"),
            CtfError::NoParent => {
                write!(f, "parent container is not available")
            }
            CtfError::Corrupt => write!(f, "type data corruption detected"),
        }
    }
}

impl std::error::Error for CtfError {}

pub type CtfResult<T> = core::result::Result<T, CtfError>;

/// Borrowed byte string from one of the container's string tables.
///
/// CTF strings are raw C strings with no declared encoding; display is
/// lossy UTF-8.
#[derive(Clone, Copy)]
pub struct CtfStr<'a>(&'a [u8]);

impl<'a> CtfStr<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self(data)
    }

    pub fn as_utf8_lossy(self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.0)
    }

    pub fn as_bytes(self) -> &'a [u8] {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CtfStr<'_> {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.as_utf8_lossy())
    }
}

impl std::fmt::Display for CtfStr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_utf8_lossy().fmt(f)
    }
}

impl std::fmt::Debug for CtfStr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        f.write_char('"')?;
        f.write_str(&self.as_utf8_lossy())?;
        f.write_char('"')?;
        Ok(())
    }
}

impl PartialEq<&[u8]> for CtfStr<'_> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.0 == *other
    }
}
