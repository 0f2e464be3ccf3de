//! Array descriptor access.

use serde::Serialize;

use crate::container::CtfContainer;
use crate::types::CtfKind;
use crate::{CtfError, CtfResult, TypeId};

/// Contents type, index type and element count of an array.
///
/// The record does not carry the element size; multiply out
/// `type_size(contents)` to size the whole array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CtfArrayInfo {
    pub contents: TypeId,
    pub index: TypeId,
    pub nelems: u32,
}

impl CtfContainer<'_> {
    /// The array descriptor of an array type.
    pub fn array_info(&self, id: TypeId) -> CtfResult<CtfArrayInfo> {
        let (_, record) = self.lookup(id)?;
        if record.kind() != CtfKind::Array {
            return Err(CtfError::NotArray);
        }
        let raw = record.array()?;
        Ok(CtfArrayInfo {
            contents: raw.contents,
            index: raw.index,
            nelems: raw.nelems,
        })
    }
}
