//! Enum element access.
//!
//! C permits duplicate values and, across translation units, duplicate
//! names; both lookups return the first match in declaration order.

use std::ops::ControlFlow;

use crate::container::CtfContainer;
use crate::types::CtfKind;
use crate::{CtfError, CtfResult, CtfStr, TypeId};

impl CtfContainer<'_> {
    /// Iterate the elements of an enum in declaration order.
    pub fn enum_iter<B, F>(
        &self,
        id: TypeId,
        mut func: F,
    ) -> CtfResult<ControlFlow<B>>
    where
        F: FnMut(CtfStr<'_>, i32) -> ControlFlow<B>,
    {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        if record.kind() != CtfKind::Enum {
            return Err(CtfError::NotEnum);
        }
        for n in 0..record.vlen() as usize {
            let element = record.enum_at(n)?;
            if let ControlFlow::Break(b) =
                func(fp.strptr(element.name), element.value)
            {
                return Ok(ControlFlow::Break(b));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// The tag name of the first enum element with the given value.
    pub fn enum_name(&self, id: TypeId, value: i32) -> CtfResult<CtfStr<'_>> {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        if record.kind() != CtfKind::Enum {
            return Err(CtfError::NotEnum);
        }
        for n in 0..record.vlen() as usize {
            let element = record.enum_at(n)?;
            if element.value == value {
                return Ok(fp.strptr(element.name));
            }
        }
        Err(CtfError::NoEnumName)
    }

    /// The value of the first enum element with the given name.
    pub fn enum_value(&self, id: TypeId, name: &[u8]) -> CtfResult<i32> {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        if record.kind() != CtfKind::Enum {
            return Err(CtfError::NotEnum);
        }
        for n in 0..record.vlen() as usize {
            let element = record.enum_at(n)?;
            if fp.strptr(element.name).as_bytes() == name {
                return Ok(element.value);
            }
        }
        Err(CtfError::NoEnumName)
    }
}
