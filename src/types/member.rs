//! Struct and union member access.
//!
//! Member records come in a small and a long form, chosen per containing
//! aggregate by its size; the version adapter hides the split, so both
//! accessors here see one widened member shape. Iteration follows
//! declaration order, which is record order in the image.

use std::ops::ControlFlow;

use serde::Serialize;

use crate::container::CtfContainer;
use crate::types::CtfKind;
use crate::{CtfError, CtfResult, CtfStr, TypeId};

/// Type and bit offset of one struct or union member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CtfMemberInfo {
    pub member_type: TypeId,
    /// Offset of the member in bits from the start of the aggregate.
    pub offset: u64,
}

impl CtfContainer<'_> {
    /// Iterate the members of a struct or union in declaration order.
    pub fn member_iter<B, F>(
        &self,
        id: TypeId,
        mut func: F,
    ) -> CtfResult<ControlFlow<B>>
    where
        F: FnMut(CtfStr<'_>, TypeId, u64) -> ControlFlow<B>,
    {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        if !matches!(record.kind(), CtfKind::Struct | CtfKind::Union) {
            return Err(CtfError::NotStructOrUnion);
        }
        for n in 0..record.vlen() as usize {
            let member = record.member_at(n)?;
            if let ControlFlow::Break(b) = func(
                fp.strptr(member.name),
                member.mtype,
                member.offset,
            ) {
                return Ok(ControlFlow::Break(b));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Find a member of a struct or union by name.
    pub fn member_info(
        &self,
        id: TypeId,
        name: &[u8],
    ) -> CtfResult<CtfMemberInfo> {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        if !matches!(record.kind(), CtfKind::Struct | CtfKind::Union) {
            return Err(CtfError::NotStructOrUnion);
        }
        for n in 0..record.vlen() as usize {
            let member = record.member_at(n)?;
            if fp.strptr(member.name).as_bytes() == name {
                return Ok(CtfMemberInfo {
                    member_type: member.mtype,
                    offset: member.offset,
                });
            }
        }
        Err(CtfError::NoMemberName)
    }
}
