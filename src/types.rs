//! Type-graph queries over a decoded container.
//!
//! Type identifiers form a directed graph: records reference other records
//! by id, and a child container's low-half ids transparently address its
//! parent. The locator in this module is the only place that switches
//! containers; every accessor above it receives the owning container back
//! and reads the correct image.

pub mod array;
pub mod r#enum;
pub mod function;
pub mod member;
pub(crate) mod record;

use std::cmp::Ordering;
use std::ops::ControlFlow;

use num_enum::TryFromPrimitive;
use serde::Serialize;

use crate::container::CtfContainer;
use crate::types::record::{
    index_to_type, is_parent_id, type_to_index, Record,
};
use crate::{flag, CtfError, CtfResult, CtfStr, TypeId};

/// Discriminator tag identifying a type record's shape.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum CtfKind {
    /// Used for padding; carries no data.
    Unknown = 0,
    Integer = 1,
    Float = 2,
    Pointer = 3,
    Array = 4,
    Function = 5,
    Struct = 6,
    Union = 7,
    Enum = 8,
    /// Forward declaration; the name holds the tag.
    Forward = 9,
    Typedef = 10,
    Volatile = 11,
    Const = 12,
    Restrict = 13,
}

/// Floating-point encodings stored in the top byte of a float record's
/// variant word.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive,
)]
#[repr(u8)]
pub enum CtfFloatEncoding {
    Single = 1,
    Double = 2,
    Complex = 3,
    DoubleComplex = 4,
    LongDoubleComplex = 5,
    LongDouble = 6,
    Interval = 7,
    DoubleInterval = 8,
    LongDoubleInterval = 9,
    Imaginary = 10,
    DoubleImaginary = 11,
    LongDoubleImaginary = 12,
}

/// Bit layout of an integer or float, unpacked from the variant word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CtfEncoding {
    /// `CTF_INT_*` flag bits for integers, a [`CtfFloatEncoding`] value
    /// for floats.
    pub format: u32,
    /// Offset of the value in bits.
    pub offset: u32,
    /// Size of the storage in bits.
    pub bits: u32,
}

impl CtfEncoding {
    pub fn is_signed(&self) -> bool {
        self.format & flag::CTF_INT_SIGNED != 0
    }

    pub fn is_char(&self) -> bool {
        self.format & flag::CTF_INT_CHAR != 0
    }

    pub fn is_bool(&self) -> bool {
        self.format & flag::CTF_INT_BOOL != 0
    }

    pub fn is_varargs(&self) -> bool {
        self.format & flag::CTF_INT_VARARGS != 0
    }

    pub fn float_encoding(&self) -> Option<CtfFloatEncoding> {
        u8::try_from(self.format)
            .ok()
            .and_then(|raw| CtfFloatEncoding::try_from(raw).ok())
    }
}

impl<'p> CtfContainer<'p> {
    /// Locate the record for `id`, switching to the owning container when
    /// the id falls in parent space.
    pub(crate) fn lookup<'a>(
        &'a self,
        id: TypeId,
    ) -> CtfResult<(&'a CtfContainer<'p>, Record<'a>)> {
        if id <= 0 {
            return Err(CtfError::BadId);
        }
        let fp = if self.child && is_parent_id(self.version, id) {
            self.parent.ok_or(CtfError::BadId)?
        } else {
            self
        };
        let index = type_to_index(fp.version, id);
        if index == 0 || index > fp.typemax {
            return Err(CtfError::BadId);
        }
        let record = fp.record_at_index(index).ok_or(CtfError::Corrupt)?;
        Ok((fp, record))
    }

    /// Whether `id` addresses this container's parent half of the id
    /// space.
    pub fn type_isparent(&self, id: TypeId) -> bool {
        is_parent_id(self.version, id)
    }

    pub fn type_ischild(&self, id: TypeId) -> bool {
        !self.type_isparent(id)
    }

    /// Strip typedef, volatile, const and restrict wrappers until a base
    /// kind is reached.
    ///
    /// Cycle detection checks each step against the origin, the previous
    /// and the current node only; deeper cycles still terminate when they
    /// revisit one of those anchors, and either way the image is treated
    /// as corrupt.
    pub fn type_resolve(&self, id: TypeId) -> CtfResult<TypeId> {
        let otype = id;
        let mut prev = id;
        let mut ty = id;
        let mut fp = self;
        loop {
            let (owner, record) = fp.lookup(ty)?;
            match record.kind() {
                CtfKind::Typedef
                | CtfKind::Volatile
                | CtfKind::Const
                | CtfKind::Restrict => {
                    let next = record.type_ref();
                    if next == ty || next == otype || next == prev {
                        log::debug!("type {otype} cycle detected");
                        return Err(CtfError::Corrupt);
                    }
                    prev = ty;
                    ty = next;
                    fp = owner;
                }
                _ => return Ok(ty),
            }
        }
    }

    /// The kind of `id`, without resolving wrappers.
    pub fn type_kind(&self, id: TypeId) -> CtfResult<CtfKind> {
        let (_, record) = self.lookup(id)?;
        Ok(record.kind())
    }

    /// Storage size of the resolved type in bytes.
    ///
    /// Functions are sized by the symbol table, not here, and report 0.
    /// Arrays without a recorded size multiply out their element size.
    pub fn type_size(&self, id: TypeId) -> CtfResult<u64> {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        match record.kind() {
            CtfKind::Pointer => Ok(fp.model.pointer_size()),
            CtfKind::Function => Ok(0),
            CtfKind::Enum => Ok(fp.model.int_size()),
            CtfKind::Array => {
                let size = record.size();
                if size > 0 {
                    return Ok(size);
                }
                let info = record.array()?;
                let elem = fp.type_size(info.contents)?;
                Ok(elem * u64::from(info.nelems))
            }
            _ => Ok(record.size()),
        }
    }

    /// Alignment of the resolved type in bytes.
    ///
    /// Structs take the alignment of their first member; unions take the
    /// max over all members.
    pub fn type_align(&self, id: TypeId) -> CtfResult<u64> {
        let id = self.type_resolve(id)?;
        let (fp, record) = self.lookup(id)?;
        match record.kind() {
            CtfKind::Pointer | CtfKind::Function => {
                Ok(fp.model.pointer_size())
            }
            CtfKind::Array => {
                let info = record.array()?;
                fp.type_align(info.contents)
            }
            kind @ (CtfKind::Struct | CtfKind::Union) => {
                let n = if kind == CtfKind::Struct {
                    record.vlen().min(1)
                } else {
                    record.vlen()
                };
                let mut align = 0;
                for i in 0..n as usize {
                    let member = record.member_at(i)?;
                    align = align.max(fp.type_align(member.mtype)?);
                }
                Ok(align)
            }
            CtfKind::Enum => Ok(fp.model.int_size()),
            _ => Ok(record.size()),
        }
    }

    /// The type `id` refers to, for pointers, typedefs and qualifiers.
    pub fn type_reference(&self, id: TypeId) -> CtfResult<TypeId> {
        let (_, record) = self.lookup(id)?;
        match record.kind() {
            CtfKind::Pointer
            | CtfKind::Typedef
            | CtfKind::Volatile
            | CtfKind::Const
            | CtfKind::Restrict => Ok(record.type_ref()),
            _ => Err(CtfError::NotRef),
        }
    }

    /// Find the pointer-to-`id` type recorded in the pointer index.
    ///
    /// On a miss the lookup is retried with the resolved id, so that a
    /// pointer recorded for `struct foo` is found when asked about a
    /// `foo_t` typedef of it.
    pub fn type_pointer(&self, id: TypeId) -> CtfResult<TypeId> {
        let (fp, _) = self.lookup(id)?;
        let index = type_to_index(fp.version, id) as usize;
        let ntype = fp.ptrtab[index];
        if ntype != 0 {
            return Ok(index_to_type(fp.version, ntype, fp.child));
        }

        let id = self.type_resolve(id).map_err(|_| CtfError::NoType)?;
        let (fp, _) = self.lookup(id).map_err(|_| CtfError::NoType)?;
        let index = type_to_index(fp.version, id) as usize;
        let ntype = fp.ptrtab[index];
        if ntype != 0 {
            Ok(index_to_type(fp.version, ntype, fp.child))
        } else {
            Err(CtfError::NoType)
        }
    }

    /// Unpack the encoding word of an integer or float.
    pub fn type_encoding(&self, id: TypeId) -> CtfResult<CtfEncoding> {
        let (_, record) = self.lookup(id)?;
        let data = match record.kind() {
            CtfKind::Integer | CtfKind::Float => record.encoding_word()?,
            _ => return Err(CtfError::NotIntFp),
        };
        Ok(CtfEncoding {
            format: flag::int_encoding(data),
            offset: flag::int_offset(data),
            bits: flag::int_bits(data),
        })
    }

    /// Total order over types across containers.
    ///
    /// Identifiers are the primary key; ids from different containers
    /// break ties on container identity, after promoting parent-space ids
    /// to the parent itself so a type compares equal through any of its
    /// children.
    pub fn type_cmp(
        &self,
        lid: TypeId,
        rfp: &CtfContainer<'_>,
        rid: TypeId,
    ) -> Ordering {
        fn key(fp: &CtfContainer<'_>) -> usize {
            std::ptr::from_ref(fp) as *const () as usize
        }

        let rval = lid.cmp(&rid);
        if key(self) == key(rfp) {
            return rval;
        }

        let lfp = match self.parent {
            Some(parent) if is_parent_id(self.version, lid) => parent,
            _ => self,
        };
        let rfp = match rfp.parent {
            Some(parent) if is_parent_id(rfp.version, rid) => parent,
            _ => rfp,
        };

        match key(lfp).cmp(&key(rfp)) {
            Ordering::Equal => rval,
            other => other,
        }
    }

    /// Structural compatibility of two types, possibly across containers.
    ///
    /// Integers and floats compare by encoding, pointers and arrays
    /// recurse, structs and unions compare tag name and byte size, enums
    /// and forwards compare tag name only.
    pub fn type_compat(
        &self,
        lid: TypeId,
        rfp: &CtfContainer<'_>,
        rid: TypeId,
    ) -> bool {
        if self.type_cmp(lid, rfp, rid) == Ordering::Equal {
            return true;
        }

        let (Ok(lid), Ok(rid)) =
            (self.type_resolve(lid), rfp.type_resolve(rid))
        else {
            return false;
        };
        let (Ok((lofp, lrec)), Ok((rofp, rrec))) =
            (self.lookup(lid), rfp.lookup(rid))
        else {
            return false;
        };

        if lrec.kind() != rrec.kind() {
            return false;
        }
        let same_names =
            lofp.strptr(lrec.name).as_bytes() == rofp.strptr(rrec.name).as_bytes();

        match lrec.kind() {
            CtfKind::Integer | CtfKind::Float => {
                matches!(
                    (self.type_encoding(lid), rfp.type_encoding(rid)),
                    (Ok(le), Ok(re)) if le == re
                )
            }
            CtfKind::Pointer => {
                let (Ok(lref), Ok(rref)) =
                    (self.type_reference(lid), rfp.type_reference(rid))
                else {
                    return false;
                };
                self.type_compat(lref, rfp, rref)
            }
            CtfKind::Array => {
                let (Ok(la), Ok(ra)) =
                    (self.array_info(lid), rfp.array_info(rid))
                else {
                    return false;
                };
                la.nelems == ra.nelems
                    && self.type_compat(la.contents, rfp, ra.contents)
                    && self.type_compat(la.index, rfp, ra.index)
            }
            CtfKind::Struct | CtfKind::Union => {
                same_names
                    && matches!(
                        (self.type_size(lid), rfp.type_size(rid)),
                        (Ok(ls), Ok(rs)) if ls == rs
                    )
            }
            CtfKind::Enum | CtfKind::Forward => same_names,
            _ => false,
        }
    }

    /// Visit every root-visible type in ascending index order.
    pub fn type_iter<B, F>(
        &self,
        mut func: F,
    ) -> CtfResult<ControlFlow<B>>
    where
        F: FnMut(TypeId) -> ControlFlow<B>,
    {
        for index in 1..=self.typemax {
            let record =
                self.record_at_index(index).ok_or(CtfError::Corrupt)?;
            if record.is_root() {
                let id = index_to_type(self.version, index, self.child);
                if let ControlFlow::Break(b) = func(id) {
                    return Ok(ControlFlow::Break(b));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Visit every variable record in stored order.
    ///
    /// Fails with `NoParent` on a child container with no parent bound,
    /// since variable type ids could not be interpreted.
    pub fn variable_iter<B, F>(
        &self,
        mut func: F,
    ) -> CtfResult<ControlFlow<B>>
    where
        F: FnMut(CtfStr<'_>, TypeId) -> ControlFlow<B>,
    {
        if self.child && self.parent.is_none() {
            return Err(CtfError::NoParent);
        }
        for n in 0..self.nvars() {
            let (name, id) = self.var_at(n).ok_or(CtfError::Corrupt)?;
            if let ControlFlow::Break(b) = func(self.strptr(name), id) {
                return Ok(ControlFlow::Break(b));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Depth-first walk over a type and its transitive members.
    ///
    /// The callback receives the member name, the unresolved member type
    /// id, the cumulative bit offset and the nesting depth; the walk
    /// starts with the target type itself under an empty name at depth 0.
    pub fn type_visit<B, F>(
        &self,
        id: TypeId,
        mut func: F,
    ) -> CtfResult<ControlFlow<B>>
    where
        F: FnMut(CtfStr<'_>, TypeId, u64, usize) -> ControlFlow<B>,
    {
        self.rvisit(id, &mut func, CtfStr::new(b""), 0, 0)
    }

    fn rvisit<B, F>(
        &self,
        id: TypeId,
        func: &mut F,
        name: CtfStr<'_>,
        offset: u64,
        depth: usize,
    ) -> CtfResult<ControlFlow<B>>
    where
        F: FnMut(CtfStr<'_>, TypeId, u64, usize) -> ControlFlow<B>,
    {
        let resolved = self.type_resolve(id)?;
        let (fp, record) = self.lookup(resolved)?;

        if let ControlFlow::Break(b) = func(name, id, offset, depth) {
            return Ok(ControlFlow::Break(b));
        }

        if !matches!(record.kind(), CtfKind::Struct | CtfKind::Union) {
            return Ok(ControlFlow::Continue(()));
        }

        for n in 0..record.vlen() as usize {
            let member = record.member_at(n)?;
            if let ControlFlow::Break(b) = fp.rvisit(
                member.mtype,
                func,
                fp.strptr(member.name),
                offset + member.offset,
                depth + 1,
            )? {
                return Ok(ControlFlow::Break(b));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}
