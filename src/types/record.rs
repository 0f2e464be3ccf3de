//! Version adapter over the v1 and v2 type-record layouts.
//!
//! Everything above this module is version-blind: a [`Record`] is the
//! decoded common prefix of one type record plus a slice of its variant
//! data, and the accessors below know how wide each field is in each
//! format version. The byte offset from a record's start to its variant
//! data (the *increment*) is the short prefix size, plus 8 when the inline
//! size carries the long-size sentinel.

use crate::flag;
use crate::{CtfError, CtfResult, CtfVersion, TypeId};

use super::CtfKind;

pub(crate) fn u16_at(buf: &[u8], off: usize) -> Option<u16> {
    buf.get(off..off + 2)
        .map(|b| u16::from_ne_bytes(b.try_into().unwrap()))
}

pub(crate) fn u32_at(buf: &[u8], off: usize) -> Option<u32> {
    buf.get(off..off + 4)
        .map(|b| u32::from_ne_bytes(b.try_into().unwrap()))
}

/// Split a type identifier into its index portion.
pub(crate) fn type_to_index(version: CtfVersion, id: TypeId) -> u32 {
    (id & max_ptype(version)) as u32
}

/// Rebuild a type identifier from an index, tagging child-space ids.
pub(crate) fn index_to_type(
    version: CtfVersion,
    index: u32,
    child: bool,
) -> TypeId {
    if child {
        TypeId::from(index) | (max_ptype(version) + 1)
    } else {
        TypeId::from(index)
    }
}

/// Whether an identifier falls in parent space for this version.
pub(crate) fn is_parent_id(version: CtfVersion, id: TypeId) -> bool {
    id <= max_ptype(version)
}

pub(crate) fn max_ptype(version: CtfVersion) -> i64 {
    match version {
        CtfVersion::V1 => flag::v1::MAX_PTYPE,
        CtfVersion::V2 => flag::v2::MAX_PTYPE,
    }
}

fn lstruct_thresh(version: CtfVersion) -> u64 {
    match version {
        CtfVersion::V1 => flag::v1::LSTRUCT_THRESH,
        CtfVersion::V2 => flag::v2::LSTRUCT_THRESH,
    }
}

/// Struct or union member, widened to the common shape.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawMember {
    pub name: u32,
    pub mtype: TypeId,
    /// Offset of the member in bits from the start of the aggregate.
    pub offset: u64,
}

/// Enum element: a name reference and its signed value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawEnum {
    pub name: u32,
    pub value: i32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RawArray {
    pub contents: TypeId,
    pub index: TypeId,
    pub nelems: u32,
}

/// Decoded common prefix of one type record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Record<'a> {
    version: CtfVersion,
    kind: CtfKind,
    /// Name reference, `(table-id, offset)` packed per [`flag::name_stid`].
    pub name: u32,
    info: u32,
    size_or_type: u32,
    lsize: Option<u64>,
    /// Total record length in bytes, prefix plus variant data.
    pub total_len: usize,
    data: &'a [u8],
}

impl<'a> Record<'a> {
    /// Decode the record starting at `off`, bounded by `end`.
    ///
    /// Fails with `Corrupt` when the prefix or the variant data its info
    /// word promises would run past `end`, or when the kind is not one of
    /// the defined values.
    pub fn parse(
        version: CtfVersion,
        buf: &'a [u8],
        off: usize,
        end: usize,
    ) -> CtfResult<Self> {
        let prefix_len = match version {
            CtfVersion::V1 => 8,
            CtfVersion::V2 => 12,
        };
        if off + prefix_len > end {
            return Err(CtfError::Corrupt);
        }
        let (name, info, size_or_type, short_len, sent) = match version {
            CtfVersion::V1 => {
                let name = u32_at(buf, off).ok_or(CtfError::Corrupt)?;
                let info = u16_at(buf, off + 4).ok_or(CtfError::Corrupt)?;
                let su = u16_at(buf, off + 6).ok_or(CtfError::Corrupt)?;
                let sent = u64::from(su) == flag::v1::LSIZE_SENT;
                (name, u32::from(info), u32::from(su), 8usize, sent)
            }
            CtfVersion::V2 => {
                let name = u32_at(buf, off).ok_or(CtfError::Corrupt)?;
                let info = u32_at(buf, off + 4).ok_or(CtfError::Corrupt)?;
                let su = u32_at(buf, off + 8).ok_or(CtfError::Corrupt)?;
                let sent = u64::from(su) == flag::v2::LSIZE_SENT;
                (name, info, su, 12usize, sent)
            }
        };

        let (lsize, increment) = if sent {
            let hi = u32_at(buf, off + short_len).ok_or(CtfError::Corrupt)?;
            let lo =
                u32_at(buf, off + short_len + 4).ok_or(CtfError::Corrupt)?;
            (Some(u64::from(hi) << 32 | u64::from(lo)), short_len + 8)
        } else {
            (None, short_len)
        };

        let raw_kind = match version {
            CtfVersion::V1 => flag::v1::info_kind(info),
            CtfVersion::V2 => flag::v2::info_kind(info),
        };
        let kind =
            CtfKind::try_from(raw_kind).map_err(|_| CtfError::Corrupt)?;

        let mut record = Record {
            version,
            kind,
            name,
            info,
            size_or_type,
            lsize,
            total_len: 0,
            data: &[],
        };
        let vbytes = record.vbytes();
        let data_start = off + increment;
        if data_start + vbytes > end {
            return Err(CtfError::Corrupt);
        }
        record.total_len = increment + vbytes;
        record.data = &buf[data_start..data_start + vbytes];
        Ok(record)
    }

    pub fn kind(&self) -> CtfKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        match self.version {
            CtfVersion::V1 => flag::v1::info_isroot(self.info),
            CtfVersion::V2 => flag::v2::info_isroot(self.info),
        }
    }

    pub fn vlen(&self) -> u32 {
        match self.version {
            CtfVersion::V1 => flag::v1::info_vlen(self.info),
            CtfVersion::V2 => flag::v2::info_vlen(self.info),
        }
    }

    /// The record's size in bytes, long form taking precedence.
    pub fn size(&self) -> u64 {
        self.lsize.unwrap_or(u64::from(self.size_or_type))
    }

    /// The type this record references, for the kinds that do.
    pub fn type_ref(&self) -> TypeId {
        TypeId::from(self.size_or_type)
    }

    /// Byte length of the variant data that follows the prefix.
    fn vbytes(&self) -> usize {
        let vlen = self.vlen() as usize;
        match (self.kind, self.version) {
            (CtfKind::Integer | CtfKind::Float, _) => 4,
            (CtfKind::Array, CtfVersion::V1) => 8,
            (CtfKind::Array, CtfVersion::V2) => 12,
            // v1 argument lists are u16 ids padded to 4-byte alignment
            (CtfKind::Function, CtfVersion::V1) => 2 * (vlen + (vlen & 1)),
            (CtfKind::Function, CtfVersion::V2) => 4 * vlen,
            (CtfKind::Struct | CtfKind::Union, _) => {
                vlen * self.member_stride()
            }
            (CtfKind::Enum, _) => vlen * 8,
            (
                CtfKind::Unknown
                | CtfKind::Pointer
                | CtfKind::Forward
                | CtfKind::Typedef
                | CtfKind::Volatile
                | CtfKind::Const
                | CtfKind::Restrict,
                _,
            ) => 0,
        }
    }

    fn long_members(&self) -> bool {
        self.size() >= lstruct_thresh(self.version)
    }

    fn member_stride(&self) -> usize {
        match (self.version, self.long_members()) {
            (CtfVersion::V1, false) => 8,
            (CtfVersion::V2, false) => 12,
            (_, true) => 16,
        }
    }

    /// The `n`th member of a struct or union record, in declaration order.
    pub fn member_at(&self, n: usize) -> CtfResult<RawMember> {
        let off = n * self.member_stride();
        let m = match (self.version, self.long_members()) {
            (CtfVersion::V1, false) => RawMember {
                name: u32_at(self.data, off).ok_or(CtfError::Corrupt)?,
                mtype: u16_at(self.data, off + 4)
                    .ok_or(CtfError::Corrupt)?
                    .into(),
                offset: u16_at(self.data, off + 6)
                    .ok_or(CtfError::Corrupt)?
                    .into(),
            },
            (CtfVersion::V2, false) => RawMember {
                name: u32_at(self.data, off).ok_or(CtfError::Corrupt)?,
                offset: u32_at(self.data, off + 4)
                    .ok_or(CtfError::Corrupt)?
                    .into(),
                mtype: u32_at(self.data, off + 8)
                    .ok_or(CtfError::Corrupt)?
                    .into(),
            },
            (CtfVersion::V1, true) => {
                let hi = u32_at(self.data, off + 8).ok_or(CtfError::Corrupt)?;
                let lo =
                    u32_at(self.data, off + 12).ok_or(CtfError::Corrupt)?;
                RawMember {
                    name: u32_at(self.data, off).ok_or(CtfError::Corrupt)?,
                    mtype: u16_at(self.data, off + 4)
                        .ok_or(CtfError::Corrupt)?
                        .into(),
                    offset: u64::from(hi) << 32 | u64::from(lo),
                }
            }
            (CtfVersion::V2, true) => {
                let hi = u32_at(self.data, off + 4).ok_or(CtfError::Corrupt)?;
                let lo =
                    u32_at(self.data, off + 12).ok_or(CtfError::Corrupt)?;
                RawMember {
                    name: u32_at(self.data, off).ok_or(CtfError::Corrupt)?,
                    mtype: u32_at(self.data, off + 8)
                        .ok_or(CtfError::Corrupt)?
                        .into(),
                    offset: u64::from(hi) << 32 | u64::from(lo),
                }
            }
        };
        Ok(m)
    }

    /// The `n`th element of an enum record, in declaration order.
    pub fn enum_at(&self, n: usize) -> CtfResult<RawEnum> {
        let off = n * 8;
        Ok(RawEnum {
            name: u32_at(self.data, off).ok_or(CtfError::Corrupt)?,
            value: u32_at(self.data, off + 4).ok_or(CtfError::Corrupt)?
                as i32,
        })
    }

    /// The array descriptor of an array record.
    pub fn array(&self) -> CtfResult<RawArray> {
        match self.version {
            CtfVersion::V1 => Ok(RawArray {
                contents: u16_at(self.data, 0)
                    .ok_or(CtfError::Corrupt)?
                    .into(),
                index: u16_at(self.data, 2).ok_or(CtfError::Corrupt)?.into(),
                nelems: u32_at(self.data, 4).ok_or(CtfError::Corrupt)?,
            }),
            CtfVersion::V2 => Ok(RawArray {
                contents: u32_at(self.data, 0)
                    .ok_or(CtfError::Corrupt)?
                    .into(),
                index: u32_at(self.data, 4).ok_or(CtfError::Corrupt)?.into(),
                nelems: u32_at(self.data, 8).ok_or(CtfError::Corrupt)?,
            }),
        }
    }

    /// The variant word of an integer or float record.
    pub fn encoding_word(&self) -> CtfResult<u32> {
        u32_at(self.data, 0).ok_or(CtfError::Corrupt)
    }

    /// The `n`th argument type of a function record.
    pub fn func_arg_at(&self, n: usize) -> CtfResult<TypeId> {
        match self.version {
            CtfVersion::V1 => u16_at(self.data, n * 2)
                .map(TypeId::from)
                .ok_or(CtfError::Corrupt),
            CtfVersion::V2 => u32_at(self.data, n * 4)
                .map(TypeId::from)
                .ok_or(CtfError::Corrupt),
        }
    }
}
