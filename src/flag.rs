//! Wire-exact constants and bit layouts of the CTF binary format.
//!
//! A CTF section is a 40-byte header followed by the label, object,
//! function, variable, type and string sections. Every type record starts
//! with a common prefix holding a name reference, an info word packing
//! `{kind, isroot, vlen}`, and a slot that is either an inline size or a
//! reference to another type. The two format versions pack the info word
//! and the struct-member records differently; everything here is split
//! accordingly.

/// Magic number identifying the header, in host byte order.
pub const CTF_MAGIC: u16 = 0xdff2;

/// Header flag: the data buffer past the header is zlib-compressed.
pub const CTF_F_COMPRESS: u8 = 0x1;

/// Max byte offset into a string table.
pub const CTF_MAX_NAME: u32 = 0x7fff_ffff;

/// String table id of a name reference, 0 internal or 1 external.
pub fn name_stid(name: u32) -> u32 {
    name >> 31
}

/// Byte offset of a name reference into its string table.
pub fn name_offset(name: u32) -> u32 {
    name & CTF_MAX_NAME
}

/// Integer encoding flags, stored in the top byte of the variant word.
pub const CTF_INT_SIGNED: u32 = 0x01;
pub const CTF_INT_CHAR: u32 = 0x02;
pub const CTF_INT_BOOL: u32 = 0x04;
pub const CTF_INT_VARARGS: u32 = 0x08;

pub fn int_encoding(data: u32) -> u32 {
    (data & 0xff00_0000) >> 24
}

pub fn int_offset(data: u32) -> u32 {
    (data & 0x00ff_0000) >> 16
}

pub fn int_bits(data: u32) -> u32 {
    data & 0x0000_ffff
}

/// The float variant word shares the integer layout, with the top byte
/// holding one of the [`crate::types::CtfFloatEncoding`] values instead of
/// flag bits.
pub fn fp_encoding(data: u32) -> u32 {
    int_encoding(data)
}

pub fn fp_offset(data: u32) -> u32 {
    int_offset(data)
}

pub fn fp_bits(data: u32) -> u32 {
    int_bits(data)
}

/// Function attribute: the argument list ends with varargs.
pub const CTF_FUNC_VARARG: u32 = 0x1;

/// v1 limits and bit positions.
///
/// ```text
///             ------------------------
/// ctt_info:   | kind | isroot | vlen |
///             ------------------------
///             15   11    10    9    0
/// ```
pub mod v1 {
    /// Max parent type identifier; greater identifiers are child-space.
    pub const MAX_PTYPE: i64 = 0x7fff;
    /// Max struct, union or enum members, or function args.
    pub const MAX_VLEN: u32 = 0x3ff;
    /// Max inline size of a type in bytes.
    pub const MAX_SIZE: u64 = 0xfffe;
    /// Inline size value signalling that a 64-bit size follows the prefix.
    pub const LSIZE_SENT: u64 = 0xffff;
    /// Aggregates at least this large use the long member form.
    pub const LSTRUCT_THRESH: u64 = 8192;

    pub fn info_kind(info: u32) -> u8 {
        ((info & 0xf800) >> 11) as u8
    }

    pub fn info_isroot(info: u32) -> bool {
        info & 0x0400 != 0
    }

    pub fn info_vlen(info: u32) -> u32 {
        info & MAX_VLEN
    }
}

/// v2 limits and bit positions.
///
/// ```text
///             ------------------------
/// ctt_info:   | kind | isroot | vlen |
///             ------------------------
///             31   26    25    24   0
/// ```
pub mod v2 {
    pub const MAX_PTYPE: i64 = 0x7fff_ffff;
    pub const MAX_VLEN: u32 = 0x00ff_ffff;
    pub const MAX_SIZE: u64 = 0xffff_fffe;
    pub const LSIZE_SENT: u64 = 0xffff_ffff;
    pub const LSTRUCT_THRESH: u64 = 536_870_912;

    pub fn info_kind(info: u32) -> u8 {
        ((info & 0xfc00_0000) >> 26) as u8
    }

    pub fn info_isroot(info: u32) -> bool {
        info & 0x0200_0000 != 0
    }

    pub fn info_vlen(info: u32) -> u32 {
        info & MAX_VLEN
    }
}
