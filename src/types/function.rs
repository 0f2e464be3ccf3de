//! Function-info section access.
//!
//! The function section holds one entry per function symbol, in symbol
//! table order: an info word packing the function kind and the argument
//! count, the return type id, then the argument type ids. Symbols with no
//! type data are padded out with a single zero word. Mapping a symbol
//! table index onto this sequence is the caller's concern; the accessors
//! here take the position within the section.

use num_enum::TryFromPrimitive;
use serde::Serialize;

use crate::container::CtfContainer;
use crate::types::record::{u16_at, u32_at};
use crate::types::CtfKind;
use crate::{flag, CtfError, CtfResult, CtfVersion, TypeId};

/// Return type, argument count and attributes of one function entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CtfFuncInfo {
    pub return_type: TypeId,
    /// Number of typed arguments, varargs sentinel excluded.
    pub argc: u32,
    /// [`flag::CTF_FUNC_VARARG`] when the argument list ends with `...`.
    pub flags: u32,
}

/// One decoded entry: the word offset of its argument list plus its info.
struct FuncEntry {
    info: CtfFuncInfo,
    args_off: usize,
}

impl CtfContainer<'_> {
    fn func_word(&self, off: usize) -> CtfResult<(u32, usize)> {
        let word = match self.version {
            CtfVersion::V1 => 2,
            CtfVersion::V2 => 4,
        };
        if off + word > self.funcs.end {
            return Err(CtfError::NoType);
        }
        match self.version {
            CtfVersion::V1 => u16_at(&self.buf, off)
                .map(|w| (u32::from(w), word))
                .ok_or(CtfError::Corrupt),
            CtfVersion::V2 => u32_at(&self.buf, off)
                .map(|w| (w, word))
                .ok_or(CtfError::Corrupt),
        }
    }

    fn func_entry(&self, symidx: u64) -> CtfResult<FuncEntry> {
        let mut off = self.funcs.start;
        let mut sym = 0u64;
        loop {
            let (info, word) = self.func_word(off)?;
            let vlen = match self.version {
                CtfVersion::V1 => flag::v1::info_vlen(info),
                CtfVersion::V2 => flag::v2::info_vlen(info),
            };
            if sym == symidx {
                if info == 0 {
                    // padding for a symbol with no type data
                    return Err(CtfError::NoType);
                }
                let raw_kind = match self.version {
                    CtfVersion::V1 => flag::v1::info_kind(info),
                    CtfVersion::V2 => flag::v2::info_kind(info),
                };
                let kind = CtfKind::try_from_primitive(raw_kind)
                    .map_err(|_| CtfError::Corrupt)?;
                if kind != CtfKind::Function {
                    return Err(CtfError::Corrupt);
                }
                let (return_type, _) = self.func_word(off + word)?;
                let args_off = off + 2 * word;
                let mut argc = vlen;
                let mut flags = 0;
                // a trailing zero argument id marks a varargs list
                if vlen > 0 {
                    let (last, _) = self
                        .func_word(args_off + (vlen as usize - 1) * word)?;
                    if last == 0 {
                        argc -= 1;
                        flags |= flag::CTF_FUNC_VARARG;
                    }
                }
                return Ok(FuncEntry {
                    info: CtfFuncInfo {
                        return_type: TypeId::from(return_type),
                        argc,
                        flags,
                    },
                    args_off,
                });
            }
            off += if info == 0 {
                word
            } else {
                word * (2 + vlen as usize)
            };
            sym += 1;
        }
    }

    /// Decode the function entry at position `symidx` in the function
    /// section.
    ///
    /// Fails with `NoType` when the position is past the section or holds
    /// a padding entry.
    pub fn func_info(&self, symidx: u64) -> CtfResult<CtfFuncInfo> {
        Ok(self.func_entry(symidx)?.info)
    }

    /// Copy the argument type ids of the function entry at `symidx` into
    /// `args`, returning how many were written.
    pub fn func_args(
        &self,
        symidx: u64,
        args: &mut [TypeId],
    ) -> CtfResult<usize> {
        let entry = self.func_entry(symidx)?;
        let word = match self.version {
            CtfVersion::V1 => 2,
            CtfVersion::V2 => 4,
        };
        let n = args.len().min(entry.info.argc as usize);
        for (i, slot) in args.iter_mut().take(n).enumerate() {
            let (arg, _) = self.func_word(entry.args_off + i * word)?;
            *slot = TypeId::from(arg);
        }
        Ok(n)
    }
}
