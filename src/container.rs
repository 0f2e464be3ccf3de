//! Container decoding: header parse, optional decompression, and the side
//! indices the query engine reads.
//!
//! A container owns one decompressed image and never mutates it. The type
//! section is indexed once at open time into an offset translation table
//! (one entry per type index) and a pointer-index table (type index of the
//! unique pointer to each type, or 0). Parents are plain borrows: a child
//! holds `&CtfContainer` to its parent, so the borrow checker enforces
//! that the parent outlives every child.

use std::io::Read;
use std::ops::Range;

use anyhow::{anyhow, ensure, Context, Result};

use crate::flag;
use crate::types::record::{self, Record};
use crate::{CtfStr, CtfVersion, DataModel, TypeId};

const HEADER_LEN: usize = 40;

/// Placeholder for names whose reference cannot be resolved, matching the
/// convention of the C library.
const NULL_NAME: &[u8] = b"(null)";

#[derive(Debug, Clone, Copy)]
struct CtfHeader {
    version: CtfVersion,
    flags: u8,
    parname: u32,
    funcoff: u32,
    varoff: u32,
    typeoff: u32,
    stroff: u32,
    strlen: u32,
}

impl CtfHeader {
    fn read(data: &[u8]) -> Result<Self> {
        ensure!(data.len() >= HEADER_LEN, "buffer too small for CTF header");
        let magic = record::u16_at(data, 0).unwrap();
        ensure!(
            magic == flag::CTF_MAGIC,
            "bad magic {magic:#x}, not CTF data or wrong endianness"
        );
        let version = CtfVersion::try_from(data[2])
            .map_err(|_| anyhow!("unsupported CTF version {}", data[2]))?;
        let flags = data[3];
        ensure!(
            flags & !flag::CTF_F_COMPRESS == 0,
            "unknown header flags {flags:#x}"
        );
        let _parlabel = record::u32_at(data, 4).unwrap();
        let parname = record::u32_at(data, 8).unwrap();
        let _lbloff = record::u32_at(data, 12).unwrap();
        let _objtoff = record::u32_at(data, 16).unwrap();
        let funcoff = record::u32_at(data, 20).unwrap();
        let varoff = record::u32_at(data, 24).unwrap();
        let typeoff = record::u32_at(data, 28).unwrap();
        let stroff = record::u32_at(data, 32).unwrap();
        let strlen = record::u32_at(data, 36).unwrap();
        ensure!(
            funcoff <= varoff && varoff <= typeoff && typeoff <= stroff,
            "header section offsets out of order"
        );
        Ok(CtfHeader {
            version,
            flags,
            parname,
            funcoff,
            varoff,
            typeoff,
            stroff,
            strlen,
        })
    }
}

/// Handle to a decoded CTF image plus its side indices.
pub struct CtfContainer<'p> {
    pub(crate) version: CtfVersion,
    /// Set when the image was uniquified against a parent; the id space of
    /// a child is split so low-half ids address the parent.
    pub(crate) child: bool,
    pub(crate) parent: Option<&'p CtfContainer<'p>>,
    pub(crate) model: DataModel,
    /// Decompressed section payload, header stripped.
    pub(crate) buf: Vec<u8>,
    pub(crate) types: Range<usize>,
    strings: Range<usize>,
    vars: Range<usize>,
    pub(crate) funcs: Range<usize>,
    extern_strtab: Option<Vec<u8>>,
    /// Byte offset of each type record in `buf`, indexed by type index.
    /// Entry 0 is unused; identifier 0 is reserved.
    txlate: Vec<usize>,
    /// Type index of the unique pointer to each type index, or 0.
    pub(crate) ptrtab: Vec<u32>,
    pub(crate) typemax: u32,
}

impl<'p> CtfContainer<'p> {
    /// Decode a raw CTF section, typically the mapped contents of `.ctf`.
    ///
    /// The image must match the host endianness. `parent` binds the
    /// container this image was uniquified against; pass `None` for a
    /// standalone or parent image.
    pub fn open(
        data: &[u8],
        model: DataModel,
        parent: Option<&'p CtfContainer<'p>>,
    ) -> Result<Self> {
        let header = CtfHeader::read(data)?;

        let buf = if header.flags & flag::CTF_F_COMPRESS != 0 {
            let mut buf = Vec::new();
            flate2::read::ZlibDecoder::new(&data[HEADER_LEN..])
                .read_to_end(&mut buf)
                .context("decompressing CTF data")?;
            buf
        } else {
            data[HEADER_LEN..].to_vec()
        };

        ensure!(
            header.stroff as usize + header.strlen as usize == buf.len(),
            "string section does not end at the image boundary"
        );

        let child = header.parname != 0;
        if child && parent.is_none() {
            log::warn!("child CTF image opened with no parent bound");
        }

        let mut container = CtfContainer {
            version: header.version,
            child,
            parent,
            model,
            buf,
            types: header.typeoff as usize..header.stroff as usize,
            strings: header.stroff as usize
                ..header.stroff as usize + header.strlen as usize,
            vars: header.varoff as usize..header.typeoff as usize,
            funcs: header.funcoff as usize..header.varoff as usize,
            extern_strtab: None,
            txlate: Vec::new(),
            ptrtab: Vec::new(),
            typemax: 0,
        };
        container.index_types()?;
        Ok(container)
    }

    /// Walk the type section once, recording each record's offset and
    /// filling the pointer-index table.
    fn index_types(&mut self) -> Result<()> {
        ensure!(
            self.vars.len() % 8 == 0,
            "variable section is not a whole number of records"
        );

        let mut txlate = vec![0usize];
        let mut off = self.types.start;
        while off < self.types.end {
            let record =
                Record::parse(self.version, &self.buf, off, self.types.end)
                    .map_err(|e| anyhow!(e))
                    .with_context(|| {
                        format!("type record {} at offset {off}", txlate.len())
                    })?;
            txlate.push(off);
            off += record.total_len;
        }
        self.typemax =
            u32::try_from(txlate.len() - 1).context("too many types")?;

        let mut ptrtab = vec![0u32; txlate.len()];
        for (index, &off) in txlate.iter().enumerate().skip(1) {
            let record =
                Record::parse(self.version, &self.buf, off, self.types.end)
                    .map_err(|e| anyhow!(e))?;
            if record.kind() != crate::types::CtfKind::Pointer {
                continue;
            }
            // Only referents in this container's own half of the id space
            // can be indexed; cross-container pointers stay unindexed.
            let referent = record.type_ref();
            let ref_child = !record::is_parent_id(self.version, referent);
            let ref_index = record::type_to_index(self.version, referent);
            if ref_child == self.child && ref_index <= self.typemax {
                ptrtab[ref_index as usize] = index as u32;
            }
        }

        self.txlate = txlate;
        self.ptrtab = ptrtab;
        Ok(())
    }

    /// Supply string table 1, the string table of the ELF object this CTF
    /// data describes.
    pub fn set_external_strtab(&mut self, strtab: Vec<u8>) {
        self.extern_strtab = Some(strtab);
    }

    pub fn version(&self) -> CtfVersion {
        self.version
    }

    pub fn data_model(&self) -> DataModel {
        self.model
    }

    pub fn parent(&self) -> Option<&'p CtfContainer<'p>> {
        self.parent
    }

    pub fn is_child(&self) -> bool {
        self.child
    }

    /// Highest type index in this container, not counting the parent.
    pub fn typemax(&self) -> u32 {
        self.typemax
    }

    /// Resolve a name reference to its byte string.
    ///
    /// Unresolvable references (offset past the table, or an external
    /// reference with no external table supplied) yield the `"(null)"`
    /// placeholder rather than failing the enclosing query.
    pub fn strptr(&self, name: u32) -> CtfStr<'_> {
        let offset = flag::name_offset(name) as usize;
        let table = match flag::name_stid(name) {
            0 => self.buf.get(self.strings.clone()),
            _ => self.extern_strtab.as_deref(),
        };
        match table {
            Some(table) if offset < table.len() => {
                let rest = &table[offset..];
                let end =
                    rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                CtfStr::new(&rest[..end])
            }
            _ => CtfStr::new(NULL_NAME),
        }
    }

    pub(crate) fn record_at_index(&self, index: u32) -> Option<Record<'_>> {
        let off = *self.txlate.get(index as usize)?;
        if index == 0 {
            return None;
        }
        // The open walk validated every record, so this re-parse only
        // fails if the container was built inconsistently.
        Record::parse(self.version, &self.buf, off, self.types.end).ok()
    }

    pub(crate) fn nvars(&self) -> usize {
        self.vars.len() / 8
    }

    pub(crate) fn var_at(&self, n: usize) -> Option<(u32, TypeId)> {
        let off = self.vars.start + n * 8;
        if off + 8 > self.vars.end {
            return None;
        }
        let name = record::u32_at(&self.buf, off)?;
        let typeidx = record::u32_at(&self.buf, off + 4)?;
        Some((name, TypeId::from(typeidx)))
    }
}

impl std::fmt::Debug for CtfContainer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CtfContainer")
            .field("version", &self.version)
            .field("child", &self.child)
            .field("model", &self.model)
            .field("typemax", &self.typemax)
            .field("nvars", &self.nvars())
            .finish_non_exhaustive()
    }
}
