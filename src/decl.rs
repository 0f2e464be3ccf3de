//! C declaration formatter.
//!
//! A type chain is first flattened into a stack of nodes bucketed by
//! lexical precedence class (base, pointer, array, function), then the
//! buckets are emitted from the base outward in C declarator order. The
//! order in which each class is first entered is recorded; when it
//! disagrees with C's precedence (pointer binds tighter than array than
//! function), parentheses go around the inner declarator, which is how
//! `int (*)[8]` gets its parens.

use std::fmt::Write;

use crate::container::CtfContainer;
use crate::types::CtfKind;
use crate::{CtfError, CtfResult, TypeId};

const PREC_BASE: usize = 0;
const PREC_POINTER: usize = 1;
const PREC_ARRAY: usize = 2;
const PREC_FUNCTION: usize = 3;
const PREC_MAX: usize = 4;

#[derive(Debug, Clone, Copy)]
struct DeclNode {
    type_id: TypeId,
    kind: CtfKind,
    /// Element count for array nodes.
    n: u32,
}

#[derive(Debug)]
struct Decl {
    nodes: [Vec<DeclNode>; PREC_MAX],
    /// Visit order in which each precedence class was first entered.
    order: [usize; PREC_MAX],
    /// Highest precedence seen so far that a qualifier can attach to.
    qualp: usize,
    ordp: usize,
    err: Option<CtfError>,
}

impl Decl {
    fn new() -> Self {
        Decl {
            nodes: Default::default(),
            order: [0; PREC_MAX],
            qualp: PREC_BASE,
            ordp: PREC_BASE,
            err: None,
        }
    }
}

impl CtfContainer<'_> {
    fn decl_push(&self, cd: &mut Decl, id: TypeId) {
        if cd.err.is_some() {
            return;
        }
        let (fp, record) = match self.lookup(id) {
            Ok(found) => found,
            Err(e) => {
                cd.err = Some(e);
                return;
            }
        };

        let kind = record.kind();
        let mut n = 1;
        let mut is_qual = false;
        let prec = match kind {
            CtfKind::Array => match fp.array_info(id) {
                Ok(info) => {
                    fp.decl_push(cd, info.contents);
                    n = info.nelems;
                    PREC_ARRAY
                }
                Err(e) => {
                    cd.err = Some(e);
                    return;
                }
            },
            CtfKind::Typedef => {
                // anonymous typedefs are invisible in the output
                if fp.strptr(record.name).is_empty() {
                    fp.decl_push(cd, record.type_ref());
                    return;
                }
                PREC_BASE
            }
            CtfKind::Function => {
                fp.decl_push(cd, record.type_ref());
                PREC_FUNCTION
            }
            CtfKind::Pointer => {
                fp.decl_push(cd, record.type_ref());
                PREC_POINTER
            }
            CtfKind::Volatile | CtfKind::Const | CtfKind::Restrict => {
                fp.decl_push(cd, record.type_ref());
                is_qual = true;
                cd.qualp
            }
            _ => PREC_BASE,
        };
        if cd.err.is_some() {
            return;
        }

        let node = DeclNode {
            type_id: id,
            kind,
            n,
        };
        if cd.nodes[prec].is_empty() {
            cd.order[prec] = cd.ordp;
            cd.ordp += 1;
        }
        if prec > cd.qualp && prec < PREC_ARRAY {
            cd.qualp = prec;
        }

        // Array declarators read inside out, and qualifiers of a base
        // type conventionally precede the type name, so both prepend.
        if kind == CtfKind::Array || (is_qual && prec == PREC_BASE) {
            cd.nodes[prec].insert(0, node);
        } else {
            cd.nodes[prec].push(node);
        }
    }

    fn name_string(&self, id: TypeId) -> CtfResult<String> {
        let mut cd = Decl::new();
        self.decl_push(&mut cd, id);
        if let Some(e) = cd.err {
            return Err(e);
        }

        let ptr = cd.order[PREC_POINTER] > PREC_POINTER;
        let arr = cd.order[PREC_ARRAY] > PREC_ARRAY;
        let rp = if arr {
            Some(PREC_ARRAY)
        } else if ptr {
            Some(PREC_POINTER)
        } else {
            None
        };
        let mut lp = if ptr {
            Some(PREC_POINTER)
        } else if arr {
            Some(PREC_ARRAY)
        } else {
            None
        };

        let mut out = String::new();
        // pointer here suppresses the leading separator on the first node
        let mut prev = CtfKind::Pointer;
        for prec in PREC_BASE..PREC_MAX {
            for node in &cd.nodes[prec] {
                let (rfp, record) = self.lookup(node.type_id)?;
                let name = rfp.strptr(record.name);

                if prev != CtfKind::Pointer && prev != CtfKind::Array {
                    out.push(' ');
                }
                if lp == Some(prec) {
                    out.push('(');
                    lp = None;
                }

                match node.kind {
                    CtfKind::Integer
                    | CtfKind::Float
                    | CtfKind::Typedef => {
                        out.push_str(&name.as_utf8_lossy());
                    }
                    CtfKind::Pointer => out.push('*'),
                    CtfKind::Array => {
                        let _ = write!(out, "[{}]", node.n);
                    }
                    CtfKind::Function => out.push_str("()"),
                    CtfKind::Struct | CtfKind::Forward => {
                        let _ = write!(out, "struct {name}");
                    }
                    CtfKind::Union => {
                        let _ = write!(out, "union {name}");
                    }
                    CtfKind::Enum => {
                        let _ = write!(out, "enum {name}");
                    }
                    CtfKind::Volatile => out.push_str("volatile"),
                    CtfKind::Const => out.push_str("const"),
                    CtfKind::Restrict => out.push_str("restrict"),
                    CtfKind::Unknown => {}
                }
                prev = node.kind;
            }
            if rp == Some(prec) {
                out.push(')');
            }
        }
        Ok(out)
    }

    /// Format the C type name of `id` into `buf`.
    ///
    /// Writes as much as fits and returns the full byte length of the
    /// name; when `buf` is too small the truncated prefix is still
    /// written and `NameLen` reports the length to retry with.
    pub fn type_lname(
        &self,
        id: TypeId,
        buf: &mut [u8],
    ) -> CtfResult<usize> {
        let name = self.name_string(id)?;
        let bytes = name.as_bytes();
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if bytes.len() > buf.len() {
            return Err(CtfError::NameLen {
                needed: bytes.len(),
            });
        }
        Ok(bytes.len())
    }

    /// Format the C type name of `id`, e.g. `int (*)[8]`.
    pub fn type_name(&self, id: TypeId) -> CtfResult<String> {
        self.name_string(id)
    }
}
