//! Exported dynamic symbols of a library file
//!
//! When probing an unknown ABI the exact name to look up is often the hard
//! part. [`exports`] reads a shared object from disk and lists what its
//! dynamic symbol table defines, without loading it.

use crate::{Result, error::io_error, symbol::demangle};
use elf::{
    ElfBytes,
    abi::{STB_GLOBAL, STB_GNU_UNIQUE, STB_WEAK, STT_FUNC, STT_GNU_IFUNC, STT_OBJECT, STT_TLS},
    endian::AnyEndian,
};
use std::path::Path;

/// What kind of entity an exported symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Function,
    Object,
    Tls,
}

/// A symbol defined and exported by a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// The exact linker-level name.
    pub name: String,
    /// The Itanium-demangled name, if the name is mangled.
    pub demangled: Option<String>,
    pub kind: ExportKind,
    /// Whether the binding is weak.
    pub weak: bool,
}

/// Lists the defined global and weak symbols in the dynamic symbol table of
/// the file at `path`.
///
/// Undefined (imported) symbols, local symbols and section/file symbols are
/// skipped. A file without a dynamic symbol table yields an empty list.
pub fn exports(path: impl AsRef<Path>) -> Result<Vec<Export>> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .map_err(|err| io_error(format!("{}: {err}", path.display())))?;
    exports_from_bytes(&data)
}

/// Same as [`exports`], for a library image already in memory.
pub fn exports_from_bytes(data: &[u8]) -> Result<Vec<Export>> {
    let file = ElfBytes::<AnyEndian>::minimal_parse(data)?;
    let Some((symtab, strtab)) = file.dynamic_symbol_table()? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for sym in symtab.iter() {
        if sym.is_undefined() || sym.st_name == 0 {
            continue;
        }
        let bind = sym.st_bind();
        if bind != STB_GLOBAL && bind != STB_WEAK && bind != STB_GNU_UNIQUE {
            continue;
        }
        let kind = match sym.st_symtype() {
            STT_FUNC | STT_GNU_IFUNC => ExportKind::Function,
            STT_OBJECT => ExportKind::Object,
            STT_TLS => ExportKind::Tls,
            _ => continue,
        };
        let name = strtab.get(sym.st_name as usize)?;
        out.push(Export {
            name: name.to_owned(),
            demangled: demangle(name),
            kind,
            weak: bind == STB_WEAK,
        });
    }
    #[cfg(feature = "log")]
    log::trace!("[Exports] {} defined symbols", out.len());
    Ok(out)
}

/// Names among `exports` that contain `needle`, for "did you mean" output.
pub fn similar<'a>(exports: &'a [Export], needle: &str) -> Vec<&'a Export> {
    exports
        .iter()
        .filter(|export| {
            export.name.contains(needle)
                || export
                    .demangled
                    .as_deref()
                    .is_some_and(|demangled| demangled.contains(needle))
        })
        .collect()
}
