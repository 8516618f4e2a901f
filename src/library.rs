//! Shared libraries opened through the system dynamic loader
//!
//! A [`LibraryHandle`] owns one `dlopen` reference. Symbols resolved from it
//! borrow the handle, so they cannot be used once it is released. Releasing
//! happens on drop, or explicitly through [`LibraryHandle::close`], which
//! reports a second release as an error.

use crate::{
    Result,
    error::{close_error, not_found_error, released_error, symbol_missing_error},
    symbol::{EntryPoint, SymbolName},
};
use bitflags::bitflags;
use core::{cell::RefCell, ffi::c_int, ffi::c_void, ptr::NonNull};
use foldhash::fast::RandomState;
use hashbrown::HashMap;
use libloading::os::unix::Library;
use std::path::Path;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Flags handed to `dlopen`.
    pub struct OpenFlags: c_int {
        /// Resolve function symbols on first call.
        const RTLD_LAZY = libc::RTLD_LAZY;

        /// Resolve every symbol before `dlopen` returns.
        const RTLD_NOW = libc::RTLD_NOW;

        /// Make the library's symbols available to the process-global namespace.
        const RTLD_GLOBAL = libc::RTLD_GLOBAL;

        /// Keep the library's symbols out of the process-global namespace.
        const RTLD_LOCAL = libc::RTLD_LOCAL;

        /// Do not unload the library on close.
        const RTLD_NODELETE = libc::RTLD_NODELETE;
    }
}

/// Options controlling how a library is opened.
///
/// The defaults are lazy binding with local visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    flags: OpenFlags,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            flags: OpenFlags::RTLD_LAZY | OpenFlags::RTLD_LOCAL,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use lazy binding (`RTLD_LAZY`) or immediate binding (`RTLD_NOW`).
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.flags.remove(OpenFlags::RTLD_LAZY | OpenFlags::RTLD_NOW);
        self.flags.insert(if lazy {
            OpenFlags::RTLD_LAZY
        } else {
            OpenFlags::RTLD_NOW
        });
        self
    }

    /// Export the library's symbols to the process-global namespace.
    pub fn global(mut self, global: bool) -> Self {
        self.flags.remove(OpenFlags::RTLD_GLOBAL | OpenFlags::RTLD_LOCAL);
        self.flags.insert(if global {
            OpenFlags::RTLD_GLOBAL
        } else {
            OpenFlags::RTLD_LOCAL
        });
        self
    }

    /// Keep the library mapped after the handle is released.
    pub fn no_delete(mut self, no_delete: bool) -> Self {
        self.flags.set(OpenFlags::RTLD_NODELETE, no_delete);
        self
    }

    #[inline]
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        !self.flags.contains(OpenFlags::RTLD_NOW)
    }

    /// Opens the library at `path`.
    ///
    /// Loading runs the library's own initializers.
    ///
    /// # Errors
    /// [`Error::NotFound`](crate::Error::NotFound) carrying the loader's
    /// message when the file is absent or cannot be loaded.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<LibraryHandle> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let lib = unsafe { Library::open(Some(path), self.flags.bits()) }
            .map_err(|err| not_found_error(name.clone(), err.to_string()))?;
        #[cfg(feature = "log")]
        log::debug!("[Open] library: {}, flags: {:?}", name, self.flags);
        Ok(LibraryHandle {
            name,
            lib: Some(lib),
            cache: RefCell::new(HashMap::with_hasher(RandomState::default())),
        })
    }
}

/// An opened shared library.
pub struct LibraryHandle {
    /// The path the library was opened from.
    name: String,

    /// `None` once released.
    lib: Option<Library>,

    /// Addresses already resolved from this library, keyed by exact name.
    cache: RefCell<HashMap<Box<str>, NonNull<c_void>, RandomState>>,
}

impl core::fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("name", &self.name)
            .field("released", &self.lib.is_none())
            .field("resolved", &self.cache.borrow().len())
            .finish()
    }
}

impl LibraryHandle {
    /// Opens `path` with the default [`OpenOptions`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Gets the path the library was opened from.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`LibraryHandle::close`] has already run.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.lib.is_none()
    }

    /// Looks up the address of `name` in this library only.
    ///
    /// # Errors
    /// * [`Error::SymbolMissing`](crate::Error::SymbolMissing) when the
    ///   library does not export `name`.
    /// * [`Error::Released`](crate::Error::Released) after the handle was
    ///   closed.
    pub fn address(&self, name: &str) -> Result<NonNull<()>> {
        let lib = self
            .lib
            .as_ref()
            .ok_or_else(|| released_error(self.name.clone()))?;
        if let Some(ptr) = self.cache.borrow().get(name) {
            return Ok(ptr.cast());
        }
        let sym = SymbolName::new(name)?;
        let raw = unsafe { lib.get::<*mut c_void>(sym.as_cstr().to_bytes_with_nul()) }
            .map_err(|err| symbol_missing_error(name.to_owned(), err.to_string()))?
            .into_raw();
        let ptr = NonNull::new(raw).ok_or_else(|| {
            symbol_missing_error(name.to_owned(), format!("{name}: symbol address is null"))
        })?;
        #[cfg(feature = "log")]
        log::trace!(
            "[Resolve] library: {}, symbol: {}, demangled: {:?}, address: {:p}",
            self.name,
            name,
            sym.demangled(),
            ptr
        );
        self.cache.borrow_mut().insert(name.into(), ptr);
        Ok(ptr.cast())
    }

    /// Resolves `name` in this library as an entry point of type `T`.
    ///
    /// The name is used as-is; no mangling is done.
    ///
    /// # Safety
    /// `T` must match the symbol's real type. Nothing checks this.
    ///
    /// # Examples
    /// ```no_run
    /// # use dlprobe::LibraryHandle;
    /// let lib = LibraryHandle::open("./libfixture.so").unwrap();
    /// unsafe {
    ///     let strlen = lib
    ///         .resolve::<unsafe extern "C" fn(*const u8) -> usize>("strlen")
    ///         .unwrap();
    ///     strlen.invoke((c"abc".as_ptr().cast(),));
    /// }
    /// ```
    pub unsafe fn resolve<'lib, T>(&'lib self, name: &str) -> Result<EntryPoint<'lib, T>> {
        let ptr = self.address(name)?;
        Ok(unsafe { EntryPoint::from_raw(ptr) })
    }

    /// Releases the library.
    ///
    /// # Errors
    /// * [`Error::Released`](crate::Error::Released) if the handle was
    ///   already released.
    /// * [`Error::Close`](crate::Error::Close) if the loader fails to close it.
    pub fn close(&mut self) -> Result<()> {
        let lib = self
            .lib
            .take()
            .ok_or_else(|| released_error(self.name.clone()))?;
        self.cache.get_mut().clear();
        #[cfg(feature = "log")]
        log::debug!("[Close] library: {}", self.name);
        lib.close().map_err(|err| close_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_lazy_and_local() {
        let options = OpenOptions::new();
        assert!(options.is_lazy());
        assert!(!options.flags().contains(OpenFlags::RTLD_GLOBAL));
        assert!(!options.flags().contains(OpenFlags::RTLD_NODELETE));
    }

    #[test]
    fn builder_toggles_flags() {
        let options = OpenOptions::new().lazy(false).global(true).no_delete(true);
        assert!(!options.is_lazy());
        assert!(options.flags().contains(OpenFlags::RTLD_NOW));
        assert!(options.flags().contains(OpenFlags::RTLD_GLOBAL));
        assert!(options.flags().contains(OpenFlags::RTLD_NODELETE));
        assert_eq!(
            options.flags().bits(),
            libc::RTLD_NOW | libc::RTLD_GLOBAL | libc::RTLD_NODELETE
        );

        let options = options.no_delete(false).global(false);
        assert!(!options.flags().contains(OpenFlags::RTLD_NODELETE));
        assert!(!options.flags().contains(OpenFlags::RTLD_GLOBAL));
    }
}
