//! Symbol lookup in the running process's own namespaces
//!
//! These lookups take no [`LibraryHandle`](crate::LibraryHandle). They see
//! the executable, the libraries it was linked against and anything opened
//! with `RTLD_GLOBAL`. A symbol found here is only as long-lived as the
//! object that defines it: the executable and its linked libraries stay
//! loaded for the life of the process, a library opened with `RTLD_GLOBAL`
//! does not. [`ProcessScope::resolve_within`] borrows such a library's
//! handle for the lifetime of the entry point.

use crate::{
    LibraryHandle, Result,
    error::{released_error, symbol_missing_error},
    symbol::{EntryPoint, SymbolName},
};
use core::{
    ffi::{CStr, c_void},
    ptr::NonNull,
};

/// A process-level symbol namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessScope {
    /// The global lookup order, starting at the executable (`RTLD_DEFAULT`).
    #[default]
    Global,

    /// The next object after the caller in the lookup order (`RTLD_NEXT`).
    #[cfg(target_os = "linux")]
    Next,
}

impl ProcessScope {
    fn handle(self) -> *mut c_void {
        match self {
            ProcessScope::Global => libc::RTLD_DEFAULT,
            #[cfg(target_os = "linux")]
            ProcessScope::Next => libc::RTLD_NEXT,
        }
    }

    /// Looks up the address of `name` in this namespace.
    ///
    /// # Errors
    /// [`Error::SymbolMissing`](crate::Error::SymbolMissing) carrying the
    /// loader's message when no object in the namespace exports `name`.
    pub fn address(self, name: &str) -> Result<NonNull<()>> {
        let sym = SymbolName::new(name)?;
        let raw = unsafe {
            // Clear any stale error so the one read below belongs to this lookup.
            libc::dlerror();
            libc::dlsym(self.handle(), sym.as_cstr().as_ptr())
        };
        let ptr = NonNull::new(raw.cast::<()>())
            .ok_or_else(|| symbol_missing_error(name.to_owned(), last_error(name)))?;
        #[cfg(feature = "log")]
        log::trace!(
            "[Resolve] scope: {:?}, symbol: {}, demangled: {:?}, address: {:p}",
            self,
            name,
            sym.demangled(),
            ptr
        );
        Ok(ptr)
    }

    /// Resolves `name` in this namespace as an entry point of type `T`.
    ///
    /// # Safety
    /// `T` must match the symbol's real type. Nothing checks this.
    ///
    /// The object defining the symbol must stay loaded for as long as the
    /// entry point, or anything borrowed through it, is used. The `'static`
    /// lifetime only holds for the executable and the libraries it was linked
    /// against; use [`ProcessScope::resolve_within`] when the symbol may come
    /// from a library opened with `RTLD_GLOBAL`.
    pub unsafe fn resolve<T>(self, name: &str) -> Result<EntryPoint<'static, T>> {
        let ptr = self.address(name)?;
        Ok(unsafe { EntryPoint::from_raw(ptr) })
    }

    /// Resolves `name` in this namespace, tying the entry point to `anchor`.
    ///
    /// The lookup itself is the same as [`ProcessScope::resolve`]; `anchor`
    /// only lends its lifetime, so the library cannot be closed while the
    /// entry point or a buffer read through it is still alive.
    ///
    /// ```compile_fail
    /// # use dlprobe::{OutBufFn, ProcessScope, get_buffer, open_library};
    /// let mut lib = open_library!("./libfixture.so", global: true).unwrap();
    /// let getter = unsafe {
    ///     ProcessScope::Global.resolve_within::<OutBufFn>("GetDecryptOutBuf", &lib)
    /// }
    /// .unwrap();
    /// let bytes = unsafe { get_buffer(&getter) }.unwrap().as_bytes();
    /// lib.close().unwrap();
    /// println!("{bytes:?}");
    /// ```
    ///
    /// # Errors
    /// [`Error::Released`](crate::Error::Released) if `anchor` was already
    /// released, otherwise the same errors as [`ProcessScope::address`].
    ///
    /// # Safety
    /// `T` must match the symbol's real type, and the object that defines the
    /// symbol must be `anchor` itself or stay loaded at least as long.
    pub unsafe fn resolve_within<'lib, T>(
        self,
        name: &str,
        anchor: &'lib LibraryHandle,
    ) -> Result<EntryPoint<'lib, T>> {
        if anchor.is_released() {
            return Err(released_error(anchor.name().to_owned()));
        }
        let ptr = self.address(name)?;
        Ok(unsafe { EntryPoint::from_raw(ptr) })
    }
}

/// Resolves `name` in the process-global namespace.
///
/// # Safety
/// `T` must match the symbol's real type. Nothing checks this.
///
/// The object defining the symbol must stay loaded for as long as the entry
/// point, or anything borrowed through it, is used. See
/// [`ProcessScope::resolve_within`] for symbols that live in a library
/// opened with `RTLD_GLOBAL`.
pub unsafe fn resolve_global<T>(name: &str) -> Result<EntryPoint<'static, T>> {
    unsafe { ProcessScope::Global.resolve(name) }
}

fn last_error(name: &str) -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        return format!("{name}: symbol address is null");
    }
    unsafe { CStr::from_ptr(err) }
        .to_string_lossy()
        .into_owned()
}
