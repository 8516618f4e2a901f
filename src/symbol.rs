//! Symbol names and resolved entry points
//!
//! A symbol is looked up by its exact linker-level name. Mangling is the
//! caller's concern: `_Z7DecryptP16REALstringStructS0_l` is passed through
//! verbatim and never computed here. The resolved address is wrapped in an
//! [`EntryPoint`] whose lifetime is bound to the scope it came from.

use crate::{Result, error::invalid_name_error};
use core::{ffi::CStr, fmt::Display, marker::PhantomData, ops::Deref, ptr::NonNull};
use std::ffi::CString;

/// An exact symbol name, checked so that it can be handed to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName<'a> {
    /// The name as supplied by the caller.
    name: &'a str,

    /// The same name, NUL-terminated for `dlsym`.
    cname: CString,
}

impl<'a> SymbolName<'a> {
    /// Validates `name` for lookup.
    ///
    /// Empty names and names containing a NUL byte are rejected with
    /// [`Error::InvalidName`](crate::Error::InvalidName).
    pub fn new(name: &'a str) -> Result<Self> {
        if name.is_empty() {
            return Err(invalid_name_error("symbol name is empty"));
        }
        let cname = CString::new(name)
            .map_err(|err| invalid_name_error(format!("{name:?}: {err}")))?;
        Ok(SymbolName { name, cname })
    }

    /// Returns the name exactly as the caller supplied it.
    #[inline]
    pub fn as_str(&self) -> &'a str {
        self.name
    }

    /// Returns the name as a C-style string.
    #[inline]
    pub fn as_cstr(&self) -> &CStr {
        &self.cname
    }

    /// Returns the human-readable form of an Itanium-mangled name.
    ///
    /// Only used for diagnostics; lookups always use the raw name.
    pub fn demangled(&self) -> Option<String> {
        demangle(self.name)
    }
}

impl Display for SymbolName<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}

/// Demangles an Itanium C++ symbol name, returning `None` for anything else.
pub fn demangle(name: &str) -> Option<String> {
    if !name.starts_with("_Z") {
        return None;
    }
    cpp_demangle::Symbol::new(name)
        .ok()
        .map(|sym| sym.to_string())
}

/// A resolved, non-null entry point typed as `T`.
///
/// `T` is whatever the caller claims the symbol is, normally an
/// `unsafe extern "C" fn(..)` pointer type. Nothing checks that claim.
/// The `'lib` lifetime ties the entry point to the library (or process)
/// scope it was resolved from, so it cannot outlive a released handle.
#[derive(Debug)]
pub struct EntryPoint<'lib, T: 'lib> {
    /// Raw address of the symbol.
    ptr: *mut (),

    /// Binds the entry point to its source scope.
    pd: PhantomData<&'lib T>,
}

impl<T> Clone for EntryPoint<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntryPoint<'_, T> {}

impl<'lib, T> EntryPoint<'lib, T> {
    /// Wraps a raw, non-null address.
    ///
    /// # Safety
    /// `ptr` must point to something that really has type `T` and must stay
    /// valid for `'lib`.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<()>) -> Self {
        const {
            assert!(
                size_of::<T>() == size_of::<*mut ()>(),
                "entry point types must be pointer-sized"
            )
        };
        EntryPoint {
            ptr: ptr.as_ptr(),
            pd: PhantomData,
        }
    }

    /// Reinterprets the entry point as a different type.
    ///
    /// # Safety
    /// Same contract as [`EntryPoint::from_raw`] for `U`.
    #[inline]
    pub unsafe fn cast<U>(self) -> EntryPoint<'lib, U> {
        // `ptr` came from a NonNull.
        unsafe { EntryPoint::from_raw(NonNull::new_unchecked(self.ptr)) }
    }

    /// Returns the address of the symbol.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr as usize
    }

    /// Consumes the `EntryPoint` and returns its raw memory address.
    #[inline]
    pub fn into_raw(self) -> *const () {
        self.ptr
    }
}

impl<T> Deref for EntryPoint<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*(&self.ptr as *const *mut _ as *const T) }
    }
}

impl<F: ForeignFn> EntryPoint<'_, F> {
    /// Calls the entry point with `args`.
    ///
    /// # Safety
    /// The symbol must really have signature `F`, and the callee's own
    /// preconditions apply. Any side effect of the callee is out of our hands.
    #[inline]
    pub unsafe fn invoke(&self, args: F::Args) -> F::Output {
        #[cfg(feature = "log")]
        log::trace!("[Invoke] address: {:p}", self.ptr);
        unsafe { (**self).call(args) }
    }
}

/// Foreign function pointer types that can be called with a tuple of arguments.
pub trait ForeignFn: Copy {
    /// The argument tuple.
    type Args;
    /// The return type.
    type Output;

    /// Calls the function.
    ///
    /// # Safety
    /// The pointer must reference a function with exactly this signature.
    unsafe fn call(self, args: Self::Args) -> Self::Output;
}

macro_rules! impl_foreign_fn {
    ($($arg:ident),*) => {
        impl<R, $($arg),*> ForeignFn for unsafe extern "C" fn($($arg),*) -> R {
            type Args = ($($arg,)*);
            type Output = R;

            #[inline]
            #[allow(non_snake_case)]
            unsafe fn call(self, args: Self::Args) -> R {
                let ($($arg,)*) = args;
                unsafe { self($($arg),*) }
            }
        }
    };
}

impl_foreign_fn!();
impl_foreign_fn!(A);
impl_foreign_fn!(A, B);
impl_foreign_fn!(A, B, C);
impl_foreign_fn!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;
    use core::ffi::c_long;

    unsafe extern "C" fn add(a: c_long, b: c_long, c: c_long) -> c_long {
        a + b + c
    }

    unsafe extern "C" fn answer() -> i32 {
        42
    }

    #[test]
    fn mangled_names_pass_through() {
        let name = SymbolName::new("_Z7DecryptP16REALstringStructS0_l").unwrap();
        assert_eq!(name.as_str(), "_Z7DecryptP16REALstringStructS0_l");
        assert_eq!(
            name.as_cstr().to_bytes(),
            b"_Z7DecryptP16REALstringStructS0_l"
        );
        assert_eq!(
            name.demangled().as_deref(),
            Some("Decrypt(REALstringStruct*, REALstringStruct*, long)")
        );
    }

    #[test]
    fn plain_names_do_not_demangle() {
        let name = SymbolName::new("GetDecryptOutBuf").unwrap();
        assert_eq!(name.demangled(), None);
    }

    #[test]
    fn rejects_unusable_names() {
        assert!(matches!(
            SymbolName::new(""),
            Err(crate::Error::InvalidName { .. })
        ));
        assert!(matches!(
            SymbolName::new("Dec\0rypt"),
            Err(crate::Error::InvalidName { .. })
        ));
    }

    #[test]
    fn invoke_passes_arguments_through() {
        type AddFn = unsafe extern "C" fn(c_long, c_long, c_long) -> c_long;
        let raw = NonNull::new(add as AddFn as *mut ()).unwrap();
        let entry = unsafe { EntryPoint::<'static, AddFn>::from_raw(raw) };
        assert_eq!(unsafe { entry.invoke((1, 2, 3)) }, 6);
        assert_eq!(entry.addr(), add as AddFn as usize);
    }

    #[test]
    fn invoke_without_arguments() {
        type AnswerFn = unsafe extern "C" fn() -> i32;
        let raw = NonNull::new(answer as AnswerFn as *mut ()).unwrap();
        let entry = unsafe { EntryPoint::<'static, AnswerFn>::from_raw(raw) };
        assert_eq!(unsafe { entry.invoke(()) }, 42);
        assert_eq!(unsafe { (*entry)() }, 42);
    }

    #[test]
    fn cast_keeps_the_address() {
        type AddFn = unsafe extern "C" fn(c_long, c_long, c_long) -> c_long;
        let raw = NonNull::new(add as AddFn as *mut ()).unwrap();
        let entry = unsafe { EntryPoint::<'static, AddFn>::from_raw(raw) };
        let opaque: EntryPoint<'static, *const ()> = unsafe { entry.cast() };
        assert_eq!(opaque.addr(), entry.addr());
        assert_eq!(*opaque, entry.into_raw());
        let back: EntryPoint<'static, AddFn> = unsafe { opaque.cast() };
        assert_eq!(unsafe { back.invoke((4, 5, 6)) }, 15);
    }
}
