//! Typed opaque handles for foreign arguments
//!
//! Foreign entry points often take pointers to objects whose layout we do
//! not know. [`Opaque<T>`] carries such a pointer across the boundary with
//! its pointee type attached, after checking that it is non-null. The
//! prober never dereferences it.

use crate::{Result, error::invalid_handle_error};
use core::{
    ffi::c_void,
    fmt::{Debug, Pointer},
    marker::{PhantomData, PhantomPinned},
    ptr::NonNull,
};

/// The string object the cipher entry points take and return.
///
/// Its layout belongs to the foreign library; only pointers to it exist on
/// this side.
#[repr(C)]
pub struct RealString {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// A non-null pointer to a foreign `T`, passed through untouched.
///
/// `Opaque<T>` has the same ABI as `*mut T`, so it can appear directly in
/// `extern "C"` signatures.
#[repr(transparent)]
pub struct Opaque<T> {
    ptr: NonNull<c_void>,
    _marker: PhantomData<*mut T>,
}

impl<T> Opaque<T> {
    /// Builds a handle from a raw address.
    ///
    /// The address is not checked for pointing at anything; it may be a
    /// sentinel such as `0x1337`. Only the null address is rejected.
    pub fn from_addr(addr: usize) -> Result<Self> {
        NonNull::new(addr as *mut c_void)
            .map(|ptr| Opaque {
                ptr,
                _marker: PhantomData,
            })
            .ok_or_else(|| invalid_handle_error("null address"))
    }

    /// Builds a handle from a raw pointer, rejecting null.
    pub fn from_ptr(ptr: *mut T) -> Result<Self> {
        Self::from_addr(ptr as usize)
    }

    /// Returns the address carried by the handle.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Returns the handle as a raw pointer.
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr().cast()
    }
}

impl<T> Clone for Opaque<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Opaque<T> {}

impl<T> PartialEq for Opaque<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Opaque<T> {}

impl<T> Debug for Opaque<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Opaque").field(&self.ptr).finish()
    }
}

impl<T> Pointer for Opaque<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Pointer::fmt(&self.ptr, f)
    }
}
