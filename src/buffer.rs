//! Length-delimited output buffers owned by foreign code
//!
//! A buffer getter writes a length into an out-parameter and returns a
//! pointer to a region it owns. The region is borrowed for as long as the
//! scope that produced the getter stays loaded.

use crate::{Error, Result, symbol::EntryPoint};
use core::{
    ffi::c_ulong,
    fmt::{Debug, Display},
};

/// Signature of a buffer getter: `unsigned char *(*)(unsigned long *length)`.
pub type OutBufFn = unsafe extern "C" fn(*mut c_ulong) -> *const u8;

/// Bytes borrowed from foreign code, bounded by the length it declared.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OutBuffer<'lib> {
    bytes: &'lib [u8],
}

impl<'lib> OutBuffer<'lib> {
    /// Wraps an already borrowed region.
    #[inline]
    pub const fn new(bytes: &'lib [u8]) -> Self {
        OutBuffer { bytes }
    }

    /// The declared length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The borrowed bytes.
    #[inline]
    pub fn as_bytes(&self) -> &'lib [u8] {
        self.bytes
    }

    /// Space-separated decimal rendering, one trailing space per byte.
    pub fn decimal(&self) -> Decimal<'lib> {
        Decimal(self.bytes)
    }

    /// Text rendering of the buffer.
    ///
    /// Reading stops at the first NUL byte or at the declared length,
    /// whichever comes first; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        let end = self
            .bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }
}

impl Debug for OutBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutBuffer")
            .field("len", &self.bytes.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// Display adapter returned by [`OutBuffer::decimal`].
pub struct Decimal<'a>(&'a [u8]);

impl Display for Decimal<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte} ")?;
        }
        Ok(())
    }
}

/// Calls a buffer getter and borrows the region it returns.
///
/// A null pointer with a zero length is an empty buffer. A null pointer with
/// a non-zero length is [`Error::NullBuffer`].
///
/// # Safety
/// `getter` must really have signature [`OutBufFn`], and the returned
/// region must be readable for the declared length while `'lib` lasts.
/// The object defining the getter must stay loaded for as long as the
/// buffer is used; a `'static` getter from
/// [`ProcessScope::resolve`](crate::ProcessScope::resolve) does not ensure
/// that for libraries opened with `RTLD_GLOBAL`.
pub unsafe fn get_buffer<'lib>(getter: &EntryPoint<'lib, OutBufFn>) -> Result<OutBuffer<'lib>> {
    let mut len: c_ulong = 0;
    let ptr = unsafe { getter.invoke((&raw mut len,)) };
    #[cfg(feature = "log")]
    log::debug!("[Buffer] address: {:p}, length: {}", ptr, len);
    if ptr.is_null() {
        if len == 0 {
            return Ok(OutBuffer::new(&[]));
        }
        return Err(Error::NullBuffer { len: len as u64 });
    }
    let bytes = unsafe { core::slice::from_raw_parts(ptr, len as usize) };
    Ok(OutBuffer::new(bytes))
}
