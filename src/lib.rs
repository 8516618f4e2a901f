//! # dlprobe
//! Open shared libraries through the system dynamic loader, resolve symbols
//! by their exact linker-level names, and call them.
//! ## Scopes
//! Lookups happen in one of two separate namespaces:
//! * per library, through a [`LibraryHandle`] ([`LibraryHandle::resolve`]);
//! * process-wide, through a [`ProcessScope`] ([`ProcessScope::resolve`]),
//!   which needs no handle and sees the executable itself.
//!
//! Resolved symbols come back as [`EntryPoint`]s typed by the caller.
//! Nothing checks that type against the library, so resolution is `unsafe`.
//! ## Example
//! ```no_run
//! use dlprobe::{LibraryHandle, OutBufFn, ProcessScope, get_buffer};
//!
//! let lib = LibraryHandle::open("./EHEncrypt16141.so").unwrap();
//! unsafe {
//!     let getter = ProcessScope::Global
//!         .resolve::<OutBufFn>("GetDecryptOutBuf")
//!         .unwrap();
//!     let buf = get_buffer(&getter).unwrap();
//!     println!("{}", buf.decimal());
//! }
//! drop(lib);
//! ```

#[cfg(not(unix))]
compile_error!("dlprobe relies on dlopen/dlsym and only supports unix targets");

mod buffer;
mod error;
pub mod exports;
mod library;
mod macros;
pub mod opaque;
pub mod probe;
mod process;
mod symbol;

pub use buffer::{Decimal, OutBufFn, OutBuffer, get_buffer};
pub use error::Error;
pub use library::{LibraryHandle, OpenFlags, OpenOptions};
pub use process::{ProcessScope, resolve_global};
pub use symbol::{EntryPoint, ForeignFn, SymbolName, demangle};

/// A type alias for `Result`s returned by `dlprobe` functions.
///
/// This is a convenience alias that eliminates the need to repeatedly specify
/// the `Error` type in function signatures.
pub type Result<T> = core::result::Result<T, Error>;

/// Opens the shared library at `path` with lazy binding and local visibility.
///
/// # Errors
/// [`Error::NotFound`] carrying the loader's message when the file is absent
/// or is not a loadable module.
pub fn open_library(path: impl AsRef<std::path::Path>) -> Result<LibraryHandle> {
    OpenOptions::new().open(path)
}
