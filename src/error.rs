use std::borrow::Cow;
use std::fmt::Display;

/// Error types used throughout the `dlprobe` library.
/// These errors represent the failure conditions that can occur while
/// opening shared libraries, resolving symbols and reading the buffers
/// returned by foreign code.
#[derive(Debug)]
pub enum Error {
    /// The dynamic loader refused to open a shared library.
    ///
    /// This typically indicates:
    /// * File not found
    /// * The file is not a loadable module for this process
    /// * One of its dependencies could not be loaded
    NotFound {
        /// The path that was handed to the loader.
        path: Cow<'static, str>,
        /// The loader's own diagnostic text.
        msg: Cow<'static, str>,
    },

    /// A symbol name could not be resolved in the requested scope.
    SymbolMissing {
        /// The exact name that was looked up.
        name: Cow<'static, str>,
        /// The loader's own diagnostic text.
        msg: Cow<'static, str>,
    },

    /// A symbol name cannot be handed to the loader, e.g. it contains a NUL byte.
    InvalidName {
        /// A descriptive message about the rejected name.
        msg: Cow<'static, str>,
    },

    /// An opaque foreign handle failed validation at the boundary.
    InvalidHandle {
        /// A descriptive message about the rejected handle.
        msg: Cow<'static, str>,
    },

    /// A buffer getter reported a non-zero length together with a null pointer.
    NullBuffer {
        /// The length the callee wrote into the out-parameter.
        len: u64,
    },

    /// The library handle has already been released.
    Released {
        /// Name of the released library.
        name: Cow<'static, str>,
    },

    /// The loader failed while closing a library.
    Close {
        /// The loader's own diagnostic text.
        msg: Cow<'static, str>,
    },

    /// An error occurred while reading a library file from disk.
    Io {
        /// A descriptive message about the I/O error.
        msg: Cow<'static, str>,
    },

    /// An error occurred while parsing a library file as ELF.
    ParseElf {
        /// A descriptive message about the parsing error.
        msg: Cow<'static, str>,
    },
}

impl Error {
    /// Returns the message the dynamic loader produced for this failure, or
    /// the rendered error when the failure did not come from the loader.
    pub fn diagnostic(&self) -> Cow<'_, str> {
        match self {
            Error::NotFound { msg, .. }
            | Error::SymbolMissing { msg, .. }
            | Error::Close { msg } => Cow::Borrowed(&**msg),
            _ => Cow::Owned(self.to_string()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound { path, msg } => write!(f, "failed to open library {path}: {msg}"),
            Error::SymbolMissing { name, msg } => {
                write!(f, "failed to resolve symbol {name}: {msg}")
            }
            Error::InvalidName { msg } => write!(f, "invalid symbol name: {msg}"),
            Error::InvalidHandle { msg } => write!(f, "invalid foreign handle: {msg}"),
            Error::NullBuffer { len } => {
                write!(f, "buffer getter returned null with length {len}")
            }
            Error::Released { name } => write!(f, "library {name} was already released"),
            Error::Close { msg } => write!(f, "failed to close library: {msg}"),
            Error::Io { msg } => write!(f, "I/O error: {msg}"),
            Error::ParseElf { msg } => write!(f, "ELF parsing error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    #[cold]
    fn from(value: std::io::Error) -> Self {
        io_error(value.to_string())
    }
}

impl From<elf::ParseError> for Error {
    #[cold]
    fn from(value: elf::ParseError) -> Self {
        Error::ParseElf {
            msg: value.to_string().into(),
        }
    }
}

#[cold]
#[inline(never)]
pub(crate) fn not_found_error(
    path: impl Into<Cow<'static, str>>,
    msg: impl Into<Cow<'static, str>>,
) -> Error {
    Error::NotFound {
        path: path.into(),
        msg: msg.into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn symbol_missing_error(
    name: impl Into<Cow<'static, str>>,
    msg: impl Into<Cow<'static, str>>,
) -> Error {
    Error::SymbolMissing {
        name: name.into(),
        msg: msg.into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn invalid_name_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::InvalidName { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn invalid_handle_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::InvalidHandle { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn released_error(name: impl Into<Cow<'static, str>>) -> Error {
    Error::Released { name: name.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn close_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Close { msg: msg.into() }
}

/// Creates an I/O error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn io_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Io { msg: msg.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_is_the_loader_text() {
        let err = symbol_missing_error("GetDecryptOutBuf", "undefined symbol: GetDecryptOutBuf");
        assert_eq!(err.diagnostic(), "undefined symbol: GetDecryptOutBuf");
        assert_eq!(
            err.to_string(),
            "failed to resolve symbol GetDecryptOutBuf: undefined symbol: GetDecryptOutBuf"
        );
    }

    #[test]
    fn diagnostic_falls_back_to_display() {
        let err = released_error("libfixture.so");
        assert_eq!(err.diagnostic(), "library libfixture.so was already released");
    }
}
