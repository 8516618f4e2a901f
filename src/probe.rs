//! The cipher probe sequence
//!
//! Opens a library, checks that it exports the mangled `Encrypt` and
//! `Decrypt` entry points, calls `Decrypt` with sentinel handles, then reads
//! the decrypt output buffer through `GetDecryptOutBuf`. Every step is
//! fail-fast: the first error ends the run.

use crate::{
    LibraryHandle, OpenOptions, ProcessScope, Result,
    buffer::{OutBufFn, get_buffer},
    opaque::{Opaque, RealString},
    symbol::EntryPoint,
};
use core::{
    ffi::c_long,
    fmt::{Debug, Display},
};
use std::path::{Path, PathBuf};

/// Signature shared by the `Encrypt` and `Decrypt` entry points.
pub type CipherFn =
    unsafe extern "C" fn(Opaque<RealString>, Opaque<RealString>, c_long) -> *mut RealString;

/// Library the probe opens when nothing else is configured.
pub const DEFAULT_LIBRARY: &str = "./EHEncrypt16141.so";

/// `Encrypt(REALstringStruct*, REALstringStruct*, long)`
pub const ENCRYPT_SYMBOL: &str = "_Z7EncryptP16REALstringStructS0_l";

/// `Decrypt(REALstringStruct*, REALstringStruct*, long)`
pub const DECRYPT_SYMBOL: &str = "_Z7DecryptP16REALstringStructS0_l";

pub const OUT_BUF_SYMBOL: &str = "GetDecryptOutBuf";

/// Sentinel passed as the data argument of `Decrypt`.
pub const DATA_SENTINEL: usize = 0x1337;

/// Sentinel passed as the password argument of `Decrypt`.
pub const PASSWORD_SENTINEL: usize = 0x1234;

/// Where the buffer getter is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferScope {
    /// The process's own namespace, like `dlsym(NULL, ..)`.
    #[default]
    Process,
    /// The probed library.
    Library,
}

/// A configured probe run.
#[derive(Debug, Clone)]
pub struct Probe {
    library: PathBuf,
    options: OpenOptions,
    encrypt: String,
    decrypt: String,
    out_buf: String,
    buffer_scope: BufferScope,
    data: usize,
    password: usize,
    offset: c_long,
}

impl Default for Probe {
    fn default() -> Self {
        Probe::new(DEFAULT_LIBRARY)
    }
}

impl Probe {
    /// Creates a probe of `library` with the default symbols and arguments.
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Probe {
            library: library.into(),
            options: OpenOptions::new(),
            encrypt: ENCRYPT_SYMBOL.to_owned(),
            decrypt: DECRYPT_SYMBOL.to_owned(),
            out_buf: OUT_BUF_SYMBOL.to_owned(),
            buffer_scope: BufferScope::Process,
            data: DATA_SENTINEL,
            password: PASSWORD_SENTINEL,
            offset: 0,
        }
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Sets the options used to open the library.
    pub fn options(mut self, options: OpenOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the exact names of the two cipher entry points.
    pub fn cipher_symbols(mut self, encrypt: impl Into<String>, decrypt: impl Into<String>) -> Self {
        self.encrypt = encrypt.into();
        self.decrypt = decrypt.into();
        self
    }

    /// Overrides the exact name of the buffer getter.
    pub fn out_buf_symbol(mut self, name: impl Into<String>) -> Self {
        self.out_buf = name.into();
        self
    }

    /// Chooses where the buffer getter is looked up.
    pub fn buffer_scope(mut self, scope: BufferScope) -> Self {
        self.buffer_scope = scope;
        self
    }

    /// Overrides the addresses passed as the data and password handles.
    pub fn sentinels(mut self, data: usize, password: usize) -> Self {
        self.data = data;
        self.password = password;
        self
    }

    pub fn offset(mut self, offset: c_long) -> Self {
        self.offset = offset;
        self
    }

    /// Runs the probe and copies out the decrypt buffer.
    ///
    /// The library is released before returning, on success and on error.
    pub fn run(&self) -> Result<ProbeReport> {
        let data = Opaque::<RealString>::from_addr(self.data)?;
        let password = Opaque::<RealString>::from_addr(self.password)?;

        let mut lib = self.options.open(&self.library)?;
        let bytes = self.call(&lib, data, password)?;
        lib.close()?;
        Ok(ProbeReport { bytes })
    }

    fn call(
        &self,
        lib: &LibraryHandle,
        data: Opaque<RealString>,
        password: Opaque<RealString>,
    ) -> Result<Vec<u8>> {
        unsafe {
            // Encrypt is only checked for presence.
            let _encrypt: EntryPoint<'_, CipherFn> = lib.resolve(&self.encrypt)?;
            let decrypt: EntryPoint<'_, CipherFn> = lib.resolve(&self.decrypt)?;
            #[cfg(feature = "log")]
            log::debug!(
                "[Probe] calling {} with data: {:p}, password: {:p}, offset: {}",
                self.decrypt,
                data,
                password,
                self.offset
            );
            let _ = decrypt.invoke((data, password, self.offset));

            let bytes = match self.buffer_scope {
                BufferScope::Process => {
                    let getter: EntryPoint<'_, OutBufFn> =
                        ProcessScope::Global.resolve_within(&self.out_buf, lib)?;
                    get_buffer(&getter)?.as_bytes().to_vec()
                }
                BufferScope::Library => {
                    let getter: EntryPoint<'_, OutBufFn> = lib.resolve(&self.out_buf)?;
                    get_buffer(&getter)?.as_bytes().to_vec()
                }
            };
            Ok(bytes)
        }
    }
}

/// The bytes read from the decrypt buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbeReport {
    bytes: Vec<u8>,
}

impl ProbeReport {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Text rendering of the buffer, bounded by its length.
    pub fn text(&self) -> String {
        crate::OutBuffer::new(&self.bytes).text()
    }
}

impl Debug for ProbeReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProbeReport")
            .field("len", &self.bytes.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// Renders `104 101 108 108 111  ::  hello`.
impl Display for ProbeReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let buf = crate::OutBuffer::new(&self.bytes);
        write!(f, "{} ::  {}", buf.decimal(), buf.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_harness() {
        let probe = Probe::default();
        assert_eq!(probe.library(), Path::new("./EHEncrypt16141.so"));
        assert_eq!(probe.data, 0x1337);
        assert_eq!(probe.password, 0x1234);
        assert_eq!(probe.offset, 0);
        assert_eq!(probe.buffer_scope, BufferScope::Process);
        assert!(probe.options.is_lazy());
    }

    #[test]
    fn report_format() {
        let report = ProbeReport {
            bytes: b"hello".to_vec(),
        };
        assert_eq!(report.to_string(), "104 101 108 108 111  ::  hello");
        let empty = ProbeReport { bytes: Vec::new() };
        assert_eq!(empty.to_string(), " ::  ");
    }

    #[test]
    fn missing_library_is_not_found() {
        let err = Probe::new("target/this_location_is_definitely_non existent:^~")
            .run()
            .unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { .. }), "{err}");
    }

    #[test]
    fn null_sentinel_is_rejected_before_loading() {
        let err = Probe::new("target/this_location_is_definitely_non existent:^~")
            .sentinels(0, 0x1234)
            .run()
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidHandle { .. }), "{err}");
    }
}
