mod common;

use common::{CallsFn, CipherFn, FIXTURE, NON_EXISTENT, init_logger};
use core::ffi::c_ulong;
use dlprobe::{
    EntryPoint, Error, LibraryHandle, OpenOptions, OutBufFn, ProcessScope, get_buffer,
    opaque::{Opaque, RealString},
    open_library,
    probe::{BufferScope, DECRYPT_SYMBOL, ENCRYPT_SYMBOL, OUT_BUF_SYMBOL, Probe},
};
use rstest::rstest;

#[rstest]
#[case(NON_EXISTENT)]
#[case("./target")]
#[case("./Cargo.toml")]
fn wrong_name_fails(#[case] path: &str) {
    init_logger();
    match open_library!(path).unwrap_err() {
        Error::NotFound {
            path: reported,
            msg,
        } => {
            assert_eq!(reported, path);
            assert!(!msg.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[case("Decrypt")]
#[case("_Z7DecryptP16REALstringStructS0_")]
#[case("getdecryptoutbuf")]
fn missing_symbol_fails(#[case] name: &str) {
    let lib = open_library!(FIXTURE).unwrap();
    match lib.address(name).unwrap_err() {
        Error::SymbolMissing {
            name: reported,
            msg,
        } => {
            assert_eq!(reported, name);
            assert!(msg.contains(name), "{msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[case(ENCRYPT_SYMBOL)]
#[case(DECRYPT_SYMBOL)]
#[case(OUT_BUF_SYMBOL)]
#[case("probe_fixture_calls")]
fn present_symbol_resolves(#[case] name: &str) {
    let lib = open_library!(FIXTURE, lazy: false).unwrap();
    let first = lib.address(name).unwrap();
    let again = lib.address(name).unwrap();
    assert_eq!(first, again);
}

#[test]
fn decrypt_then_read_buffer() {
    init_logger();
    let lib = LibraryHandle::open(FIXTURE).unwrap();
    let data = Opaque::<RealString>::from_addr(0x1337).unwrap();
    let password = Opaque::<RealString>::from_addr(0x1234).unwrap();
    unsafe {
        let decrypt = lib.resolve::<CipherFn>(DECRYPT_SYMBOL).unwrap();
        let ret = decrypt.invoke((data, password, 0));
        assert!(ret.is_null());

        let calls = lib.resolve::<CallsFn>("probe_fixture_calls").unwrap();
        assert!(calls.invoke(()) >= 1);

        let getter = lib.resolve::<OutBufFn>(OUT_BUF_SYMBOL).unwrap();
        let buf = get_buffer(&getter).unwrap();
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_bytes(), b"hello");
    }
}

static STUB: [u8; 5] = [0, 1, 2, 254, 255];

unsafe extern "C" fn stub_getter(len: *mut c_ulong) -> *const u8 {
    unsafe { *len = 5 };
    STUB.as_ptr()
}

#[test]
fn get_buffer_echoes_stub_bytes() {
    let raw = core::ptr::NonNull::new(stub_getter as OutBufFn as *mut ()).unwrap();
    let getter = unsafe { EntryPoint::<'static, OutBufFn>::from_raw(raw) };
    let buf = unsafe { get_buffer(&getter) }.unwrap();
    assert_eq!(buf.len(), 5);
    assert_eq!(buf.as_bytes(), &STUB);
    assert_eq!(buf.decimal().to_string(), "0 1 2 254 255 ");
}

#[test]
fn local_library_is_invisible_to_process_scope() {
    let lib = open_library!(FIXTURE).unwrap();
    assert!(lib.address("probe_fixture_calls").is_ok());
    assert!(matches!(
        ProcessScope::Global.address("probe_fixture_calls"),
        Err(Error::SymbolMissing { .. })
    ));
}

#[test]
fn release_once_then_fail() {
    let mut lib = open_library!(FIXTURE).unwrap();
    lib.address(DECRYPT_SYMBOL).unwrap();
    lib.close().unwrap();
    assert!(lib.is_released());
    assert!(matches!(lib.close(), Err(Error::Released { .. })));
    assert!(matches!(
        lib.address(DECRYPT_SYMBOL),
        Err(Error::Released { .. })
    ));
}

#[test]
fn no_delete_library_closes_and_reopens() {
    let mut lib = OpenOptions::new().no_delete(true).open(FIXTURE).unwrap();
    let before = lib.address(OUT_BUF_SYMBOL).unwrap();
    lib.close().unwrap();
    let again = open_library!(FIXTURE).unwrap();
    assert_eq!(again.address(OUT_BUF_SYMBOL).unwrap(), before);
}

#[test]
fn probe_reads_buffer_from_library_scope() {
    init_logger();
    let report = Probe::new(FIXTURE)
        .buffer_scope(BufferScope::Library)
        .run()
        .unwrap();
    assert_eq!(report.bytes(), b"hello");
    assert_eq!(report.to_string(), "104 101 108 108 111  ::  hello");
}

#[test]
fn probe_fails_fast_on_missing_symbol() {
    let err = Probe::new(FIXTURE)
        .buffer_scope(BufferScope::Library)
        .cipher_symbols(ENCRYPT_SYMBOL, "Decrypt")
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::SymbolMissing { ref name, .. } if name == "Decrypt"));
}

#[test]
fn probe_process_scope_misses_local_getter() {
    let err = Probe::new(FIXTURE).run().unwrap_err();
    assert!(matches!(err, Error::SymbolMissing { ref name, .. } if name == OUT_BUF_SYMBOL));
}

#[test]
fn exports_lists_mangled_entry_points() {
    let exports = dlprobe::exports::exports(FIXTURE).unwrap();
    let decrypt = exports
        .iter()
        .find(|export| export.name == DECRYPT_SYMBOL)
        .unwrap();
    assert_eq!(decrypt.kind, dlprobe::exports::ExportKind::Function);
    assert_eq!(
        decrypt.demangled.as_deref(),
        Some("Decrypt(REALstringStruct*, REALstringStruct*, long)")
    );
    assert!(exports.iter().any(|export| export.name == OUT_BUF_SYMBOL));
    assert!(!dlprobe::exports::similar(&exports, "Encrypt(").is_empty());
}
