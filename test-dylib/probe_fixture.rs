#![no_std]
#![crate_type = "cdylib"]
#![crate_name = "probe_fixture"]

use core::ffi::{c_long, c_ulong, c_void};
use core::panic::PanicInfo;
use core::ptr::{addr_of, addr_of_mut, null_mut};

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    loop {}
}

const PLAINTEXT: &[u8] = b"hello";
const CIPHERTEXT: &[u8] = b"olleh";

static mut OUT_BUF: [u8; 16] = [0; 16];
static mut OUT_LEN: c_ulong = 0;
static mut CALLS: c_ulong = 0;

unsafe fn store(bytes: &[u8]) {
    unsafe {
        let out = &mut *addr_of_mut!(OUT_BUF);
        out[..bytes.len()].copy_from_slice(bytes);
        OUT_LEN = bytes.len() as c_ulong;
        CALLS += 1;
    }
}

#[unsafe(export_name = "_Z7EncryptP16REALstringStructS0_l")]
pub extern "C" fn encrypt(data: *mut c_void, password: *mut c_void, _offset: c_long) -> *mut c_void {
    if !data.is_null() && !password.is_null() {
        unsafe { store(CIPHERTEXT) };
    }
    null_mut()
}

#[unsafe(export_name = "_Z7DecryptP16REALstringStructS0_l")]
pub extern "C" fn decrypt(data: *mut c_void, password: *mut c_void, _offset: c_long) -> *mut c_void {
    if !data.is_null() && !password.is_null() {
        unsafe { store(PLAINTEXT) };
    }
    null_mut()
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn GetDecryptOutBuf(length: *mut c_ulong) -> *const u8 {
    unsafe {
        *length = OUT_LEN;
        addr_of!(OUT_BUF).cast()
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn probe_fixture_calls() -> c_ulong {
    unsafe { CALLS }
}
