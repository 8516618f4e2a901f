#![allow(dead_code)]

use core::ffi::{c_long, c_ulong};
use dlprobe::opaque::{Opaque, RealString};

/// The fixture library built by `build.rs`.
pub const FIXTURE: &str = env!("DLPROBE_FIXTURE");

pub const NON_EXISTENT: &str = "target/this_location_is_definitely_non existent:^~";

pub type CipherFn =
    unsafe extern "C" fn(Opaque<RealString>, Opaque<RealString>, c_long) -> *mut RealString;

pub type CallsFn = unsafe extern "C" fn() -> c_ulong;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
