use std::{
    env,
    path::{Path, PathBuf},
    process::Command,
};

const FIXTURE_SOURCE: &str = "../../test-dylib/probe_fixture.rs";
const FIXTURE_NAME: &str = "probe_fixture";

fn fixture_file_name() -> String {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let suffix = if target_os == "macos" || target_os == "ios" {
        "dylib"
    } else {
        "so"
    };
    format!("lib{FIXTURE_NAME}.{suffix}")
}

fn compile_fixture(out_dir: &Path) {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_owned());
    let target = env::var("TARGET").unwrap();
    let status = Command::new(rustc)
        .args(["-O", "--edition", "2024", "--target", &target])
        .args(["-C", "panic=abort"])
        .arg(FIXTURE_SOURCE)
        .arg("--out-dir")
        .arg(out_dir)
        .status()
        .expect("could not compile the cipher fixture!");
    assert!(status.success());
}

fn main() {
    println!("cargo:rerun-if-changed={FIXTURE_SOURCE}");
    println!("cargo:rerun-if-changed=build.rs");
    if env::var("CARGO_CFG_UNIX").is_err() {
        return;
    }
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    compile_fixture(&out_dir);
    println!(
        "cargo:rustc-env=DECRYPT_PROBE_FIXTURE={}",
        out_dir.join(fixture_file_name()).display()
    );
}
