#![forbid(unsafe_code)]

use std::env;
use std::process::Command;

/// Exposes the version of the compiler building this crate as
/// `TREBLLE_RUSTC_VERSION`, reported as the language version in payloads.
///
/// Falls back to the minimum supported Rust version when `rustc` cannot be
/// queried.
fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .and_then(|stdout| stdout.split_whitespace().nth(1).map(str::to_owned))
        .unwrap_or_else(|| env::var("CARGO_PKG_RUST_VERSION").unwrap_or_default());

    println!("cargo:rustc-env=TREBLLE_RUSTC_VERSION={version}");
}
