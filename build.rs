//! Build script for `csg`.
//!
//! Embeds build metadata (timestamp, rustc version) into the binary for the
//! --version output.

use vergen_gix::{BuildBuilder, Emitter, RustcBuilder};

fn main() {
    let build = BuildBuilder::default().build_timestamp(true).build();
    let rustc = RustcBuilder::default().semver(true).build();

    let mut emitter = Emitter::default();
    if let Ok(b) = build {
        if let Err(e) = emitter.add_instructions(&b) {
            eprintln!("cargo:warning=vergen build instructions failed: {e}");
        }
    }
    if let Ok(r) = rustc {
        if let Err(e) = emitter.add_instructions(&r) {
            eprintln!("cargo:warning=vergen rustc instructions failed: {e}");
        }
    }
    if let Err(e) = emitter.emit() {
        eprintln!("cargo:warning=vergen emit failed: {e}");
    }
}
