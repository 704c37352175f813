use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());

    // link.x is only meaningful for bare-metal ARM, but it is harmless to
    // stage it for host builds too.
    fs::write(out.join("link.x"), include_bytes!("link.x")).unwrap();

    // link.x always includes device.x. with the `device` feature a device
    // crate puts the real one on the search path, otherwise an empty one
    // stands in so core-only builds still link.
    if env::var_os("CARGO_FEATURE_DEVICE").is_none() {
        fs::write(out.join("device.x"), "").unwrap();
    }

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=link.x");
    println!("cargo:rerun-if-changed=build.rs");
}
