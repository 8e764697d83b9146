//! Build script for postmortem-core
//!
//! Checks the toolchain before compilation. The crate uses `let ... else`
//! and `Option::is_some_and`, which need Rust 1.70.0 or newer.

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    let min_rust_version = rustc_version::Version::new(1, 70, 0);
    match rustc_version::version() {
        Ok(rustc_version) if rustc_version < min_rust_version => {
            panic!("postmortem-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
        Ok(_) => {}
        // Some build environments hide rustc; warn instead of failing
        Err(_) => println!("cargo:warning=could not verify Rust version"),
    }
}
