use std::env;
use std::path::PathBuf;
use type_wrapper_codegen::WrapperGenerator;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let mut codegen = WrapperGenerator::new();

    codegen.set_header(
        "Value wrappers for type-wrapper-example\n\
         Declared in wrappers.rs",
    );

    codegen
        .add_source_file(manifest_dir.join("wrappers.rs"))
        .expect("Failed to parse wrapper declarations");

    // Diagnostics are forwarded to Cargo; errors fail the build after this returns
    codegen
        .write_to_file(out_dir.join("wrappers.rs"))
        .expect("Failed to write wrappers");

    println!("cargo:rerun-if-changed=wrappers.rs");
    println!("cargo:rerun-if-changed=build.rs");
}
