//! Example crate demonstrating type-wrapper-codegen usage.
//!
//! The wrappers are declared in `wrappers.rs` next to this crate's manifest.
//! `build.rs` runs `WrapperGenerator` over that file and the result is
//! included below.

pub mod fixtures;

include!(concat!(env!("OUT_DIR"), "/wrappers.rs"));
