//! # type-wrapper-codegen
//!
//! Build-time generator for single-field value wrappers ("newtypes"). You write
//! a one-line stub, the generator writes storage, construction, equality,
//! hashing, a debug form and optional `serde`/`rkyv` adapters.
//!
//! ## Features
//!
//! - Stubs are plain Rust in a declaration file that is parsed, never compiled
//! - Module nesting, visibility and generic parameters carry over to the output
//! - `use` import resolution: payload types are rewritten to fully-qualified paths
//! - Transparent JSON support plus a map-key adapter (`Display`/`FromStr`)
//! - `rkyv` derives for wrappers that need host serialization
//! - Problems are reported per declaration through Cargo, without stopping
//!   unaffected wrappers from being generated
//!
//! ## Declaring wrappers
//!
//! ```rust,ignore
//! // wrappers.rs (not part of the module tree)
//! use crate::fixtures::RefType;
//!
//! #[type_wrapper(i32)]
//! #[readonly]
//! pub struct WrappedInt;
//!
//! #[type_wrapper(String, Feature::JsonConverter)]
//! #[readonly]
//! pub struct WrappedJsonString;
//!
//! #[type_wrapper(RefType, Feature::HostSerializable)]
//! pub struct StoredRef;
//!
//! pub mod ids {
//!     #[type_wrapper(String)]
//!     #[readonly]
//!     pub struct Email;
//!
//!     // carried into the output; replaces the default no-op hook
//!     impl Email {
//!         fn on_create(value: &mut String) {
//!             value.make_ascii_lowercase();
//!         }
//!     }
//! }
//! ```
//!
//! The marker also matches `#[type_wrapper_codegen::type_wrapper(..)]` and
//! aliases created with `use type_wrapper_codegen::type_wrapper as name`.
//! Feature flags are `Feature::JsonConverter`, `Feature::HostSerializable` and
//! `Feature::None`, combined with `|`.
//!
//! Then in `build.rs`:
//!
//! ```no_run
//! use type_wrapper_codegen::WrapperGenerator;
//!
//! fn main() -> Result<(), type_wrapper_codegen::CodegenError> {
//!     let out_dir = std::env::var("OUT_DIR").unwrap();
//!
//!     WrapperGenerator::new()
//!         .add_source_file("wrappers.rs")?
//!         .write_to_file(format!("{out_dir}/wrappers.rs"))?;
//!
//!     println!("cargo:rerun-if-changed=wrappers.rs");
//!     Ok(())
//! }
//! ```
//!
//! And at the crate root:
//!
//! ```rust,ignore
//! include!(concat!(env!("OUT_DIR"), "/wrappers.rs"));
//! ```
//!
//! ## Payload requirements
//!
//! | Wrapper feature | Payload must implement |
//! |-----------------|------------------------|
//! | always | `Clone`, `Eq`, `Hash`, `Debug` |
//! | `JsonConverter` | `serde::Serialize`, `serde::de::DeserializeOwned` |
//! | `HostSerializable` | `rkyv::Archive`, `rkyv::Serialize`, `rkyv::Deserialize` |
//!
//! The crate that includes the output depends on `serde` and `serde_json`
//! (for `JsonConverter`) and `rkyv` (for `HostSerializable`).
//!
//! ## Diagnostics
//!
//! | Code | Severity | Cause |
//! |------|----------|-------|
//! | `MissingReadOnly` | warning | neither `#[readonly]` nor `HostSerializable` |
//! | `UnexpectedReadOnly` | warning | `#[readonly]` together with `HostSerializable` |
//! | `UnknownFeature` | warning | unrecognised feature flag |
//! | `MalformedMarker` | warning | first argument is not a type (opt-in) |
//! | `EnclosingScopeNotExtensible` | error | stub declared inside a `fn`, trait or `const`/`static` body |
//! | `NonEmptyStub` | error | stub declares fields |

mod descriptor;
mod diagnostics;
mod emitter;
mod error;
mod extractor;
mod generator;
mod validator;

pub use descriptor::{
    Ancestor, AncestorKind, EnclosingScope, Features, GenericParam, RawDescriptor,
    WrapperDescriptor,
};
pub use diagnostics::{CargoSink, Diagnostic, DiagnosticCode, DiagnosticSink, Location, Severity};
pub use emitter::{GeneratedUnit, ModuleSegment, UNIT_SUFFIX, render};
pub use error::{CodegenError, Result};
pub use generator::{Cancellation, GeneratorOutput, WrapperGenerator};
pub use validator::validate;
