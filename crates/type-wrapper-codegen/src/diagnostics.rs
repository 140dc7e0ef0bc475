//! Diagnostics reported by the validator.
//!
//! A [`Diagnostic`] is pushed into a [`DiagnosticSink`]. The generator collects
//! them per descriptor and forwards them to the host, which for a build script
//! is Cargo itself (see [`CargoSink`]).

use std::fmt;
use std::path::PathBuf;

/// Whether a diagnostic blocks generation of its wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Advisory. The wrapper is still generated.
    Warning,
    /// The wrapper is not generated. Other wrappers are unaffected.
    Error,
}

/// Every diagnostic the generator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Neither `#[readonly]` nor `HostSerializable` was requested.
    MissingReadOnly,
    /// `#[readonly]` combined with `HostSerializable`.
    UnexpectedReadOnly,
    /// A container around the declaration cannot be re-opened by generated code.
    EnclosingScopeNotExtensible,
    /// A feature flag name that is not recognised.
    UnknownFeature,
    /// The stub declares fields that the wrapper would drop.
    NonEmptyStub,
    /// The marker's first argument is not a type. Only reported when enabled.
    MalformedMarker,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::MissingReadOnly => "MissingReadOnly",
            DiagnosticCode::UnexpectedReadOnly => "UnexpectedReadOnly",
            DiagnosticCode::EnclosingScopeNotExtensible => "EnclosingScopeNotExtensible",
            DiagnosticCode::UnknownFeature => "UnknownFeature",
            DiagnosticCode::NonEmptyStub => "NonEmptyStub",
            DiagnosticCode::MalformedMarker => "MalformedMarker",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::EnclosingScopeNotExtensible | DiagnosticCode::NonEmptyStub => {
                Severity::Error
            }
            DiagnosticCode::MissingReadOnly
            | DiagnosticCode::UnexpectedReadOnly
            | DiagnosticCode::UnknownFeature
            | DiagnosticCode::MalformedMarker => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the offending declaration lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Source file, when the declaration came from one.
    pub file: Option<PathBuf>,
    /// 1-based line, 0 when unknown.
    pub line: usize,
    /// 1-based column, 0 when unknown.
    pub column: usize,
    /// Qualified name of the declaration (`outer::inner::Name`).
    pub item: String,
}

impl Location {
    /// A location that only knows the declaration's name.
    pub fn item(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) if self.line > 0 => {
                write!(f, "{}:{}:{}", file.display(), self.line, self.column)
            }
            Some(file) => write!(f, "{}", file.display()),
            None => write!(f, "`{}`", self.item),
        }
    }
}

/// A single problem found while processing one wrapper declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    /// Build a diagnostic with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}[{}]: {}", self.location, tag, self.code, self.message)
    }
}

/// Receives diagnostics as they are produced.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards diagnostics to Cargo from inside a build script.
///
/// Warnings become `cargo::warning=` lines. Errors become `cargo::error=` lines,
/// which make Cargo fail the build once the script has finished, so every
/// unaffected wrapper is still written first.
#[derive(Debug, Default, Clone, Copy)]
pub struct CargoSink;

impl DiagnosticSink for CargoSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        let directive = match diagnostic.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        // Cargo reads one directive per line
        let text = diagnostic.to_string().replace('\n', " ");
        println!("cargo::{directive}=type-wrapper-codegen: {text}");
    }
}
