//! Wrapper generator: collects declarations and writes the generated source.

use crate::descriptor::RawDescriptor;
use crate::diagnostics::{CargoSink, Diagnostic, DiagnosticSink};
use crate::emitter::{self, GeneratedUnit, ModuleSegment, indent, module_header};
use crate::error::{CodegenError, Result};
use crate::validator;
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag a host can set to abandon a run.
///
/// Clones observe the same flag. A cancelled run returns
/// [`CodegenError::Cancelled`] and produces no output at all.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CodegenError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of a generator run.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    /// One unit per valid declaration, in scan order.
    pub units: Vec<GeneratedUnit>,
    /// Every diagnostic produced, in scan order.
    pub diagnostics: Vec<Diagnostic>,
}

impl GeneratorOutput {
    /// Whether any declaration was rejected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Forward every diagnostic to `sink`.
    pub fn report(&self, sink: &mut dyn DiagnosticSink) {
        for diagnostic in &self.diagnostics {
            sink.report(diagnostic.clone());
        }
    }

    /// Assemble all units into one source file.
    ///
    /// Units that share modules are merged into a single module tree, since a
    /// Rust module cannot be declared twice.
    pub fn to_source(&self, header: Option<&str>) -> String {
        let mut output = String::new();

        if let Some(header) = header {
            for line in header.lines() {
                output.push_str("// ");
                output.push_str(line);
                output.push('\n');
            }
            output.push('\n');
        } else {
            output.push_str("// Auto-generated by type-wrapper-codegen\n");
            output.push_str("// DO NOT EDIT MANUALLY\n\n");
        }

        let mut root = ModuleNode::default();
        for unit in &self.units {
            let node = unit
                .module_path
                .iter()
                .fold(&mut root, |node, segment| node.child(segment));
            node.items.push(&unit.code);
        }
        root.render(&mut output, 0);

        output.trim_end().to_string() + "\n"
    }
}

/// Generated items grouped by module.
#[derive(Default)]
struct ModuleNode<'a> {
    items: Vec<&'a str>,
    children: Vec<(ModuleSegment, ModuleNode<'a>)>,
}

impl<'a> ModuleNode<'a> {
    /// The child module for `segment`. The first visibility seen for a module wins.
    fn child(&mut self, segment: &ModuleSegment) -> &mut ModuleNode<'a> {
        let index = match self.children.iter().position(|(s, _)| s.name == segment.name) {
            Some(index) => index,
            None => {
                self.children.push((segment.clone(), ModuleNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    fn render(&self, output: &mut String, depth: usize) {
        for item in &self.items {
            output.push_str(&indent(item, depth));
            output.push('\n');
        }
        for (segment, child) in &self.children {
            output.push_str(&indent(&module_header(segment), depth));
            child.render(output, depth + 1);
            // drop the blank line left after the last item
            if output.ends_with("\n\n") {
                output.pop();
            }
            output.push_str(&indent("}", depth));
            output.push('\n');
        }
    }
}

/// Generator that turns `#[type_wrapper(..)]` declarations into Rust source.
///
/// Declarations are added with the `add_source_*` methods or
/// [`add_descriptor`](WrapperGenerator::add_descriptor); nothing is validated
/// or rendered until [`run`](WrapperGenerator::run) or one of the `write_*`
/// methods is called.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), type_wrapper_codegen::CodegenError> {
/// use type_wrapper_codegen::WrapperGenerator;
///
/// let mut generator = WrapperGenerator::new();
/// generator.add_source_str(
///     r#"
///     #[type_wrapper(u64)]
///     #[readonly]
///     pub struct UserId;
///     "#,
/// )?;
///
/// let code = generator.generate()?;
/// assert!(code.contains("pub struct UserId {"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct WrapperGenerator {
    /// Scanned declarations, in scan order.
    pub(crate) candidates: Vec<RawDescriptor>,

    /// Malformed markers found while scanning (only when reporting is enabled).
    pub(crate) malformed: Vec<Diagnostic>,

    /// Custom header comment
    header: Option<String>,

    pub(crate) report_malformed: bool,

    pub(crate) cancellation: Cancellation,
}

impl WrapperGenerator {
    /// Create an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom header comment for the generated file.
    pub fn set_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.header = Some(header.into());
        self
    }

    /// Report markers whose first argument is not a type as `MalformedMarker`
    /// warnings instead of skipping them silently.
    ///
    /// Applies to sources added after this call.
    pub fn report_malformed_markers(&mut self, enabled: bool) -> &mut Self {
        self.report_malformed = enabled;
        self
    }

    /// Use `cancellation` to abandon scanning and generation from another thread.
    pub fn set_cancellation(&mut self, cancellation: Cancellation) -> &mut Self {
        self.cancellation = cancellation;
        self
    }

    /// The cancellation flag checked by this generator.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Add a descriptor built by hand instead of scanned from source.
    ///
    /// ```
    /// # fn main() -> Result<(), type_wrapper_codegen::CodegenError> {
    /// use type_wrapper_codegen::{Features, RawDescriptor, WrapperGenerator};
    ///
    /// let mut generator = WrapperGenerator::new();
    /// generator.add_descriptor(
    ///     RawDescriptor::new("OrderId", "u64")
    ///         .readonly()
    ///         .with_features(Features::JSON_CONVERTER),
    /// );
    /// let code = generator.generate()?;
    /// assert!(code.contains("impl ::serde::Serialize for OrderId {"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_descriptor(&mut self, raw: RawDescriptor) -> &mut Self {
        self.candidates.push(raw);
        self
    }

    /// Validate and render every declaration.
    ///
    /// Declarations are processed in parallel; units and diagnostics keep the
    /// order the declarations were added in.
    pub fn run(&self) -> Result<GeneratorOutput> {
        self.cancellation.check()?;

        let results = self
            .candidates
            .par_iter()
            .map(|raw| {
                self.cancellation.check()?;
                let mut diagnostics: Vec<Diagnostic> = Vec::new();
                let unit = validator::validate(raw, &mut diagnostics).map(|d| emitter::render(&d));
                if unit.is_none() {
                    log::debug!("skipping {}: rejected by validation", raw.location);
                }
                Ok::<_, CodegenError>((unit, diagnostics))
            })
            .collect::<Result<Vec<_>>>()?;

        // a cancel that raced the last descriptor still discards everything
        self.cancellation.check()?;

        let mut output = GeneratorOutput {
            units: Vec::with_capacity(results.len()),
            diagnostics: self.malformed.clone(),
        };
        for (unit, diagnostics) in results {
            output.units.extend(unit);
            output.diagnostics.extend(diagnostics);
        }

        log::debug!(
            "generated {} wrapper(s) from {} declaration(s) with {} diagnostic(s)",
            output.units.len(),
            self.candidates.len(),
            output.diagnostics.len()
        );
        Ok(output)
    }

    /// Generate the assembled source for all valid declarations.
    ///
    /// Diagnostics are not reported; use [`run`](Self::run) or
    /// [`report`](Self::report) to see them.
    pub fn generate(&self) -> Result<String> {
        let output = self.run()?;
        Ok(output.to_source(self.header.as_deref()))
    }

    /// Forward all diagnostics to `sink`.
    pub fn report(&self, sink: &mut dyn DiagnosticSink) -> Result<()> {
        self.run()?.report(sink);
        Ok(())
    }

    /// Write the assembled source to a file and report diagnostics to Cargo.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let output = self.run()?;
        fs::write(path, output.to_source(self.header.as_deref()))?;
        output.report(&mut CargoSink);
        Ok(())
    }

    /// Write the assembled source to a writer and report diagnostics to Cargo.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let output = self.run()?;
        writer.write_all(output.to_source(self.header.as_deref()).as_bytes())?;
        output.report(&mut CargoSink);
        Ok(())
    }

    /// Write one file per unit, `<dir>/<module path>/<TypeName>.generated.rs`,
    /// and report diagnostics to Cargo.
    ///
    /// Each file holds only the wrapper's items; the directory layout mirrors
    /// the modules they belong in.
    pub fn write_units_to_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let output = self.run()?;
        let header = GeneratorOutput::default().to_source(self.header.as_deref());
        for unit in &output.units {
            let mut path = dir.as_ref().to_path_buf();
            path.extend(unit.module_path.iter().map(|segment| segment.name.as_str()));
            fs::create_dir_all(&path)?;
            path.push(format!("{}.rs", unit.name));
            fs::write(&path, format!("{header}\n{}", unit.code))?;
        }
        output.report(&mut CargoSink);
        Ok(())
    }
}
