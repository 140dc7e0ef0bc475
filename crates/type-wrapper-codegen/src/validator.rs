//! Descriptor validator
//!
//! Turns a [`RawDescriptor`] into a [`WrapperDescriptor`], or rejects it.
//! Problems are pushed to a [`DiagnosticSink`]; a rejected descriptor never
//! affects any other descriptor.

use crate::descriptor::{AncestorKind, EnclosingScope, Features, RawDescriptor, WrapperDescriptor};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};

/// Validate one raw descriptor.
///
/// Returns `None` when an error-severity diagnostic was reported. Warnings do
/// not block generation.
pub fn validate(raw: &RawDescriptor, sink: &mut dyn DiagnosticSink) -> Option<WrapperDescriptor> {
    // Ancestors arrive innermost first
    if let Some(blocker) = raw.ancestors.iter().find(|a| !a.is_extensible()) {
        sink.report(Diagnostic::new(
            DiagnosticCode::EnclosingScopeNotExtensible,
            format!(
                "`{}` is declared inside {}, which generated code cannot extend; \
                 move the declaration into a module",
                raw.type_name,
                blocker.describe()
            ),
            raw.location.clone(),
        ));
        return None;
    }
    if raw.has_fields {
        sink.report(Diagnostic::new(
            DiagnosticCode::NonEmptyStub,
            format!(
                "`{}` declares fields; a wrapper stub must be a unit or empty struct",
                raw.type_name
            ),
            raw.location.clone(),
        ));
        return None;
    }

    let enclosing_scopes: Vec<EnclosingScope> = raw
        .ancestors
        .iter()
        .rev()
        .map(|ancestor| EnclosingScope {
            name: ancestor.name.clone(),
            is_extensible: ancestor.is_extensible(),
            visibility: match &ancestor.kind {
                AncestorKind::Module { visibility } => visibility.clone(),
                _ => String::new(),
            },
        })
        .collect();

    validate_policy(raw, sink);

    for name in &raw.unknown_features {
        sink.report(Diagnostic::new(
            DiagnosticCode::UnknownFeature,
            format!(
                "unknown feature `{name}` on `{}` is ignored (expected `JsonConverter` or `HostSerializable`)",
                raw.type_name
            ),
            raw.location.clone(),
        ));
    }

    Some(WrapperDescriptor {
        type_name: raw.type_name.clone(),
        visibility: raw.visibility.clone(),
        wrapped_type: raw.wrapped_type.clone(),
        wrapped_is_string: raw.wrapped_is_string,
        namespace_path: raw.namespace_path.clone(),
        enclosing_scopes,
        generic_parameters: raw.generics.clone(),
        readonly_requested: raw.readonly_requested,
        features: raw.features,
        fragments: raw.fragments.clone(),
        has_create_hook: raw.has_create_hook,
    })
}

/// Readonly/serializable policy. Advisory only.
fn validate_policy(raw: &RawDescriptor, sink: &mut dyn DiagnosticSink) {
    let serializable = raw.features.contains(Features::HOST_SERIALIZABLE);
    if !raw.readonly_requested && !serializable {
        sink.report(Diagnostic::new(
            DiagnosticCode::MissingReadOnly,
            format!("`{}` should be declared #[readonly]", raw.type_name),
            raw.location.clone(),
        ));
    }
    if raw.readonly_requested && serializable {
        sink.report(Diagnostic::new(
            DiagnosticCode::UnexpectedReadOnly,
            format!(
                "`{}` cannot be #[readonly] if it is also HostSerializable",
                raw.type_name
            ),
            raw.location.clone(),
        ));
    }
}
