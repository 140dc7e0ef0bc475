//! Descriptor types passed between the scanner, the validator and the emitter.

use crate::diagnostics::Location;
use bitflags::bitflags;

bitflags! {
    /// Optional adapters attached to a generated wrapper.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u8 {
        /// Transparent `serde` impls plus the string-key adapter.
        const JSON_CONVERTER = 1 << 0;
        /// `rkyv` derives on the wrapper's storage.
        const HOST_SERIALIZABLE = 1 << 1;
    }
}

impl Features {
    /// Map a flag name as written in a marker (`Feature::JsonConverter`) to its bit.
    ///
    /// `None` maps to the empty set. Unknown names return `None`.
    pub fn from_flag_name(name: &str) -> Option<Self> {
        match name {
            "None" => Some(Self::empty()),
            "JsonConverter" => Some(Self::JSON_CONVERTER),
            "HostSerializable" => Some(Self::HOST_SERIALIZABLE),
            _ => None,
        }
    }
}

/// A generic parameter of the wrapper declaration. Bounds are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericParam {
    /// `'a` (stored with the leading apostrophe)
    Lifetime(String),
    /// `T`
    Type(String),
    /// `const N: usize`
    Const { name: String, ty: String },
}

impl GenericParam {
    /// Name as used in argument position (`'a`, `T`, `N`).
    pub fn name(&self) -> &str {
        match self {
            GenericParam::Lifetime(name) | GenericParam::Type(name) => name,
            GenericParam::Const { name, .. } => name,
        }
    }

    /// Declaration form (`'a`, `T`, `const N: usize`).
    pub fn declaration(&self) -> String {
        match self {
            GenericParam::Lifetime(name) | GenericParam::Type(name) => name.clone(),
            GenericParam::Const { name, ty } => format!("const {name}: {ty}"),
        }
    }
}

/// What kind of item encloses a wrapper declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestorKind {
    /// An inline `mod name { .. }`. The generator can re-open it in its output.
    Module { visibility: String },
    /// A `fn` body. Items declared here have no path outside the function.
    Function,
    /// A `trait` definition; stubs reach it through default method bodies.
    Trait,
    /// The initializer block of a `const` or `static` item.
    Initializer,
}

/// One entry of a raw descriptor's ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub name: String,
    pub kind: AncestorKind,
}

impl Ancestor {
    pub fn module(name: impl Into<String>, visibility: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AncestorKind::Module {
                visibility: visibility.into(),
            },
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AncestorKind::Function,
        }
    }

    pub fn with_kind(name: impl Into<String>, kind: AncestorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Whether generated code can be placed inside this ancestor at the same path.
    pub fn is_extensible(&self) -> bool {
        matches!(self.kind, AncestorKind::Module { .. })
    }

    /// Human-readable identity used in diagnostics (`mod outer`, `fn build`).
    pub fn describe(&self) -> String {
        match self.kind {
            AncestorKind::Module { .. } => format!("mod `{}`", self.name),
            AncestorKind::Function => format!("fn `{}`", self.name),
            AncestorKind::Trait => format!("trait `{}`", self.name),
            AncestorKind::Initializer => format!("the initializer of `{}`", self.name),
        }
    }
}

/// A validated enclosing container, outermost first in [`WrapperDescriptor::enclosing_scopes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingScope {
    pub name: String,
    pub is_extensible: bool,
    pub visibility: String,
}

/// Scanner output for one marked declaration, before validation.
///
/// Raw descriptors can also be built by hand and handed to
/// [`WrapperGenerator::add_descriptor`](crate::WrapperGenerator::add_descriptor):
///
/// ```
/// use type_wrapper_codegen::{Features, RawDescriptor};
///
/// let raw = RawDescriptor::new("UserId", "String")
///     .readonly()
///     .with_features(Features::JSON_CONVERTER)
///     .in_namespace(["ids"]);
/// assert!(raw.wrapped_is_string);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDescriptor {
    pub type_name: String,
    pub visibility: String,
    pub wrapped_type: String,
    pub wrapped_is_string: bool,
    pub namespace_path: Vec<String>,
    /// Enclosing containers, innermost first (parent-walk order).
    pub ancestors: Vec<Ancestor>,
    pub generics: Vec<GenericParam>,
    pub readonly_requested: bool,
    pub features: Features,
    /// Feature names in the marker that did not map to a known flag.
    pub unknown_features: Vec<String>,
    /// The stub declared fields of its own.
    pub has_fields: bool,
    pub fragments: Vec<String>,
    pub has_create_hook: bool,
    pub location: Location,
}

impl RawDescriptor {
    /// Start a descriptor for `pub struct {type_name}` wrapping `wrapped_type`.
    pub fn new(type_name: impl Into<String>, wrapped_type: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let wrapped_type = wrapped_type.into();
        let wrapped_is_string = syn::parse_str::<syn::Type>(&wrapped_type)
            .map(|ty| crate::extractor::is_string_type(&ty))
            .unwrap_or(false);
        Self {
            location: Location::item(type_name.clone()),
            type_name,
            visibility: "pub".to_string(),
            wrapped_type,
            wrapped_is_string,
            namespace_path: Vec::new(),
            ancestors: Vec::new(),
            generics: Vec::new(),
            readonly_requested: false,
            features: Features::empty(),
            unknown_features: Vec::new(),
            has_fields: false,
            fragments: Vec::new(),
            has_create_hook: false,
        }
    }

    pub fn readonly(mut self) -> Self {
        self.readonly_requested = true;
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features |= features;
        self
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = visibility.into();
        self
    }

    pub fn in_namespace<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace_path = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Nest the declaration one level deeper. Call outermost first.
    pub fn inside(mut self, ancestor: Ancestor) -> Self {
        self.ancestors.insert(0, ancestor);
        self
    }

    pub fn with_generic(mut self, param: GenericParam) -> Self {
        self.generics.push(param);
        self
    }

    /// Attach a user-authored inherent impl block. If it defines `on_create`,
    /// the default no-op hook is not emitted.
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        if let Ok(item_impl) = syn::parse_str::<syn::ItemImpl>(&fragment) {
            self.has_create_hook |= crate::extractor::defines_create_hook(&item_impl);
        }
        self.fragments.push(fragment);
        self
    }
}

/// A fully resolved wrapper, ready for the emitter. Never mutated after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperDescriptor {
    pub type_name: String,
    pub visibility: String,
    pub wrapped_type: String,
    pub wrapped_is_string: bool,
    pub namespace_path: Vec<String>,
    pub enclosing_scopes: Vec<EnclosingScope>,
    pub generic_parameters: Vec<GenericParam>,
    pub readonly_requested: bool,
    pub features: Features,
    pub fragments: Vec<String>,
    pub has_create_hook: bool,
}

impl WrapperDescriptor {
    pub fn is_generic(&self) -> bool {
        !self.generic_parameters.is_empty()
    }

    pub fn has_json(&self) -> bool {
        self.features.contains(Features::JSON_CONVERTER)
    }

    pub fn is_host_serializable(&self) -> bool {
        self.features.contains(Features::HOST_SERIALIZABLE)
    }

    /// `<'a, T, const N: usize>`, or empty for non-generic wrappers.
    pub fn generics_declaration(&self) -> String {
        if self.generic_parameters.is_empty() {
            return String::new();
        }
        let params: Vec<_> = self
            .generic_parameters
            .iter()
            .map(GenericParam::declaration)
            .collect();
        format!("<{}>", params.join(", "))
    }

    /// `Name<'a, T, N>`
    pub fn self_type(&self) -> String {
        if self.generic_parameters.is_empty() {
            return self.type_name.clone();
        }
        let params: Vec<_> = self.generic_parameters.iter().map(GenericParam::name).collect();
        format!("{}<{}>", self.type_name, params.join(", "))
    }

    /// Fully qualified path of the wrapper (`outer::inner::Name`).
    pub fn qualified_name(&self) -> String {
        self.namespace_path
            .iter()
            .map(String::as_str)
            .chain(self.enclosing_scopes.iter().map(|s| s.name.as_str()))
            .chain(std::iter::once(self.type_name.as_str()))
            .collect::<Vec<_>>()
            .join("::")
    }
}
