//! Rust source emitter for validated wrapper descriptors.
//!
//! Every impl refers to library items through absolute paths (`::core::..`,
//! `::serde::..`) and uses reserved generic names (`__H`, `__S`, `__D`,
//! `'__de`), so the output never depends on what is in scope at the include
//! site.

use crate::descriptor::{GenericParam, WrapperDescriptor};

/// Output file name suffix of a generated unit.
pub const UNIT_SUFFIX: &str = ".generated";

/// One module the generated code must be placed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSegment {
    pub name: String,
    pub visibility: String,
}

/// Generated source for one wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// `{TypeName}.generated`
    pub name: String,
    /// Modules enclosing `code`, outermost first.
    pub module_path: Vec<ModuleSegment>,
    /// The wrapper's items, without the enclosing modules.
    pub code: String,
}

impl GeneratedUnit {
    /// The unit as standalone source, wrapped in its modules.
    pub fn source(&self) -> String {
        self.module_path
            .iter()
            .rev()
            .fold(self.code.clone(), |body, segment| wrap_module(segment, &body))
    }
}

/// Indent every non-empty line of `text` by `depth` levels of four spaces.
pub(crate) fn indent(text: &str, depth: usize) -> String {
    let pad = "    ".repeat(depth);
    let mut output = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.is_empty() {
            output.push_str(&pad);
            output.push_str(line);
        }
        output.push('\n');
    }
    output
}

fn visibility_prefix(visibility: &str) -> String {
    if visibility.is_empty() {
        String::new()
    } else {
        format!("{visibility} ")
    }
}

pub(crate) fn module_header(segment: &ModuleSegment) -> String {
    format!(
        "{}mod {} {{\n",
        visibility_prefix(&segment.visibility),
        segment.name
    )
}

fn wrap_module(segment: &ModuleSegment, body: &str) -> String {
    let mut output = module_header(segment);
    output.push_str(&indent(body, 1));
    output.push_str("}\n");
    output
}

/// Precomputed names shared by every impl of one wrapper.
struct Target<'a> {
    descriptor: &'a WrapperDescriptor,
    /// `<'a, T>` or empty
    generics: String,
    /// `Name<'a, T>`
    self_ty: String,
    /// `pub ` or empty
    vis: String,
    wrapped: &'a str,
    has_marker: bool,
}

impl<'a> Target<'a> {
    fn new(descriptor: &'a WrapperDescriptor) -> Self {
        let has_marker = descriptor
            .generic_parameters
            .iter()
            .any(|p| !matches!(p, GenericParam::Const { .. }));
        Self {
            descriptor,
            generics: descriptor.generics_declaration(),
            self_ty: descriptor.self_type(),
            vis: visibility_prefix(&descriptor.visibility),
            wrapped: &descriptor.wrapped_type,
            has_marker,
        }
    }

    /// `<'__de, 'a, T>`: an extra leading lifetime in front of the declared ones.
    fn generics_with_lifetime(&self, lifetime: &str) -> String {
        let mut params = vec![lifetime.to_string()];
        params.extend(
            self.descriptor
                .generic_parameters
                .iter()
                .map(GenericParam::declaration),
        );
        format!("<{}>", params.join(", "))
    }

    /// Opening line of an impl block. Generic wrappers get a `where W: bounds`
    /// clause since their payload may mention the parameters.
    fn impl_open(&self, head: &str, bounds: &str) -> String {
        if self.descriptor.is_generic() {
            format!("{head}\nwhere\n    {}: {bounds},\n{{\n", self.wrapped)
        } else {
            format!("{head} {{\n")
        }
    }

    /// `PhantomData` over every type and lifetime parameter.
    fn marker_type(&self) -> String {
        let mut elems = Vec::new();
        let types: Vec<_> = self
            .descriptor
            .generic_parameters
            .iter()
            .filter_map(|p| match p {
                GenericParam::Type(name) => Some(format!("{name},")),
                _ => None,
            })
            .collect();
        if !types.is_empty() {
            elems.push(format!("fn() -> ({})", types.join(" ")));
        }
        for param in &self.descriptor.generic_parameters {
            if let GenericParam::Lifetime(name) = param {
                elems.push(format!("&{name} ()"));
            }
        }
        format!("::core::marker::PhantomData<({},)>", elems.join(", "))
    }

    /// Struct literal holding `value`.
    fn construct(&self, value: &str) -> String {
        let field = if value == "value" {
            "value".to_string()
        } else {
            format!("value: {value}")
        };
        if self.has_marker {
            format!("Self {{ {field}, _marker: ::core::marker::PhantomData }}")
        } else {
            format!("Self {{ {field} }}")
        }
    }

    fn name(&self) -> &str {
        &self.descriptor.type_name
    }

    fn storage(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("/// Value wrapper around `{}`.\n", self.wrapped));
        if self.descriptor.is_host_serializable() {
            output.push_str("#[derive(::rkyv::Archive, ::rkyv::Serialize, ::rkyv::Deserialize)]\n");
        }
        output.push_str(&format!(
            "{}struct {}{} {{\n",
            self.vis,
            self.name(),
            self.generics
        ));
        output.push_str(&format!("    value: {},\n", self.wrapped));
        if self.has_marker {
            output.push_str(&format!("    _marker: {},\n", self.marker_type()));
        }
        output.push_str("}\n");
        output
    }

    fn inherent_impl(&self) -> String {
        let vis = &self.vis;
        let wrapped = self.wrapped;
        let mut output = String::new();
        output.push_str("#[allow(dead_code)]\n");
        output.push_str(&format!("impl{} {} {{\n", self.generics, self.self_ty));

        output.push_str("    /// Wrap `value`, passing it through `on_create` first.\n");
        output.push_str(&format!("    {vis}fn new(mut value: {wrapped}) -> Self {{\n"));
        output.push_str("        Self::on_create(&mut value);\n");
        output.push_str(&format!("        {}\n", self.construct("value")));
        output.push_str("    }\n\n");

        if !self.descriptor.has_create_hook {
            output.push_str("    #[inline]\n");
            output.push_str(&format!("    fn on_create(_value: &mut {wrapped}) {{}}\n\n"));
        }

        output.push_str(&format!("    {vis}fn value(&self) -> &{wrapped} {{\n"));
        output.push_str("        &self.value\n");
        output.push_str("    }\n\n");

        output.push_str(&format!("    {vis}fn into_inner(self) -> {wrapped} {{\n"));
        output.push_str("        self.value\n");
        output.push_str("    }\n\n");

        if !self.descriptor.readonly_requested {
            output.push_str(&format!("    {vis}fn value_mut(&mut self) -> &mut {wrapped} {{\n"));
            output.push_str("        &mut self.value\n");
            output.push_str("    }\n\n");
        }

        output.push_str("    /// `true` only if `other` is this same wrapper type holding an equal value.\n");
        output.push_str(&format!(
            "    {vis}fn equals_any(&self, other: &dyn ::core::any::Any) -> bool\n"
        ));
        output.push_str("    where\n");
        output.push_str("        Self: 'static,\n");
        if self.descriptor.is_generic() {
            output.push_str(&format!("        {wrapped}: ::core::cmp::PartialEq,\n"));
        }
        output.push_str("    {\n");
        output.push_str("        other\n");
        output.push_str("            .downcast_ref::<Self>()\n");
        output.push_str(
            "            .is_some_and(|other| ::core::cmp::PartialEq::eq(&self.value, &other.value))\n",
        );
        output.push_str("    }\n");
        output.push_str("}\n");
        output
    }

    fn trait_impls(&self) -> String {
        let generics = &self.generics;
        let self_ty = &self.self_ty;
        let wrapped = self.wrapped;
        let mut output = String::new();

        // Clone
        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::clone::Clone for {self_ty}"),
            "::core::clone::Clone",
        ));
        output.push_str("    fn clone(&self) -> Self {\n");
        output.push_str(&format!(
            "        {}\n",
            self.construct("::core::clone::Clone::clone(&self.value)")
        ));
        output.push_str("    }\n");
        output.push_str("}\n\n");

        // Equality
        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::cmp::PartialEq for {self_ty}"),
            "::core::cmp::PartialEq",
        ));
        output.push_str("    fn eq(&self, other: &Self) -> bool {\n");
        output.push_str("        ::core::cmp::PartialEq::eq(&self.value, &other.value)\n");
        output.push_str("    }\n");
        output.push_str("}\n\n");
        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::cmp::Eq for {self_ty}"),
            "::core::cmp::Eq",
        ));
        output.push_str("}\n\n");

        // Hash
        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::hash::Hash for {self_ty}"),
            "::core::hash::Hash",
        ));
        output.push_str("    fn hash<__H: ::core::hash::Hasher>(&self, state: &mut __H) {\n");
        output.push_str("        ::core::hash::Hash::hash(&self.value, state)\n");
        output.push_str("    }\n");
        output.push_str("}\n\n");

        // Debug
        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::fmt::Debug for {self_ty}"),
            "::core::fmt::Debug",
        ));
        output.push_str(
            "    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {\n",
        );
        output.push_str(&format!(
            "        ::core::write!(f, \"[{}({{:?}})]\", self.value)\n",
            self.name()
        ));
        output.push_str("    }\n");
        output.push_str("}\n\n");

        // Conversion
        output.push_str(&format!(
            "impl{generics} ::core::convert::From<{wrapped}> for {self_ty} {{\n"
        ));
        output.push_str(&format!("    fn from(value: {wrapped}) -> Self {{\n"));
        output.push_str("        Self::new(value)\n");
        output.push_str("    }\n");
        output.push_str("}\n");
        output
    }

    fn json_impls(&self) -> String {
        let generics = &self.generics;
        let self_ty = &self.self_ty;
        let wrapped = self.wrapped;
        let mut output = String::new();

        output.push_str(&self.impl_open(
            &format!("impl{generics} ::serde::Serialize for {self_ty}"),
            "::serde::Serialize",
        ));
        output.push_str(
            "    fn serialize<__S>(&self, serializer: __S) -> ::core::result::Result<__S::Ok, __S::Error>\n",
        );
        output.push_str("    where\n");
        output.push_str("        __S: ::serde::Serializer,\n");
        output.push_str("    {\n");
        output.push_str("        ::serde::Serialize::serialize(&self.value, serializer)\n");
        output.push_str("    }\n");
        output.push_str("}\n\n");

        output.push_str(&self.impl_open(
            &format!(
                "impl{} ::serde::Deserialize<'__de> for {self_ty}",
                self.generics_with_lifetime("'__de")
            ),
            "::serde::Deserialize<'__de>",
        ));
        output.push_str(
            "    fn deserialize<__D>(deserializer: __D) -> ::core::result::Result<Self, __D::Error>\n",
        );
        output.push_str("    where\n");
        output.push_str("        __D: ::serde::Deserializer<'__de>,\n");
        output.push_str("    {\n");
        output.push_str(&format!(
            "        <{wrapped} as ::serde::Deserialize<'__de>>::deserialize(deserializer).map(Self::new)\n"
        ));
        output.push_str("    }\n");
        output.push_str("}\n");
        output
    }

    /// Map-key adapter. `String` payloads are used as keys verbatim; anything
    /// else is keyed by its JSON text, quotes included, so distinct values
    /// never share a key.
    fn key_impls(&self) -> String {
        let vis = &self.vis;
        let generics = &self.generics;
        let self_ty = &self.self_ty;
        let wrapped = self.wrapped;
        let mut output = String::new();

        output.push_str("#[allow(dead_code)]\n");
        output.push_str(&self.impl_open(
            &format!("impl{generics} {self_ty}"),
            "::serde::Serialize + ::serde::de::DeserializeOwned",
        ));
        output.push_str("    /// The text used when this wrapper is a map key.\n");
        output.push_str(&format!(
            "    {vis}fn to_key_string(&self) -> ::core::result::Result<::std::string::String, ::serde_json::Error> {{\n"
        ));
        if self.descriptor.wrapped_is_string {
            output.push_str(
                "        ::core::result::Result::Ok(::core::clone::Clone::clone(&self.value))\n",
            );
        } else {
            output.push_str("        ::serde_json::to_string(&self.value)\n");
        }
        output.push_str("    }\n\n");

        output.push_str("    /// Rebuild a wrapper from a map key produced by `to_key_string`.\n");
        output.push_str(&format!(
            "    {vis}fn from_key_string(key: &str) -> ::core::result::Result<Self, ::serde_json::Error> {{\n"
        ));
        if self.descriptor.wrapped_is_string {
            output.push_str("        let quoted = ::serde_json::to_string(key)?;\n");
            output.push_str("        ::serde_json::from_str::<Self>(&quoted)\n");
        } else {
            output.push_str(&format!(
                "        ::serde_json::from_str::<{wrapped}>(key).map(Self::new)\n"
            ));
        }
        output.push_str("    }\n");
        output.push_str("}\n\n");

        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::fmt::Display for {self_ty}"),
            "::serde::Serialize + ::serde::de::DeserializeOwned",
        ));
        output.push_str(
            "    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {\n",
        );
        output.push_str("        let key = self.to_key_string().map_err(|_| ::core::fmt::Error)?;\n");
        output.push_str("        f.write_str(&key)\n");
        output.push_str("    }\n");
        output.push_str("}\n\n");

        output.push_str(&self.impl_open(
            &format!("impl{generics} ::core::str::FromStr for {self_ty}"),
            "::serde::Serialize + ::serde::de::DeserializeOwned",
        ));
        output.push_str("    type Err = ::serde_json::Error;\n\n");
        output.push_str("    fn from_str(key: &str) -> ::core::result::Result<Self, Self::Err> {\n");
        output.push_str("        Self::from_key_string(key)\n");
        output.push_str("    }\n");
        output.push_str("}\n");
        output
    }
}

/// Render the complete implementation of one wrapper.
pub fn render(descriptor: &WrapperDescriptor) -> GeneratedUnit {
    let target = Target::new(descriptor);
    let mut code = String::new();

    code.push_str(&target.storage());
    code.push('\n');
    code.push_str(&target.inherent_impl());
    code.push('\n');
    code.push_str(&target.trait_impls());

    if descriptor.has_json() {
        code.push('\n');
        code.push_str(&target.json_impls());
        code.push('\n');
        code.push_str(&target.key_impls());
    }

    for fragment in &descriptor.fragments {
        code.push('\n');
        code.push_str("#[allow(dead_code)]\n");
        code.push_str(fragment);
        code.push('\n');
    }

    let module_path = descriptor
        .namespace_path
        .iter()
        .map(|name| ModuleSegment {
            name: name.clone(),
            visibility: "pub".to_string(),
        })
        .chain(descriptor.enclosing_scopes.iter().map(|scope| ModuleSegment {
            name: scope.name.clone(),
            visibility: scope.visibility.clone(),
        }))
        .collect();

    log::trace!("rendered `{}`", descriptor.qualified_name());
    GeneratedUnit {
        name: format!("{}{}", descriptor.type_name, UNIT_SUFFIX),
        module_path,
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EnclosingScope, Features};

    fn descriptor(name: &str, wrapped: &str) -> WrapperDescriptor {
        WrapperDescriptor {
            type_name: name.to_string(),
            visibility: "pub".to_string(),
            wrapped_type: wrapped.to_string(),
            wrapped_is_string: wrapped == "String",
            namespace_path: vec![],
            enclosing_scopes: vec![],
            generic_parameters: vec![],
            readonly_requested: true,
            features: Features::empty(),
            fragments: vec![],
            has_create_hook: false,
        }
    }

    #[test]
    fn test_render_plain_wrapper() {
        let unit = render(&descriptor("WrappedInt", "i32"));
        assert_eq!(unit.name, "WrappedInt.generated");
        assert!(unit.module_path.is_empty());

        let code = &unit.code;
        assert!(code.contains("pub struct WrappedInt {\n    value: i32,\n}"));
        assert!(code.contains("pub fn new(mut value: i32) -> Self {"));
        assert!(code.contains("Self::on_create(&mut value);"));
        assert!(code.contains("fn on_create(_value: &mut i32) {}"));
        assert!(code.contains("impl ::core::cmp::PartialEq for WrappedInt {"));
        assert!(code.contains("impl ::core::hash::Hash for WrappedInt {"));
        assert!(code.contains("::core::write!(f, \"[WrappedInt({:?})]\", self.value)"));
        assert!(code.contains("impl ::core::convert::From<i32> for WrappedInt {"));
        assert!(code.contains("pub fn equals_any(&self, other: &dyn ::core::any::Any) -> bool"));
        // readonly: no mutable access
        assert!(!code.contains("value_mut"));
        // no adapters unless requested
        assert!(!code.contains("::serde::"));
        assert!(!code.contains("::rkyv::"));
        assert!(!code.contains("where\n    i32"));
    }

    #[test]
    fn test_render_mutable_and_serializable() {
        let mut d = descriptor("SerializableWrappedInt", "i32");
        d.readonly_requested = false;
        d.features = Features::HOST_SERIALIZABLE;
        let code = render(&d).code;
        assert!(code.contains(
            "#[derive(::rkyv::Archive, ::rkyv::Serialize, ::rkyv::Deserialize)]\npub struct SerializableWrappedInt {"
        ));
        assert!(code.contains("pub fn value_mut(&mut self) -> &mut i32 {"));
    }

    #[test]
    fn test_render_json_general_payload() {
        let mut d = descriptor("WrappedJsonInt", "i32");
        d.features = Features::JSON_CONVERTER;
        let code = render(&d).code;
        assert!(code.contains("impl ::serde::Serialize for WrappedJsonInt {"));
        assert!(code.contains("impl<'__de> ::serde::Deserialize<'__de> for WrappedJsonInt {"));
        assert!(code.contains("<i32 as ::serde::Deserialize<'__de>>::deserialize(deserializer).map(Self::new)"));
        assert!(code.contains("::serde_json::to_string(&self.value)\n"));
        assert!(code.contains("::serde_json::from_str::<i32>(key).map(Self::new)"));
        // keys are never guessed from their content
        assert!(!code.contains("::serde_json::Value::String"));
        assert!(code.contains("impl ::core::str::FromStr for WrappedJsonInt {"));
        assert!(code.contains("impl ::core::fmt::Display for WrappedJsonInt {"));
    }

    #[test]
    fn test_render_json_string_payload() {
        let mut d = descriptor("WrappedJsonString", "String");
        d.features = Features::JSON_CONVERTER;
        let code = render(&d).code;
        assert!(code.contains("::core::result::Result::Ok(::core::clone::Clone::clone(&self.value))"));
        assert!(code.contains("let quoted = ::serde_json::to_string(key)?;"));
        assert!(code.contains("::serde_json::from_str::<Self>(&quoted)"));
        assert!(!code.contains("::serde_json::to_value"));
    }

    #[test]
    fn test_render_generic_wrapper() {
        let mut d = descriptor("GenericWrappedInt", "i32");
        d.generic_parameters = vec![
            GenericParam::Lifetime("'a".to_string()),
            GenericParam::Type("T".to_string()),
            GenericParam::Type("U".to_string()),
            GenericParam::Const {
                name: "N".to_string(),
                ty: "usize".to_string(),
            },
        ];
        d.features = Features::JSON_CONVERTER;
        let code = render(&d).code;
        assert!(code.contains("pub struct GenericWrappedInt<'a, T, U, const N: usize> {"));
        assert!(code.contains("_marker: ::core::marker::PhantomData<(fn() -> (T, U,), &'a (),)>,"));
        assert!(code.contains("impl<'a, T, U, const N: usize> GenericWrappedInt<'a, T, U, N> {"));
        assert!(code.contains(
            "impl<'a, T, U, const N: usize> ::core::clone::Clone for GenericWrappedInt<'a, T, U, N>\nwhere\n    i32: ::core::clone::Clone,\n{\n"
        ));
        assert!(code.contains(
            "impl<'__de, 'a, T, U, const N: usize> ::serde::Deserialize<'__de> for GenericWrappedInt<'a, T, U, N>"
        ));
        assert!(code.contains("Self { value, _marker: ::core::marker::PhantomData }"));
    }

    #[test]
    fn test_const_only_generics_have_no_marker() {
        let mut d = descriptor("Fixed", "[u8; 4]");
        d.generic_parameters = vec![GenericParam::Const {
            name: "N".to_string(),
            ty: "usize".to_string(),
        }];
        let code = render(&d).code;
        assert!(!code.contains("_marker"));
        assert!(code.contains("Self { value }"));
    }

    #[test]
    fn test_render_with_hook_fragment() {
        let mut d = descriptor("Email", "String");
        d.fragments = vec![
            "impl Email { fn on_create (value : & mut String) { value . make_ascii_lowercase () ; } }"
                .to_string(),
        ];
        d.has_create_hook = true;
        let code = render(&d).code;
        assert!(!code.contains("fn on_create(_value"));
        assert!(code.contains("#[allow(dead_code)]\nimpl Email { fn on_create"));
    }

    #[test]
    fn test_nested_unit_source() {
        let mut d = descriptor("DoubleClassWrappedString", "String");
        d.namespace_path = vec!["ids".to_string()];
        d.enclosing_scopes = vec![
            EnclosingScope {
                name: "some_class".to_string(),
                is_extensible: true,
                visibility: "pub".to_string(),
            },
            EnclosingScope {
                name: "some_class2".to_string(),
                is_extensible: true,
                visibility: "pub(crate)".to_string(),
            },
        ];
        let unit = render(&d);
        let names: Vec<_> = unit.module_path.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["ids", "some_class", "some_class2"]);

        let source = unit.source();
        assert!(source.starts_with(
            "pub mod ids {\n    pub mod some_class {\n        pub(crate) mod some_class2 {\n            /// Value wrapper"
        ));
        assert!(source.ends_with("        }\n    }\n}\n"));
    }

    #[test]
    fn test_indent_keeps_blank_lines_empty() {
        assert_eq!(indent("a\n\nb\n", 2), "        a\n\n        b\n");
    }
}
