//! Declaration scanner that finds structs annotated with `#[type_wrapper(..)]`.
//!
//! Declaration files are parsed with `syn` but never compiled. Every marked
//! `struct` becomes a [`RawDescriptor`] that records the payload type, the
//! requested features and the chain of items enclosing the stub.
//!
//! ## Use-item analysis
//!
//! Each module gets its own import map, built from its `use` items:
//!
//! - `use crate::ids::RawId` maps `"RawId"` to `"crate::ids::RawId"`
//! - `use std::string::String as Text` maps `"Text"` to `"std::string::String"`
//! - `use type_wrapper_codegen::type_wrapper as newtype` maps `"newtype"` to the
//!   canonical marker path, which is then recognized as a marker.
//!
//! Payload types and carried-through impl blocks are rewritten with the map of
//! the module that declares the stub, so the generated code does not depend on
//! the declaration file's `use` items.

use crate::descriptor::{Ancestor, AncestorKind, Features, GenericParam, RawDescriptor};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};
use crate::error::{CodegenError, Result};
use crate::generator::WrapperGenerator;
use quote::ToTokens;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use syn::parse::{Parse, ParseStream};
use syn::visit_mut::{self, VisitMut};
use syn::{
    Attribute, BinOp, Expr, ImplItem, Item, ItemStruct, Stmt, TraitItem, Type, UseTree, Visibility,
};
use walkdir::WalkDir;

/// The fully-qualified marker path.
const MARKER: &str = "type_wrapper_codegen::type_wrapper";

/// Marker name as written without a path.
const MARKER_NAME: &str = "type_wrapper";

/// Per-module context built from `use` items.
#[derive(Debug, Clone, Default)]
struct SourceContext {
    /// Maps local name -> fully-qualified path.
    ///
    /// Glob imports are not tracked since they can't be resolved statically.
    imports: HashMap<String, String>,
}

/// Recursively flatten a `UseTree` into import entries.
fn collect_imports(tree: &UseTree, prefix: &[String], imports: &mut HashMap<String, String>) {
    match tree {
        UseTree::Path(p) => {
            let mut new_prefix = prefix.to_vec();
            new_prefix.push(p.ident.to_string());
            collect_imports(&p.tree, &new_prefix, imports);
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            // `use foo::bar::{self}` imports `bar`
            if name == "self" {
                if let Some((last, rest)) = prefix.split_last() {
                    imports.insert(last.clone(), make_full_path(rest, last));
                }
                return;
            }
            let full_path = make_full_path(prefix, &name);
            imports.insert(name, full_path);
        }
        UseTree::Rename(r) => {
            let canonical = r.ident.to_string();
            let alias = r.rename.to_string();
            if alias == "_" {
                return;
            }
            let full_path = make_full_path(prefix, &canonical);
            imports.insert(alias, full_path);
        }
        UseTree::Glob(_) => {}
        UseTree::Group(g) => {
            for item in &g.items {
                collect_imports(item, prefix, imports);
            }
        }
    }
}

/// Join prefix segments with the final name using `::`.
fn make_full_path(prefix: &[String], name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", prefix.join("::"), name)
    }
}

/// Build a `SourceContext` from the `use` items of one module.
fn build_source_context(items: &[Item]) -> SourceContext {
    let mut imports = HashMap::new();
    for item in items {
        if let Item::Use(item_use) = item {
            collect_imports(&item_use.tree, &[], &mut imports);
        }
    }
    SourceContext { imports }
}

fn path_to_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// Check if an attribute is the wrapper marker.
///
/// Recognizes:
/// - `#[type_wrapper(..)]`
/// - `#[type_wrapper_codegen::type_wrapper(..)]` or any path ending in `::type_wrapper`
/// - `#[newtype(..)]` when `use type_wrapper_codegen::type_wrapper as newtype` is in scope
fn is_marker(attr: &Attribute, ctx: &SourceContext) -> bool {
    let path = attr.path();
    if path.segments.len() == 1 {
        let ident = path.segments[0].ident.to_string();
        ident == MARKER_NAME || ctx.imports.get(&ident).is_some_and(|p| p == MARKER)
    } else {
        let qualified = path_to_string(path);
        qualified == MARKER || qualified.ends_with("::type_wrapper")
    }
}

/// `#[readonly]` or `#[readonly::make]`
fn is_readonly(attr: &Attribute) -> bool {
    let path = attr.path();
    path.is_ident("readonly") || path_to_string(path) == "readonly::make"
}

/// Arguments of the marker: a payload type and an optional feature expression.
struct MarkerArgs {
    wrapped: Type,
    features: Option<Expr>,
}

impl Parse for MarkerArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let wrapped: Type = input.parse()?;
        let mut features = None;
        if input.peek(syn::Token![,]) {
            input.parse::<syn::Token![,]>()?;
            if !input.is_empty() {
                features = Some(input.parse::<Expr>()?);
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
        }
        if !input.is_empty() {
            return Err(input.error("unexpected tokens after the feature list"));
        }
        Ok(Self { wrapped, features })
    }
}

/// Walk a `Feature::A | Feature::B` expression and map every leaf to a flag.
///
/// Only the last path segment is compared, and it must match a flag name exactly.
fn collect_features(expr: &Expr, features: &mut Features, unknown: &mut Vec<String>) {
    match expr {
        Expr::Binary(binary) if matches!(binary.op, BinOp::BitOr(_)) => {
            collect_features(&binary.left, features, unknown);
            collect_features(&binary.right, features, unknown);
        }
        Expr::Paren(paren) => collect_features(&paren.expr, features, unknown),
        Expr::Group(group) => collect_features(&group.expr, features, unknown),
        Expr::Path(expr_path) => {
            let flag = expr_path
                .path
                .segments
                .last()
                .and_then(|seg| Features::from_flag_name(&seg.ident.to_string()));
            match flag {
                Some(flag) => *features |= flag,
                None => unknown.push(path_to_string(&expr_path.path)),
            }
        }
        other => unknown.push(normalize_tokens(other.to_token_stream().to_string())),
    }
}

/// Rewrites the first segment of relative paths through a module's import map.
struct ImportResolver<'a> {
    ctx: &'a SourceContext,
}

impl VisitMut for ImportResolver<'_> {
    fn visit_path_mut(&mut self, path: &mut syn::Path) {
        if path.leading_colon.is_none()
            && let Some(first) = path.segments.first()
            && let Some(full) = self.ctx.imports.get(&first.ident.to_string())
            && full != &first.ident.to_string()
            && let Ok(resolved) = syn::parse_str::<syn::Path>(full)
        {
            let mut segments = resolved.segments;
            if let Some(last) = segments.last_mut() {
                last.arguments = first.arguments.clone();
            }
            segments.extend(path.segments.iter().skip(1).cloned());
            path.segments = segments;
        }
        visit_mut::visit_path_mut(self, path);
    }
}

/// Tidy the spacing of a token stream printed with `to_string`.
fn normalize_tokens(text: String) -> String {
    let mut text = text;
    for (from, to) in [
        (" :: ", "::"),
        (":: ", "::"),
        (" < ", "<"),
        ("< ", "<"),
        (" >", ">"),
        (" ,", ","),
        ("& ", "&"),
        (" ;", ";"),
        ("pub (", "pub("),
    ] {
        text = text.replace(from, to);
    }
    text
}

fn type_to_string(ty: &Type) -> String {
    normalize_tokens(ty.to_token_stream().to_string())
}

/// Whether `ty` names the standard owned string type.
pub(crate) fn is_string_type(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => {
            let path = &type_path.path;
            let no_args = path
                .segments
                .iter()
                .all(|seg| matches!(seg.arguments, syn::PathArguments::None));
            no_args
                && matches!(
                    path_to_string(path).as_str(),
                    "String" | "std::string::String" | "alloc::string::String"
                )
        }
        Type::Paren(paren) => is_string_type(&paren.elem),
        Type::Group(group) => is_string_type(&group.elem),
        _ => false,
    }
}

fn visibility_string(vis: &Visibility) -> String {
    match vis {
        Visibility::Public(_) => "pub".to_string(),
        Visibility::Restricted(_) => normalize_tokens(vis.to_token_stream().to_string()),
        Visibility::Inherited => String::new(),
    }
}

fn extract_generics(generics: &syn::Generics) -> Vec<GenericParam> {
    generics
        .params
        .iter()
        .map(|param| match param {
            syn::GenericParam::Lifetime(l) => GenericParam::Lifetime(format!("'{}", l.lifetime.ident)),
            syn::GenericParam::Type(t) => GenericParam::Type(t.ident.to_string()),
            syn::GenericParam::Const(c) => GenericParam::Const {
                name: c.ident.to_string(),
                ty: type_to_string(&c.ty),
            },
        })
        .collect()
}

/// Whether an impl block defines `on_create` itself.
pub(crate) fn defines_create_hook(item_impl: &syn::ItemImpl) -> bool {
    item_impl
        .items
        .iter()
        .any(|item| matches!(item, ImplItem::Fn(f) if f.sig.ident == "on_create"))
}

/// Inherent impl blocks for `name` among `items`, with `on_create` detection.
fn collect_fragments(name: &str, items: &[Item], ctx: &SourceContext) -> (Vec<String>, bool) {
    let mut fragments = Vec::new();
    let mut has_create_hook = false;
    for item in items {
        let Item::Impl(item_impl) = item else {
            continue;
        };
        if item_impl.trait_.is_some() {
            continue;
        }
        let Type::Path(self_ty) = &*item_impl.self_ty else {
            continue;
        };
        // `impl other::Name` belongs to some other type
        let path = &self_ty.path;
        if self_ty.qself.is_some()
            || path.leading_colon.is_some()
            || path.segments.len() != 1
            || path.segments[0].ident != name
        {
            continue;
        }
        has_create_hook |= defines_create_hook(item_impl);
        let mut item_impl = item_impl.clone();
        ImportResolver { ctx }.visit_item_impl_mut(&mut item_impl);
        fragments.push(item_impl.to_token_stream().to_string());
    }
    (fragments, has_create_hook)
}

/// Everything found in one declaration source.
#[derive(Debug, Default)]
pub(crate) struct ScanOutput {
    pub descriptors: Vec<RawDescriptor>,
    pub malformed: Vec<Diagnostic>,
}

struct Scanner<'a> {
    file: Option<&'a Path>,
    namespace: &'a [String],
    report_malformed: bool,
    output: ScanOutput,
}

impl Scanner<'_> {
    /// `ancestors` is the stack of enclosing items, outermost first.
    fn scan_items(&mut self, items: &[Item], ctx: &SourceContext, ancestors: &mut Vec<Ancestor>) {
        for item in items {
            match item {
                Item::Struct(item_struct) => self.scan_struct(item_struct, items, ctx, ancestors),
                Item::Mod(item_mod) => {
                    let Some((_, content)) = &item_mod.content else {
                        log::trace!("skipping out-of-line module `{}`", item_mod.ident);
                        continue;
                    };
                    let inner_ctx = build_source_context(content);
                    ancestors.push(Ancestor::module(
                        item_mod.ident.to_string(),
                        visibility_string(&item_mod.vis),
                    ));
                    self.scan_items(content, &inner_ctx, ancestors);
                    ancestors.pop();
                }
                Item::Fn(item_fn) => self.scan_block(
                    Ancestor::function(item_fn.sig.ident.to_string()),
                    &item_fn.block,
                    ctx,
                    ancestors,
                ),
                Item::Impl(item_impl) => {
                    for impl_item in &item_impl.items {
                        if let ImplItem::Fn(f) = impl_item {
                            let ancestor = Ancestor::function(f.sig.ident.to_string());
                            self.scan_block(ancestor, &f.block, ctx, ancestors);
                        }
                    }
                }
                Item::Trait(item_trait) => {
                    ancestors.push(Ancestor::with_kind(
                        item_trait.ident.to_string(),
                        AncestorKind::Trait,
                    ));
                    for trait_item in &item_trait.items {
                        if let TraitItem::Fn(f) = trait_item
                            && let Some(block) = &f.default
                        {
                            let ancestor = Ancestor::function(f.sig.ident.to_string());
                            self.scan_block(ancestor, block, ctx, ancestors);
                        }
                    }
                    ancestors.pop();
                }
                Item::Const(item_const) => {
                    self.scan_initializer(&item_const.ident, &item_const.expr, ctx, ancestors)
                }
                Item::Static(item_static) => {
                    self.scan_initializer(&item_static.ident, &item_static.expr, ctx, ancestors)
                }
                _ => {}
            }
        }
    }

    /// `const NAME: T = { .. };` and `static` items with a block initializer.
    fn scan_initializer(
        &mut self,
        name: &syn::Ident,
        expr: &Expr,
        ctx: &SourceContext,
        ancestors: &mut Vec<Ancestor>,
    ) {
        let block = match expr {
            Expr::Block(expr_block) => &expr_block.block,
            Expr::Unsafe(expr_unsafe) => &expr_unsafe.block,
            Expr::Const(expr_const) => &expr_const.block,
            _ => return,
        };
        let ancestor = Ancestor::with_kind(name.to_string(), AncestorKind::Initializer);
        self.scan_block(ancestor, block, ctx, ancestors);
    }

    fn scan_block(
        &mut self,
        ancestor: Ancestor,
        block: &syn::Block,
        ctx: &SourceContext,
        ancestors: &mut Vec<Ancestor>,
    ) {
        let items: Vec<Item> = block
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Item(item) => Some(item.clone()),
                _ => None,
            })
            .collect();
        if items.is_empty() {
            return;
        }
        // Blocks still see the enclosing module's imports
        let mut inner_ctx = ctx.clone();
        inner_ctx.imports.extend(build_source_context(&items).imports);
        ancestors.push(ancestor);
        self.scan_items(&items, &inner_ctx, ancestors);
        ancestors.pop();
    }

    fn location(&self, item: &ItemStruct, ancestors: &[Ancestor]) -> Location {
        let start = item.ident.span().start();
        let item_path = self
            .namespace
            .iter()
            .map(String::as_str)
            .chain(ancestors.iter().map(|a| a.name.as_str()))
            .chain(std::iter::once(item.ident.to_string().as_str()))
            .collect::<Vec<_>>()
            .join("::");
        Location {
            file: self.file.map(Path::to_path_buf),
            line: start.line,
            column: start.column + 1,
            item: item_path,
        }
    }

    fn scan_struct(
        &mut self,
        item: &ItemStruct,
        siblings: &[Item],
        ctx: &SourceContext,
        ancestors: &[Ancestor],
    ) {
        let Some(marker) = item.attrs.iter().find(|attr| is_marker(attr, ctx)) else {
            return;
        };
        let location = self.location(item, ancestors);

        let args = match marker.parse_args::<MarkerArgs>() {
            Ok(args) => args,
            Err(err) => {
                log::debug!("skipping {location}: malformed marker: {err}");
                if self.report_malformed {
                    self.output.malformed.push(Diagnostic::new(
                        DiagnosticCode::MalformedMarker,
                        format!(
                            "`{}` is not generated: the marker's first argument must be a type ({err})",
                            item.ident
                        ),
                        location,
                    ));
                }
                return;
            }
        };

        let mut wrapped = args.wrapped;
        ImportResolver { ctx }.visit_type_mut(&mut wrapped);

        let mut features = Features::empty();
        let mut unknown_features = Vec::new();
        if let Some(expr) = &args.features {
            collect_features(expr, &mut features, &mut unknown_features);
        }

        let type_name = item.ident.to_string();
        let (fragments, has_create_hook) = collect_fragments(&type_name, siblings, ctx);

        log::debug!("found wrapper candidate {location}");
        self.output.descriptors.push(RawDescriptor {
            type_name,
            visibility: visibility_string(&item.vis),
            wrapped_is_string: is_string_type(&wrapped),
            wrapped_type: type_to_string(&wrapped),
            namespace_path: self.namespace.to_vec(),
            ancestors: ancestors.iter().rev().cloned().collect(),
            generics: extract_generics(&item.generics),
            readonly_requested: item.attrs.iter().any(is_readonly),
            features,
            unknown_features,
            has_fields: item.fields.iter().next().is_some(),
            fragments,
            has_create_hook,
            location,
        });
    }
}

/// Parse one declaration source and collect its marked stubs.
pub(crate) fn scan_source(
    source: &str,
    file: Option<&Path>,
    namespace: &[String],
    report_malformed: bool,
) -> Result<ScanOutput> {
    let parsed = syn::parse_file(source).map_err(|err| {
        CodegenError::parse(file.unwrap_or_else(|| Path::new("<string>")), err)
    })?;

    let ctx = build_source_context(&parsed.items);
    let mut scanner = Scanner {
        file,
        namespace,
        report_malformed,
        output: ScanOutput::default(),
    };
    scanner.scan_items(&parsed.items, &ctx, &mut Vec::new());
    Ok(scanner.output)
}

/// Module path of `file` relative to `root`.
///
/// `a/b.rs` is `a::b`; `mod.rs`, `lib.rs` and `main.rs` stand for their directory.
pub(crate) fn module_path_for(root: &Path, file: &Path) -> Vec<String> {
    let Ok(relative) = file.strip_prefix(root) else {
        return Vec::new();
    };
    let mut segments: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(stem) = relative.file_stem().map(|s| s.to_string_lossy().into_owned())
        && !matches!(stem.as_str(), "mod" | "lib" | "main")
    {
        segments.push(stem);
    }
    segments
}

impl WrapperGenerator {
    fn absorb(&mut self, output: ScanOutput) {
        self.candidates.extend(output.descriptors);
        self.malformed.extend(output.malformed);
    }

    /// Parse a single declaration file. Its stubs are placed at the root module.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), type_wrapper_codegen::CodegenError> {
    /// use type_wrapper_codegen::WrapperGenerator;
    ///
    /// let mut generator = WrapperGenerator::new();
    /// generator.add_source_file("wrappers.rs")?;
    /// generator.write_to_file("wrappers.generated.rs")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_source_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.cancellation.check()?;
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let output = scan_source(&source, Some(path), &[], self.report_malformed)?;
        self.absorb(output);
        Ok(self)
    }

    /// Parse declarations from a string. Its stubs are placed at the root module.
    pub fn add_source_str(&mut self, source: &str) -> Result<&mut Self> {
        self.add_source_str_in(source, std::iter::empty::<String>())
    }

    /// Parse declarations from a string, placing its stubs under `namespace`.
    pub fn add_source_str_in<I, S>(&mut self, source: &str, namespace: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cancellation.check()?;
        let namespace: Vec<String> = namespace.into_iter().map(Into::into).collect();
        let output = scan_source(source, None, &namespace, self.report_malformed)?;
        self.absorb(output);
        Ok(self)
    }

    /// Recursively scan a directory of declaration files.
    ///
    /// Each file's stubs are placed under the file's module path relative to
    /// `path`, so `dir/ids/mod.rs` and `dir/ids.rs` both map to `ids`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), type_wrapper_codegen::CodegenError> {
    /// use type_wrapper_codegen::WrapperGenerator;
    ///
    /// let mut generator = WrapperGenerator::new();
    /// generator.add_source_dir("wrappers/")?;
    /// generator.write_to_file("wrappers.generated.rs")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_source_dir(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let root = path.as_ref();
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "rs") {
                files.push(path.to_path_buf());
            }
        }

        let report_malformed = self.report_malformed;
        let cancellation = self.cancellation.clone();
        let outputs = files
            .par_iter()
            .map(|file| -> Result<ScanOutput> {
                cancellation.check()?;
                let source = fs::read_to_string(file)?;
                let namespace = module_path_for(root, file);
                scan_source(&source, Some(file.as_path()), &namespace, report_malformed)
            })
            .collect::<Result<Vec<_>>>()?;

        for output in outputs {
            self.absorb(output);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AncestorKind;

    fn scan(source: &str) -> ScanOutput {
        scan_source(source, None, &[], false).unwrap()
    }

    #[test]
    fn test_extract_simple_stub() {
        let output = scan(
            r#"
            #[type_wrapper(i32)]
            #[readonly]
            pub struct WrappedInt;
        "#,
        );
        assert_eq!(output.descriptors.len(), 1);
        let raw = &output.descriptors[0];
        assert_eq!(raw.type_name, "WrappedInt");
        assert_eq!(raw.wrapped_type, "i32");
        assert_eq!(raw.visibility, "pub");
        assert!(raw.readonly_requested);
        assert!(raw.features.is_empty());
        assert!(!raw.has_fields);
        assert_eq!(raw.location.line, 4);
        assert_eq!(raw.location.item, "WrappedInt");
    }

    #[test]
    fn test_ignores_unmarked_structs() {
        let output = scan(
            r#"
            #[derive(Debug)]
            pub struct NotAWrapper;
            #[type_wrapper(u64)]
            pub struct Wrapper;
        "#,
        );
        let names: Vec<_> = output.descriptors.iter().map(|d| d.type_name.as_str()).collect();
        assert_eq!(names, ["Wrapper"]);
    }

    #[test]
    fn test_qualified_and_aliased_marker() {
        let output = scan(
            r#"
            use type_wrapper_codegen::type_wrapper as newtype;
            #[type_wrapper_codegen::type_wrapper(u8)]
            pub struct Qualified;
            #[some::reexport::type_wrapper(u16)]
            pub struct Reexported;
            #[newtype(u32)]
            pub struct Aliased;
            #[other(u64)]
            pub struct Unrelated;
        "#,
        );
        let names: Vec<_> = output.descriptors.iter().map(|d| d.type_name.as_str()).collect();
        assert_eq!(names, ["Qualified", "Reexported", "Aliased"]);
    }

    #[test]
    fn test_readonly_long_form() {
        let output = scan(
            r#"
            #[type_wrapper(i32)]
            #[readonly::make]
            pub struct A;
            #[type_wrapper(i32)]
            pub struct B;
        "#,
        );
        assert!(output.descriptors[0].readonly_requested);
        assert!(!output.descriptors[1].readonly_requested);
    }

    #[test]
    fn test_feature_expression() {
        let output = scan(
            r#"
            #[type_wrapper(String, Feature::JsonConverter | Feature::HostSerializable)]
            pub struct Both;
            #[type_wrapper(String, (Feature::JsonConverter))]
            pub struct Paren;
            #[type_wrapper(String, Feature::None)]
            pub struct Nothing;
        "#,
        );
        let both = &output.descriptors[0];
        assert!(both.features.contains(Features::JSON_CONVERTER | Features::HOST_SERIALIZABLE));
        assert!(both.unknown_features.is_empty());
        assert_eq!(output.descriptors[1].features, Features::JSON_CONVERTER);
        assert!(output.descriptors[2].features.is_empty());
    }

    #[test]
    fn test_feature_names_match_exactly() {
        let output = scan(
            r#"
            #[type_wrapper(i32, Feature::JsonConverterV2 | Feature::HostSerializable)]
            pub struct Loose;
        "#,
        );
        let raw = &output.descriptors[0];
        assert_eq!(raw.features, Features::HOST_SERIALIZABLE);
        assert_eq!(raw.unknown_features, ["Feature::JsonConverterV2"]);
    }

    #[test]
    fn test_malformed_marker_skipped_silently() {
        let source = r#"
            #[type_wrapper]
            pub struct NoArgs;
            #[type_wrapper(42)]
            pub struct NotAType;
        "#;
        let output = scan(source);
        assert!(output.descriptors.is_empty());
        assert!(output.malformed.is_empty());

        let output = scan_source(source, None, &[], true).unwrap();
        assert_eq!(output.malformed.len(), 2);
        assert!(output
            .malformed
            .iter()
            .all(|d| d.code == DiagnosticCode::MalformedMarker));
    }

    #[test]
    fn test_nested_modules_and_functions() {
        let output = scan_source(
            r#"
            pub mod some_class {
                #[type_wrapper(i32)]
                pub struct ClassWrappedInt;

                pub(crate) mod some_class2 {
                    #[type_wrapper(String)]
                    pub struct DoubleClassWrappedString;
                }
            }

            fn build() {
                #[type_wrapper(i32)]
                struct Hidden;
            }
        "#,
            None,
            &["ids".to_string()],
            false,
        )
        .unwrap();

        let outer = &output.descriptors[0];
        assert_eq!(outer.namespace_path, ["ids"]);
        assert_eq!(outer.ancestors, [Ancestor::module("some_class", "pub")]);
        assert_eq!(outer.location.item, "ids::some_class::ClassWrappedInt");

        let inner = &output.descriptors[1];
        let names: Vec<_> = inner.ancestors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["some_class2", "some_class"]);
        assert_eq!(
            inner.ancestors[0].kind,
            AncestorKind::Module {
                visibility: "pub(crate)".to_string()
            }
        );

        let hidden = &output.descriptors[2];
        assert_eq!(hidden.ancestors, [Ancestor::function("build")]);
        assert_eq!(hidden.visibility, "");
    }

    #[test]
    fn test_payload_resolved_through_module_imports() {
        let output = scan(
            r#"
            use crate::fixtures::RefType;
            use std::collections::BTreeMap as Map;
            use std::string::String as Text;

            #[type_wrapper(RefType)]
            pub struct WrappedRefType;

            #[type_wrapper(Map<u32, Vec<RefType>>)]
            pub struct WrappedMap;

            #[type_wrapper(Text)]
            pub struct WrappedText;

            pub mod inner {
                #[type_wrapper(RefType)]
                pub struct NotImportedHere;
            }
        "#,
        );
        let types: Vec<_> = output.descriptors.iter().map(|d| d.wrapped_type.as_str()).collect();
        assert_eq!(
            types,
            [
                "crate::fixtures::RefType",
                "std::collections::BTreeMap<u32, Vec<crate::fixtures::RefType>>",
                "std::string::String",
                "RefType",
            ]
        );
        assert!(output.descriptors[2].wrapped_is_string);
        assert!(!output.descriptors[0].wrapped_is_string);
    }

    #[test]
    fn test_generics_and_fields() {
        let output = scan(
            r#"
            #[type_wrapper(i32)]
            pub struct GenericWrappedInt<'a, T: Clone, const N: usize>;

            #[type_wrapper(i32)]
            pub struct WithFields { extra: u8 }
        "#,
        );
        assert_eq!(
            output.descriptors[0].generics,
            [
                GenericParam::Lifetime("'a".to_string()),
                GenericParam::Type("T".to_string()),
                GenericParam::Const {
                    name: "N".to_string(),
                    ty: "usize".to_string()
                },
            ]
        );
        assert!(output.descriptors[1].has_fields);
    }

    #[test]
    fn test_fragments_and_create_hook() {
        let output = scan(
            r#"
            use crate::normalize::fold_case;

            #[type_wrapper(String)]
            #[readonly]
            pub struct Email;

            impl Email {
                fn on_create(value: &mut String) {
                    *value = fold_case(value);
                }
            }

            impl std::fmt::Write for Email {}

            #[type_wrapper(String)]
            #[readonly]
            pub struct Plain;
        "#,
        );
        let email = &output.descriptors[0];
        assert!(email.has_create_hook);
        assert_eq!(email.fragments.len(), 1);
        assert!(email.fragments[0].contains("crate :: normalize :: fold_case"));

        let plain = &output.descriptors[1];
        assert!(!plain.has_create_hook);
        assert!(plain.fragments.is_empty());
    }

    #[test]
    fn test_fragments_for_other_paths_are_not_carried() {
        let output = scan(
            r#"
            #[type_wrapper(String)]
            #[readonly]
            pub struct Email;

            impl other::Email {
                fn on_create(value: &mut String) {}
            }

            impl Email {
                fn on_create_audit(&self) {}
            }
        "#,
        );
        let email = &output.descriptors[0];
        assert_eq!(email.fragments.len(), 1);
        assert!(email.fragments[0].contains("on_create_audit"));
        assert!(!email.has_create_hook);
    }

    #[test]
    fn test_trait_and_initializer_bodies_are_scanned() {
        let output = scan(
            r#"
            trait Maker {
                fn make() {
                    #[type_wrapper(i32)]
                    #[readonly]
                    struct InTrait;
                }

                fn declared_only();
            }

            const _: () = {
                #[type_wrapper(i32)]
                #[readonly]
                struct InConst;
            };

            static TABLE: u8 = unsafe {
                #[type_wrapper(i32)]
                #[readonly]
                struct InStatic;
                0
            };
        "#,
        );
        assert_eq!(output.descriptors.len(), 3);

        let in_trait = &output.descriptors[0];
        assert_eq!(
            in_trait.ancestors,
            [
                Ancestor::function("make"),
                Ancestor::with_kind("Maker", AncestorKind::Trait),
            ]
        );
        assert_eq!(in_trait.location.item, "Maker::make::InTrait");

        assert_eq!(
            output.descriptors[1].ancestors,
            [Ancestor::with_kind("_", AncestorKind::Initializer)]
        );
        assert_eq!(
            output.descriptors[2].ancestors,
            [Ancestor::with_kind("TABLE", AncestorKind::Initializer)]
        );
    }

    #[test]
    fn test_is_string_type() {
        for text in ["String", "std::string::String", "::alloc::string::String"] {
            let ty: Type = syn::parse_str(text).unwrap();
            assert!(is_string_type(&ty), "{text}");
        }
        for text in ["str", "&str", "Vec<String>", "my::String"] {
            let ty: Type = syn::parse_str(text).unwrap();
            assert!(!is_string_type(&ty), "{text}");
        }
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = scan_source("pub struct {", None, &[], false).unwrap_err();
        assert!(matches!(err, CodegenError::Parse { .. }));
    }

    #[test]
    fn test_module_path_for() {
        let root = Path::new("decl");
        assert_eq!(module_path_for(root, Path::new("decl/lib.rs")), Vec::<String>::new());
        assert_eq!(module_path_for(root, Path::new("decl/ids.rs")), ["ids"]);
        assert_eq!(module_path_for(root, Path::new("decl/ids/mod.rs")), ["ids"]);
        assert_eq!(
            module_path_for(root, Path::new("decl/ids/users.rs")),
            ["ids", "users"]
        );
    }

    #[test]
    fn test_add_source_dir() {
        let root = std::env::temp_dir().join(format!(
            "type-wrapper-codegen-scan-{}",
            std::process::id()
        ));
        fs::create_dir_all(root.join("ids")).unwrap();
        fs::write(
            root.join("lib.rs"),
            "#[type_wrapper(i32)] #[readonly] pub struct Top;",
        )
        .unwrap();
        fs::write(
            root.join("ids/users.rs"),
            "#[type_wrapper(u64)] #[readonly] pub struct UserId;",
        )
        .unwrap();

        let mut generator = WrapperGenerator::new();
        generator.add_source_dir(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        let namespaces: Vec<_> = generator
            .candidates
            .iter()
            .map(|d| (d.type_name.as_str(), d.namespace_path.join("::")))
            .collect();
        assert_eq!(
            namespaces,
            [("UserId", "ids::users".to_string()), ("Top", String::new())]
        );
    }
}
