//! Go package loader using tree-sitter.
//!
//! Loading happens in two passes. The first pass parses every file and
//! records the package-wide facts that type resolution needs: per-file
//! import aliases, local type declarations and top-level functions. The
//! second pass walks the declarations again and converts each exported one
//! into a [`Symbol`] with a structural [`Type`] descriptor.
//!
//! Untyped constants and variables without a declared type get a best-effort
//! type from their initializer; anything the loader cannot work out locally
//! is recorded as `unknown`.

use std::collections::HashMap;
use tracing::{debug, trace, warn};
use tree_sitter::{Node, Parser, Tree};

use super::build::BuildContext;
use super::helpers::{
    compact, field_children, find_child_by_type, get_node_text, get_start_line,
    has_child_of_type, named_children, unquote,
};
use crate::error::{LoadError, PackageError, TableError};
use crate::scanner::is_go_source;
use crate::snapshot::SourceFile;
use crate::symbols::{is_exported, DeclKind, Symbol, SymbolTable, SymbolTableBuilder};
use crate::types::{
    package_name, DefinedType, Field, InterfaceType, Method, NamedRef, Signature, StructType,
    Term, Type, TypeParamDecl, Var,
};

/// Predeclared type names other than `any`.
const PREDECLARED: &[&str] = &[
    "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr",
];

/// Bound on nested interface flattening; guards against embedding cycles.
const MAX_EMBED_DEPTH: usize = 16;

/// Bound on inference rounds over package-level values.
const MAX_VALUE_ROUNDS: usize = 4;

/// Recorded when a value's type cannot be inferred locally.
const UNKNOWN: &str = "unknown";

/// Load the exported surface of one package.
///
/// Only files that take part in a build for `build` are read. Returns
/// `Ok(None)` when no file belongs to the package proper (only tests, only
/// other platforms, or nothing at all).
pub fn load_package(
    package: &str,
    files: &[SourceFile],
    build: &BuildContext,
) -> Result<Option<SymbolTable>, PackageError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| LoadError::unavailable(format!("Failed to set Go language: {}", e)))?;

    let mut parsed = Vec::with_capacity(files.len());
    for file in files {
        if !is_go_source(&file.name) {
            continue;
        }
        if !build.matches(&file.name, &file.source) {
            trace!("{}: excluded by build constraints", file.name);
            continue;
        }
        let tree = parser
            .parse(&file.source, None)
            .ok_or_else(|| LoadError::Parse {
                file: file.name.clone(),
                message: "parser returned no tree".to_string(),
            })?;

        let root = tree.root_node();
        let clause = package_clause(&root, &file.source);
        if root.has_error() {
            let line = first_error(root).map(|n| get_start_line(&n)).unwrap_or(1);
            if clause.is_none() {
                return Err(LoadError::Parse {
                    file: file.name.clone(),
                    message: format!("syntax error at line {}", line),
                }
                .into());
            }
            warn!(
                "{}/{}: syntax error at line {}, loading the declarations that parsed",
                package, file.name, line
            );
        }
        if clause.is_some_and(|name| name.ends_with("_test")) {
            trace!("skipping external test file {}", file.name);
            continue;
        }
        if !build.cgo && imports_cgo(&root, &file.source) {
            trace!("{}: cgo file excluded", file.name);
            continue;
        }

        parsed.push(ParsedFile {
            name: &file.name,
            source: &file.source,
            tree,
        });
    }

    if parsed.is_empty() {
        return Ok(None);
    }

    let ctx = ResolveContext::new(&parsed);
    let values = ctx.collect_values();

    let mut builder = SymbolTableBuilder::new(package);
    for (index, root) in ctx.roots.iter().enumerate() {
        trace!("extracting {}", parsed[index].name);
        ctx.extract_file(index, *root, &values, &mut builder)?;
    }

    let table = builder.build();
    debug!("{}: {} exported symbols", package, table.len());
    Ok(Some(table))
}

struct ParsedFile<'s> {
    name: &'s str,
    source: &'s str,
    tree: Tree,
}

fn package_clause<'s>(root: &Node, source: &'s str) -> Option<&'s str> {
    let clause = find_child_by_type(root, "package_clause")?;
    let id = find_child_by_type(&clause, "package_identifier")?;
    Some(get_node_text(&id, source))
}

fn imports_cgo(root: &Node, source: &str) -> bool {
    let mut imports = HashMap::new();
    for decl in named_children(root) {
        if decl.kind() == "import_declaration" {
            collect_imports(decl, source, &mut imports);
        }
    }
    imports.values().any(|path| path == "C")
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn untyped(kind: &str) -> Type {
    Type::basic(&format!("untyped {}", kind))
}

fn unknown() -> Type {
    Type::basic(UNKNOWN)
}

/// Default-type ranking for mixing untyped constants: the larger wins.
fn untyped_rank(ty: &Type) -> Option<u8> {
    match ty {
        Type::Basic { name } => match name.as_str() {
            "untyped int" => Some(1),
            "untyped rune" => Some(2),
            "untyped float" => Some(3),
            "untyped complex" => Some(4),
            n if n.starts_with("untyped ") => Some(0),
            _ => None,
        },
        _ => None,
    }
}

/// Type of a binary arithmetic expression from its operand types.
fn combine(left: Type, right: Type) -> Type {
    match (untyped_rank(&left), untyped_rank(&right)) {
        (None, _) => left,
        (Some(_), None) => right,
        (Some(l), Some(r)) => {
            if r > l {
                right
            } else {
                left
            }
        }
    }
}

/// Import aliases of one file.
struct FileScope<'t> {
    source: &'t str,
    imports: HashMap<String, String>,
}

/// A local `type` declaration.
#[derive(Clone, Copy)]
struct TypeDecl<'t> {
    file: usize,
    node: Node<'t>,
}

impl<'t> TypeDecl<'t> {
    fn body(&self) -> Option<Node<'t>> {
        self.node.child_by_field_name("type")
    }

    fn is_generic(&self) -> bool {
        self.node.child_by_field_name("type_parameters").is_some()
    }
}

/// Names in scope while resolving one declaration.
#[derive(Clone)]
struct Scope<'t> {
    file: usize,
    type_params: Vec<&'t str>,
}

impl<'t> Scope<'t> {
    fn new(file: usize) -> Self {
        Self {
            file,
            type_params: Vec::new(),
        }
    }
}

/// Package-wide facts shared by every resolution.
struct ResolveContext<'t> {
    files: Vec<FileScope<'t>>,
    types: HashMap<&'t str, TypeDecl<'t>>,
    funcs: HashMap<&'t str, (usize, Node<'t>)>,
    roots: Vec<Node<'t>>,
}

impl<'t> ResolveContext<'t> {
    fn new(parsed: &'t [ParsedFile<'t>]) -> Self {
        let mut ctx = Self {
            files: Vec::with_capacity(parsed.len()),
            types: HashMap::new(),
            funcs: HashMap::new(),
            roots: Vec::with_capacity(parsed.len()),
        };

        for (index, file) in parsed.iter().enumerate() {
            let root = file.tree.root_node();
            let mut imports = HashMap::new();

            for decl in named_children(&root) {
                match decl.kind() {
                    "import_declaration" => collect_imports(decl, file.source, &mut imports),
                    "type_declaration" => {
                        for spec in named_children(&decl) {
                            if !matches!(spec.kind(), "type_spec" | "type_alias") {
                                continue;
                            }
                            if let Some(name) = spec.child_by_field_name("name") {
                                let name = get_node_text(&name, file.source);
                                ctx.types
                                    .entry(name)
                                    .or_insert(TypeDecl { file: index, node: spec });
                            }
                        }
                    }
                    "function_declaration" => {
                        if let Some(name) = decl.child_by_field_name("name") {
                            let name = get_node_text(&name, file.source);
                            ctx.funcs.entry(name).or_insert((index, decl));
                        }
                    }
                    _ => {}
                }
            }

            ctx.files.push(FileScope {
                source: file.source,
                imports,
            });
            ctx.roots.push(root);
        }

        ctx
    }

    fn text(&self, file: usize, node: Node<'t>) -> &'t str {
        get_node_text(&node, self.files[file].source)
    }

    fn import_path(&self, file: usize, alias: &str) -> String {
        match self.files[file].imports.get(alias) {
            Some(path) => path.clone(),
            None => {
                debug!("no import for package qualifier {}", alias);
                alias.to_string()
            }
        }
    }

    fn resolve_name(&self, name: &str, scope: &Scope<'t>) -> Type {
        if scope.type_params.iter().any(|p| *p == name) {
            return Type::TypeParam {
                name: name.to_string(),
            };
        }
        if self.types.contains_key(name) {
            return Type::local(name);
        }
        if name == "any" {
            return Type::empty_interface();
        }
        if PREDECLARED.contains(&name) {
            return Type::basic(name);
        }
        debug!("unresolved type reference {}", name);
        Type::local(name)
    }

    fn resolve_type(&self, node: Node<'t>, scope: &Scope<'t>) -> Type {
        let child = |field: &str| {
            node.child_by_field_name(field)
                .map(|n| self.resolve_type(n, scope))
                .unwrap_or_else(unknown)
        };

        match node.kind() {
            "type_identifier" | "identifier" => self.resolve_name(self.text(scope.file, node), scope),
            "qualified_type" => {
                let package = node
                    .child_by_field_name("package")
                    .map(|n| self.text(scope.file, n))
                    .unwrap_or_default();
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(scope.file, n))
                    .unwrap_or_default();
                Type::Named(NamedRef {
                    package: Some(self.import_path(scope.file, package)),
                    name: name.to_string(),
                    type_args: Vec::new(),
                })
            }
            "generic_type" => {
                let base = child("type");
                let args = node
                    .child_by_field_name("type_arguments")
                    .map(|n| self.type_list(n, scope))
                    .unwrap_or_default();
                match base {
                    Type::Named(mut named) => {
                        named.type_args = args;
                        Type::Named(named)
                    }
                    other => other,
                }
            }
            "pointer_type" => match named_children(&node).first() {
                Some(elem) => Type::pointer(self.resolve_type(*elem, scope)),
                None => unknown(),
            },
            "slice_type" => Type::slice(child("element")),
            "array_type" => Type::Array {
                len: node
                    .child_by_field_name("length")
                    .map(|n| compact(self.text(scope.file, n)))
                    .unwrap_or_default(),
                elem: Box::new(child("element")),
            },
            "implicit_length_array_type" => Type::Array {
                len: "...".to_string(),
                elem: Box::new(child("element")),
            },
            "map_type" => Type::map(child("key"), child("value")),
            "channel_type" => Type::Chan {
                dir: channel_dir(self.text(scope.file, node)),
                elem: Box::new(child("value")),
            },
            "function_type" => Type::Signature(self.signature(node, scope)),
            "struct_type" => Type::Struct(self.struct_type(node, scope)),
            "interface_type" => Type::Interface(self.interface_type(node, scope, 0)),
            "parenthesized_type" => match named_children(&node).first() {
                Some(inner) => self.resolve_type(*inner, scope),
                None => unknown(),
            },
            "type_elem" | "type_constraint" | "constraint_elem" | "negated_type" => {
                self.resolve_terms(node, scope)
            }
            other => {
                debug!("unsupported type syntax {}", other);
                Type::basic(self.text(scope.file, node))
            }
        }
    }

    fn type_list(&self, node: Node<'t>, scope: &Scope<'t>) -> Vec<Type> {
        named_children(&node)
            .into_iter()
            .map(|n| self.resolve_type(n, scope))
            .collect()
    }

    /// A `|`-separated term list; a single plain term is just that type.
    fn resolve_terms(&self, node: Node<'t>, scope: &Scope<'t>) -> Type {
        let nodes = if node.kind() == "negated_type" {
            vec![node]
        } else {
            named_children(&node)
        };

        let mut terms: Vec<Term> = nodes
            .into_iter()
            .map(|n| {
                if n.kind() == "negated_type" {
                    let ty = named_children(&n)
                        .first()
                        .map(|inner| self.resolve_type(*inner, scope))
                        .unwrap_or_else(unknown);
                    Term { tilde: true, ty }
                } else {
                    Term {
                        tilde: false,
                        ty: self.resolve_type(n, scope),
                    }
                }
            })
            .collect();

        if terms.len() == 1 && !terms[0].tilde {
            return terms.remove(0).ty;
        }
        Type::Union { terms }
    }

    fn type_params(
        &self,
        list: Option<Node<'t>>,
        scope: &Scope<'t>,
    ) -> (Vec<TypeParamDecl>, Scope<'t>) {
        let mut inner = scope.clone();
        let Some(list) = list else {
            return (Vec::new(), inner);
        };

        let decls: Vec<Node<'t>> = named_children(&list)
            .into_iter()
            .filter(|d| d.kind() == "type_parameter_declaration")
            .collect();

        // All names first: constraints may refer to sibling parameters.
        for decl in &decls {
            for name in field_children(decl, "name") {
                inner.type_params.push(self.text(scope.file, name));
            }
        }

        let mut params = Vec::new();
        for decl in &decls {
            let constraint = decl
                .child_by_field_name("type")
                .map(|c| self.resolve_type(c, &inner))
                .unwrap_or_else(Type::empty_interface);
            for name in field_children(decl, "name") {
                params.push(TypeParamDecl {
                    name: self.text(scope.file, name).to_string(),
                    constraint: constraint.clone(),
                });
            }
        }
        (params, inner)
    }

    fn parameters(&self, list: Node<'t>, scope: &Scope<'t>) -> (Vec<Var>, bool) {
        let mut vars = Vec::new();
        let mut variadic = false;

        for param in named_children(&list) {
            let ty = param
                .child_by_field_name("type")
                .map(|t| self.resolve_type(t, scope))
                .unwrap_or_else(unknown);

            match param.kind() {
                "parameter_declaration" => {
                    let names = field_children(&param, "name");
                    if names.is_empty() {
                        vars.push(Var {
                            name: String::new(),
                            ty,
                        });
                    } else {
                        for name in names {
                            vars.push(Var {
                                name: self.text(scope.file, name).to_string(),
                                ty: ty.clone(),
                            });
                        }
                    }
                }
                "variadic_parameter_declaration" => {
                    variadic = true;
                    vars.push(Var {
                        name: param
                            .child_by_field_name("name")
                            .map(|n| self.text(scope.file, n).to_string())
                            .unwrap_or_default(),
                        ty: Type::slice(ty),
                    });
                }
                _ => {}
            }
        }
        (vars, variadic)
    }

    /// Parameters and results of anything with `parameters`/`result` fields.
    fn signature(&self, node: Node<'t>, scope: &Scope<'t>) -> Signature {
        let mut sig = Signature::default();
        if let Some(params) = node.child_by_field_name("parameters") {
            let (vars, variadic) = self.parameters(params, scope);
            sig.params.vars = vars;
            sig.variadic = variadic;
        }
        if let Some(result) = node.child_by_field_name("result") {
            sig.results.vars = if result.kind() == "parameter_list" {
                self.parameters(result, scope).0
            } else {
                vec![Var {
                    name: String::new(),
                    ty: self.resolve_type(result, scope),
                }]
            };
        }
        sig
    }

    fn struct_type(&self, node: Node<'t>, scope: &Scope<'t>) -> StructType {
        let mut fields = Vec::new();
        let Some(list) = find_child_by_type(&node, "field_declaration_list") else {
            return StructType { fields };
        };

        for decl in named_children(&list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let Some(type_node) = decl.child_by_field_name("type") else {
                continue;
            };
            let names = field_children(&decl, "name");

            if names.is_empty() {
                let base = self.resolve_type(type_node, scope);
                let ty = if has_child_of_type(&decl, "*") {
                    Type::pointer(base)
                } else {
                    base
                };
                let name = self.embedded_name(type_node, scope.file).to_string();
                fields.push(Field {
                    exported: is_exported(&name),
                    name,
                    ty,
                    embedded: true,
                });
                continue;
            }

            let ty = self.resolve_type(type_node, scope);
            for name in names {
                let name = self.text(scope.file, name).to_string();
                fields.push(Field {
                    exported: is_exported(&name),
                    name,
                    ty: ty.clone(),
                    embedded: false,
                });
            }
        }
        StructType { fields }
    }

    /// Field name of an embedded type: its unqualified type name.
    fn embedded_name(&self, node: Node<'t>, file: usize) -> &'t str {
        match node.kind() {
            "qualified_type" => node
                .child_by_field_name("name")
                .map(|n| self.text(file, n))
                .unwrap_or_default(),
            "generic_type" => node
                .child_by_field_name("type")
                .map(|n| self.embedded_name(n, file))
                .unwrap_or_default(),
            "pointer_type" => named_children(&node)
                .first()
                .map(|n| self.embedded_name(*n, file))
                .unwrap_or_default(),
            _ => self.text(file, node),
        }
    }

    fn interface_type(&self, node: Node<'t>, scope: &Scope<'t>, depth: usize) -> InterfaceType {
        let mut iface = InterfaceType::default();

        for elem in named_children(&node) {
            match elem.kind() {
                "method_elem" | "method_spec" => {
                    let Some(name) = elem.child_by_field_name("name") else {
                        continue;
                    };
                    let method = Method {
                        name: self.text(scope.file, name).to_string(),
                        sig: self.signature(elem, scope),
                    };
                    merge(&mut iface, InterfaceType {
                        methods: vec![method],
                        embedded: Vec::new(),
                    });
                }
                "type_elem" | "constraint_elem" => {
                    let terms = named_children(&elem);
                    match terms.as_slice() {
                        [single] if single.kind() != "negated_type" => {
                            self.embed(*single, scope, depth, &mut iface)
                        }
                        _ => iface.embedded.push(self.resolve_terms(elem, scope)),
                    }
                }
                "type_identifier" | "qualified_type" | "generic_type" => {
                    self.embed(elem, scope, depth, &mut iface)
                }
                other => trace!("ignoring interface element {}", other),
            }
        }
        iface
    }

    /// Embed one type into an interface, flattening local interfaces and
    /// the predeclared `error`.
    fn embed(&self, node: Node<'t>, scope: &Scope<'t>, depth: usize, iface: &mut InterfaceType) {
        if node.kind() == "type_identifier" {
            let name = self.text(scope.file, node);
            if !scope.type_params.iter().any(|p| *p == name) {
                match self.types.get(name) {
                    None if name == "error" => {
                        merge(iface, Type::error_interface());
                        return;
                    }
                    Some(decl) if !decl.is_generic() && depth < MAX_EMBED_DEPTH => {
                        if let Some(body) = decl.body().filter(|b| b.kind() == "interface_type") {
                            let inner = self.interface_type(body, &Scope::new(decl.file), depth + 1);
                            merge(iface, inner);
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }
        let ty = self.resolve_type(node, scope);
        merge(iface, InterfaceType {
            methods: Vec::new(),
            embedded: vec![ty],
        });
    }

    /// Types of all package-level constants and variables that can be
    /// inferred. Repeated rounds pick up forward references.
    fn collect_values(&self) -> HashMap<&'t str, Type> {
        let mut values = HashMap::new();
        for _ in 0..MAX_VALUE_ROUNDS {
            let known = values.len();
            for (file, root) in self.roots.iter().enumerate() {
                let scope = Scope::new(file);
                for decl in named_children(root) {
                    for (name, _, ty) in self.value_decl(decl, &scope, &values) {
                        if let Some(ty) = ty {
                            values.insert(name, ty);
                        }
                    }
                }
            }
            if values.len() == known {
                break;
            }
        }
        values
    }

    fn value_decl(
        &self,
        decl: Node<'t>,
        scope: &Scope<'t>,
        values: &HashMap<&'t str, Type>,
    ) -> Vec<(&'t str, DeclKind, Option<Type>)> {
        match decl.kind() {
            "const_declaration" => self.const_values(decl, scope, values),
            "var_declaration" => self.var_values(decl, scope, values),
            _ => Vec::new(),
        }
    }

    fn const_values(
        &self,
        decl: Node<'t>,
        scope: &Scope<'t>,
        values: &HashMap<&'t str, Type>,
    ) -> Vec<(&'t str, DeclKind, Option<Type>)> {
        let mut out = Vec::new();
        // An empty spec repeats the previous type and expression list.
        let mut previous: (Option<Node<'t>>, Vec<Node<'t>>) = (None, Vec::new());

        for spec in named_children(&decl) {
            if spec.kind() != "const_spec" {
                continue;
            }
            let mut type_node = spec.child_by_field_name("type");
            let mut exprs = spec
                .child_by_field_name("value")
                .map(|v| named_children(&v))
                .unwrap_or_default();
            if type_node.is_none() && exprs.is_empty() {
                type_node = previous.0;
                exprs = previous.1.clone();
            } else {
                previous = (type_node, exprs.clone());
            }

            let declared = type_node.map(|t| self.resolve_type(t, scope));
            for (i, name) in field_children(&spec, "name").into_iter().enumerate() {
                let ty = declared
                    .clone()
                    .or_else(|| exprs.get(i).and_then(|e| self.infer(*e, scope, values)));
                out.push((self.text(scope.file, name), DeclKind::Const, ty));
            }
        }
        out
    }

    fn var_values(
        &self,
        decl: Node<'t>,
        scope: &Scope<'t>,
        values: &HashMap<&'t str, Type>,
    ) -> Vec<(&'t str, DeclKind, Option<Type>)> {
        let mut specs = Vec::new();
        for child in named_children(&decl) {
            match child.kind() {
                "var_spec" => specs.push(child),
                "var_spec_list" => specs.extend(
                    named_children(&child)
                        .into_iter()
                        .filter(|c| c.kind() == "var_spec"),
                ),
                _ => {}
            }
        }

        let mut out = Vec::new();
        for spec in specs {
            let names = field_children(&spec, "name");
            let declared = spec
                .child_by_field_name("type")
                .map(|t| self.resolve_type(t, scope));
            let exprs = spec
                .child_by_field_name("value")
                .map(|v| named_children(&v))
                .unwrap_or_default();

            // `var a, b = f()` takes one type per result.
            let multi = if declared.is_none() && exprs.len() == 1 && names.len() > 1 {
                self.call_results(exprs[0], scope)
            } else {
                Vec::new()
            };

            for (i, name) in names.into_iter().enumerate() {
                let ty = declared.clone().or_else(|| {
                    if multi.is_empty() {
                        exprs.get(i).and_then(|e| self.infer(*e, scope, values))
                    } else {
                        multi.get(i).cloned()
                    }
                });
                out.push((self.text(scope.file, name), DeclKind::Var, ty));
            }
        }
        out
    }

    /// Best-effort type of an initializer expression.
    fn infer(
        &self,
        expr: Node<'t>,
        scope: &Scope<'t>,
        values: &HashMap<&'t str, Type>,
    ) -> Option<Type> {
        let field = |name: &str| expr.child_by_field_name(name);

        match expr.kind() {
            "int_literal" | "iota" => Some(untyped("int")),
            "float_literal" => Some(untyped("float")),
            "imaginary_literal" => Some(untyped("complex")),
            "rune_literal" => Some(untyped("rune")),
            "interpreted_string_literal" | "raw_string_literal" => Some(untyped("string")),
            "true" | "false" => Some(untyped("bool")),
            "identifier" => {
                let name = self.text(scope.file, expr);
                match values.get(name) {
                    Some(ty) => Some(ty.clone()),
                    None => self.funcs.get(name).and_then(|&(file, decl)| {
                        let generic = decl.child_by_field_name("type_parameters").is_some();
                        (!generic).then(|| Type::Signature(self.signature(decl, &Scope::new(file))))
                    }),
                }
            }
            "parenthesized_expression" => named_children(&expr)
                .first()
                .and_then(|inner| self.infer(*inner, scope, values)),
            "unary_expression" => {
                let operand = field("operand")?;
                match field("operator")?.kind() {
                    "&" => self.infer(operand, scope, values).map(Type::pointer),
                    "*" | "<-" => None,
                    _ => self.infer(operand, scope, values),
                }
            }
            "binary_expression" => {
                let left = field("left")?;
                let right = field("right")?;
                match field("operator")?.kind() {
                    "==" | "!=" | "<" | "<=" | ">" | ">=" => Some(untyped("bool")),
                    "<<" | ">>" => self.infer(left, scope, values),
                    _ => {
                        let l = self.infer(left, scope, values)?;
                        let r = self.infer(right, scope, values)?;
                        Some(combine(l, r))
                    }
                }
            }
            "call_expression" => {
                let mut results = self.call_results(expr, scope);
                if results.len() == 1 {
                    results.pop()
                } else {
                    None
                }
            }
            "type_conversion_expression" | "composite_literal" => {
                field("type").map(|t| self.resolve_type(t, scope))
            }
            "func_literal" => Some(Type::Signature(self.signature(expr, scope))),
            _ => None,
        }
    }

    /// Result types of a call, or a conversion's target type.
    fn call_results(&self, call: Node<'t>, scope: &Scope<'t>) -> Vec<Type> {
        if call.kind() != "call_expression" {
            return Vec::new();
        }
        let Some(func) = call.child_by_field_name("function") else {
            return Vec::new();
        };
        let first_arg = || {
            call.child_by_field_name("arguments")
                .and_then(|args| named_children(&args).into_iter().next())
        };

        match func.kind() {
            "identifier" => {
                let name = self.text(scope.file, func);
                if let Some(&(file, decl)) = self.funcs.get(name) {
                    if decl.child_by_field_name("type_parameters").is_some() {
                        return Vec::new();
                    }
                    let sig = self.signature(decl, &Scope::new(file));
                    return sig.results.vars.into_iter().map(|v| v.ty).collect();
                }
                if self.types.contains_key(name) || PREDECLARED.contains(&name) {
                    return vec![self.resolve_name(name, scope)];
                }
                match name {
                    "len" | "cap" | "copy" => vec![Type::basic("int")],
                    "make" => first_arg()
                        .map(|t| vec![self.resolve_type(t, scope)])
                        .unwrap_or_default(),
                    "new" => first_arg()
                        .map(|t| vec![Type::pointer(self.resolve_type(t, scope))])
                        .unwrap_or_default(),
                    _ => Vec::new(),
                }
            }
            "selector_expression" => {
                let operand = func
                    .child_by_field_name("operand")
                    .map(|n| self.text(scope.file, n))
                    .unwrap_or_default();
                let member = func
                    .child_by_field_name("field")
                    .map(|n| self.text(scope.file, n))
                    .unwrap_or_default();
                let path = self.files[scope.file].imports.get(operand).map(String::as_str);
                match (path, member) {
                    (Some("errors"), "New") | (Some("fmt"), "Errorf") => vec![Type::basic("error")],
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    fn extract_file(
        &self,
        file: usize,
        root: Node<'t>,
        values: &HashMap<&'t str, Type>,
        builder: &mut SymbolTableBuilder,
    ) -> Result<(), TableError> {
        let scope = Scope::new(file);
        for decl in named_children(&root) {
            match decl.kind() {
                "function_declaration" => self.function_decl(decl, &scope, builder)?,
                "method_declaration" => self.method_decl(decl, &scope, builder)?,
                "type_declaration" => {
                    for spec in named_children(&decl) {
                        if matches!(spec.kind(), "type_spec" | "type_alias") {
                            self.type_decl(spec, &scope, builder)?;
                        }
                    }
                }
                "const_declaration" | "var_declaration" => {
                    for (name, kind, ty) in self.value_decl(decl, &scope, values) {
                        let ty = ty.unwrap_or_else(|| {
                            trace!("cannot infer type of {}", name);
                            unknown()
                        });
                        builder.insert(Symbol::new(name, kind, ty))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn function_decl(
        &self,
        decl: Node<'t>,
        scope: &Scope<'t>,
        builder: &mut SymbolTableBuilder,
    ) -> Result<(), TableError> {
        let Some(name) = decl.child_by_field_name("name") else {
            return Ok(());
        };
        let (type_params, inner) = self.type_params(decl.child_by_field_name("type_parameters"), scope);
        let mut sig = self.signature(decl, &inner);
        sig.type_params = type_params;

        builder.insert(Symbol::new(
            self.text(scope.file, name),
            DeclKind::Func,
            Type::Signature(sig),
        ))?;
        Ok(())
    }

    fn method_decl(
        &self,
        decl: Node<'t>,
        scope: &Scope<'t>,
        builder: &mut SymbolTableBuilder,
    ) -> Result<(), TableError> {
        let Some(name) = decl.child_by_field_name("name") else {
            return Ok(());
        };
        let receiver_type = decl
            .child_by_field_name("receiver")
            .and_then(|list| {
                named_children(&list)
                    .into_iter()
                    .find(|p| p.kind() == "parameter_declaration")
            })
            .and_then(|param| param.child_by_field_name("type"));
        let Some((receiver, params)) = receiver_type.and_then(|t| self.receiver(t, scope.file))
        else {
            debug!("skipping method with unreadable receiver");
            return Ok(());
        };

        let mut inner = scope.clone();
        inner.type_params.extend(params.iter().copied());
        let mut sig = self.signature(decl, &inner);
        sig.recv_type_params = params.iter().map(|p| p.to_string()).collect();

        builder.insert(Symbol::method(
            &receiver,
            self.text(scope.file, name),
            Type::Signature(sig),
        ))?;
        Ok(())
    }

    /// Receiver spelling (`*T` or `T`) and the type parameter names it binds.
    fn receiver(&self, node: Node<'t>, file: usize) -> Option<(String, Vec<&'t str>)> {
        match node.kind() {
            "type_identifier" => Some((self.text(file, node).to_string(), Vec::new())),
            "pointer_type" => {
                let inner = named_children(&node).into_iter().next()?;
                let (name, params) = self.receiver(inner, file)?;
                Some((format!("*{}", name), params))
            }
            "parenthesized_type" => {
                let inner = named_children(&node).into_iter().next()?;
                self.receiver(inner, file)
            }
            "generic_type" => {
                let base = node.child_by_field_name("type")?;
                let params = node
                    .child_by_field_name("type_arguments")
                    .map(|args| {
                        named_children(&args)
                            .into_iter()
                            .map(|a| self.text(file, a).trim())
                            .collect()
                    })
                    .unwrap_or_default();
                Some((self.text(file, base).to_string(), params))
            }
            _ => None,
        }
    }

    fn type_decl(
        &self,
        spec: Node<'t>,
        scope: &Scope<'t>,
        builder: &mut SymbolTableBuilder,
    ) -> Result<(), TableError> {
        let Some(name) = spec.child_by_field_name("name") else {
            return Ok(());
        };
        let name = self.text(scope.file, name);
        let (type_params, inner) = self.type_params(spec.child_by_field_name("type_parameters"), scope);
        let underlying = spec
            .child_by_field_name("type")
            .map(|t| self.resolve_type(t, &inner))
            .unwrap_or_else(unknown);

        let defined = DefinedType {
            name: name.to_string(),
            type_params,
            alias: spec.kind() == "type_alias",
            underlying,
        };
        builder.insert(Symbol::new(name, DeclKind::Type, Type::Defined(Box::new(defined))))?;
        Ok(())
    }
}

fn collect_imports(decl: Node, source: &str, imports: &mut HashMap<String, String>) {
    let mut specs = Vec::new();
    for child in named_children(&decl) {
        match child.kind() {
            "import_spec" => specs.push(child),
            "import_spec_list" => specs.extend(
                named_children(&child)
                    .into_iter()
                    .filter(|c| c.kind() == "import_spec"),
            ),
            _ => {}
        }
    }

    for spec in specs {
        let Some(path) = spec.child_by_field_name("path") else {
            continue;
        };
        let path = unquote(get_node_text(&path, source)).to_string();
        let alias = match spec.child_by_field_name("name") {
            Some(name) => get_node_text(&name, source).to_string(),
            None => package_name(&path).to_string(),
        };
        // Blank and dot imports introduce no qualifier.
        if alias == "_" || alias == "." {
            continue;
        }
        imports.insert(alias, path);
    }
}

fn channel_dir(text: &str) -> crate::types::ChanDir {
    use crate::types::ChanDir;

    let text = text.trim_start();
    if text.starts_with("<-") {
        return ChanDir::Recv;
    }
    let rest = text.strip_prefix("chan").unwrap_or(text).trim_start();
    if rest.starts_with("<-") {
        ChanDir::Send
    } else {
        ChanDir::Both
    }
}

/// Add methods and embeds not already present.
fn merge(into: &mut InterfaceType, from: InterfaceType) {
    for method in from.methods {
        if into.method(&method.name).is_none() {
            into.methods.push(method);
        }
    }
    for ty in from.embedded {
        let canonical = ty.canonical();
        if !into.embedded.iter().any(|e| e.canonical() == canonical) {
            into.embedded.push(ty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChanDir;

    fn load(source: &str) -> SymbolTable {
        load_package("./pkg", &[SourceFile::new("pkg.go", source)], &BuildContext::default())
            .unwrap()
            .unwrap()
    }

    fn show(table: &SymbolTable, name: &str) -> String {
        table
            .get(name)
            .unwrap_or_else(|| panic!("missing symbol {}", name))
            .ty
            .to_string()
    }

    #[test]
    fn test_functions_and_methods() {
        let table = load(
            r#"package greet

type Greeter struct {
	Name string
}

func (g *Greeter) Greet(formal bool) string { return g.Name }

func (g Greeter) String() string { return g.Name }

func (g *Greeter) reset() {}

func helper() {}

func Split(s string) (head, tail string) { return s, s }
"#,
        );

        let names: Vec<&str> = table.names().collect();
        assert_eq!(
            names,
            vec!["(*Greeter).Greet", "Greeter", "Greeter.String", "Split"]
        );
        assert_eq!(show(&table, "(*Greeter).Greet"), "func(bool) string");
        assert_eq!(show(&table, "Split"), "func(string) (string, string)");
        assert_eq!(table.get("Greeter.String").unwrap().kind, DeclKind::Method);
    }

    #[test]
    fn test_struct_fields() {
        let table = load(
            r#"package server

import (
	"net/http"
	"sync"
)

type Server struct {
	http.Handler
	*Options
	Addr, Host string
	mu sync.Mutex
}

type Options struct{}
"#,
        );

        let Type::Defined(def) = &table.get("Server").unwrap().ty else {
            panic!("expected defined type");
        };
        let Type::Struct(st) = &def.underlying else {
            panic!("expected struct");
        };
        let names: Vec<&str> = st.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Handler", "Options", "Addr", "Host", "mu"]);
        assert!(st.fields[0].embedded);
        assert_eq!(st.fields[0].ty.canonical(), "\"net/http\".Handler");
        assert_eq!(st.fields[1].ty.to_string(), "*Options");
        assert!(!st.fields[4].exported);
    }

    #[test]
    fn test_interface_flattening() {
        let table = load(
            r#"package store

import "io"

type Reader interface {
	Get(key string) ([]byte, error)
}

type Store interface {
	Reader
	io.Closer
	error
	Put(key string, value []byte) error
}
"#,
        );

        assert_eq!(
            show(&table, "Store"),
            "type Store interface{Error() string; Get(string) ([]byte, error); Put(string, []byte) error; io.Closer}"
        );
    }

    #[test]
    fn test_generics() {
        let table = load(
            r#"package coll

type Number interface {
	~int | ~float64
}

type Set[K comparable] map[K]struct{}

type List[T any] struct {
	items []T
}

func (l *List[T]) Push(v T) {}

func Map[T, U any](xs []T, f func(T) U) []U { return nil }
"#,
        );

        assert_eq!(show(&table, "Set"), "type Set[K comparable] map[K]struct{}");
        assert_eq!(show(&table, "Number"), "type Number interface{~int | ~float64}");
        assert_eq!(show(&table, "(*List).Push"), "func(T)");
        assert_eq!(
            show(&table, "Map"),
            "func[T interface{}, U interface{}]([]T, func(T) U) []U"
        );
    }

    #[test]
    fn test_renamed_type_params_load_identical() {
        let old = load(
            r#"package coll

type List[T any] struct{ Items []T }

func (l *List[T]) Push(v T) {}

func Map[T, U any](xs []T, f func(T) U) []U { return nil }
"#,
        );
        let new = load(
            r#"package coll

type List[E any] struct{ Items []E }

func (l *List[E]) Push(v E) {}

func Map[In, Out any](xs []In, f func(In) Out) []Out { return nil }
"#,
        );

        for name in ["(*List).Push", "List", "Map"] {
            let (a, b) = (&old.get(name).unwrap().ty, &new.get(name).unwrap().ty);
            assert_ne!(a.to_string(), b.to_string());
            assert!(crate::types::identical(a, b), "{} differs", name);
        }
    }

    #[test]
    fn test_alias_and_unresolved() {
        let table = load(
            r#"package temp

type Celsius = float64

type Reading struct {
	Value Celsius
	Meta  Missing
}
"#,
        );

        let Type::Defined(def) = &table.get("Celsius").unwrap().ty else {
            panic!("expected defined type");
        };
        assert!(def.alias);
        assert_eq!(show(&table, "Reading"), "type Reading struct{Value Celsius; Meta Missing}");
    }

    #[test]
    fn test_import_alias_is_resolved_to_path() {
        let table = load(
            r#"package run

import stdctx "context"

func Run(ctx stdctx.Context) error { return nil }
"#,
        );

        let sym = table.get("Run").unwrap();
        assert_eq!(sym.ty.canonical(), "func(\"context\".Context) error");
        assert_eq!(sym.ty.to_string(), "func(context.Context) error");
    }

    #[test]
    fn test_variadic_and_channels() {
        let table = load(
            r#"package events

type Event struct{}

func Printf(format string, args ...any) {}

func Subscribe() <-chan Event { return nil }

func Publish(out chan<- Event) {}
"#,
        );

        assert_eq!(show(&table, "Printf"), "func(string, ...interface{})");
        assert_eq!(show(&table, "Subscribe"), "func() <-chan Event");
        let Type::Signature(sig) = &table.get("Publish").unwrap().ty else {
            panic!("expected signature");
        };
        assert!(matches!(sig.params.vars[0].ty, Type::Chan { dir: ChanDir::Send, .. }));
    }

    #[test]
    fn test_constant_and_variable_types() {
        let table = load(
            r#"package limits

import (
	"errors"
	"time"
)

type Level int

const (
	Debug Level = iota
	Info
	Warn
)

const (
	MaxRetries = 3
	Ratio      = MaxRetries * 1.5
	Name       = "limits"
	Timeout    time.Duration = 5
	Enabled    = MaxRetries > 2
)

var ErrClosed = errors.New("closed")

var DefaultClient = NewClient()

var Buffer = make([]byte, 0, 64)

var Later = Name

var Opaque = time.Now()

type Client struct{}

func NewClient() *Client { return &Client{} }
"#,
        );

        assert_eq!(show(&table, "Info"), "Level");
        assert_eq!(show(&table, "Warn"), "Level");
        assert_eq!(show(&table, "MaxRetries"), "untyped int");
        assert_eq!(show(&table, "Ratio"), "untyped float");
        assert_eq!(show(&table, "Name"), "untyped string");
        assert_eq!(show(&table, "Timeout"), "time.Duration");
        assert_eq!(show(&table, "Enabled"), "untyped bool");
        assert_eq!(show(&table, "ErrClosed"), "error");
        assert_eq!(show(&table, "DefaultClient"), "*Client");
        assert_eq!(show(&table, "Buffer"), "[]byte");
        assert_eq!(show(&table, "Later"), "untyped string");
        assert_eq!(show(&table, "Opaque"), "unknown");
        assert_eq!(table.get("Info").unwrap().kind, DeclKind::Const);
        assert_eq!(table.get("ErrClosed").unwrap().kind, DeclKind::Var);
    }

    #[test]
    fn test_external_test_package_is_skipped() {
        let files = [
            SourceFile::new("api.go", "package api\n\nfunc Run() {}\n"),
            SourceFile::new("api_ext.go", "package api_test\n\nfunc TestHelper() {}\n"),
            SourceFile::new("api_test.go", "package api\n\nfunc TestRun() {}\n"),
        ];
        let table = load_package("./api", &files, &BuildContext::default()).unwrap().unwrap();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["Run"]);
    }

    #[test]
    fn test_only_test_files_means_absent() {
        let files = [SourceFile::new("x_test.go", "package x\n")];
        assert!(load_package("./x", &files, &BuildContext::default()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_across_files_is_a_table_error() {
        let files = [
            SourceFile::new("a.go", "package dup\n\nfunc Run() {}\n"),
            SourceFile::new("b.go", "package dup\n\nfunc Run() {}\n"),
        ];
        let err = load_package("./dup", &files, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, PackageError::Table(TableError::DuplicateSymbol { .. })));
    }

    #[test]
    fn test_unnamed_parameters() {
        let table = load(
            r#"package codec

type Encoder interface {
	Encode(int, []byte) (int, error)
}

func Apply(int, string) error { return nil }
"#,
        );
        assert_eq!(show(&table, "Apply"), "func(int, string) error");
        assert_eq!(
            show(&table, "Encoder"),
            "type Encoder interface{Encode(int, []byte) (int, error)}"
        );
    }

    #[test]
    fn test_platform_variants_do_not_collide() {
        let open = "package fsx\n\nfunc Open(path string) error { return nil }\n";
        let files = [
            SourceFile::new("open_linux.go", open),
            SourceFile::new("open_windows.go", open),
            SourceFile::new(
                "watch.go",
                "//go:build darwin || windows\n\npackage fsx\n\nfunc Watch() {}\n",
            ),
        ];

        let linux = load_package("./fsx", &files, &BuildContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(linux.names().collect::<Vec<_>>(), vec!["Open"]);

        let windows = load_package("./fsx", &files, &BuildContext::new("windows", "arm64"))
            .unwrap()
            .unwrap();
        assert_eq!(windows.names().collect::<Vec<_>>(), vec!["Open", "Watch"]);
    }

    #[test]
    fn test_cgo_files_follow_cgo_setting() {
        let files = [
            SourceFile::new("pure.go", "package gz\n\nfunc Level() int { return 1 }\n"),
            SourceFile::new(
                "native.go",
                "package gz\n\nimport \"C\"\n\nfunc Native() {}\n",
            ),
        ];

        let table = load_package("./gz", &files, &BuildContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["Level"]);

        let build = BuildContext {
            cgo: true,
            ..Default::default()
        };
        let table = load_package("./gz", &files, &build).unwrap().unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["Level", "Native"]);
    }

    #[test]
    fn test_only_other_platforms_means_absent() {
        let files = [SourceFile::new("x_windows.go", "package x\n\nfunc Run() {}\n")];
        assert!(load_package("./x", &files, &BuildContext::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_not_go_is_a_load_error() {
        let files = [SourceFile::new("broken.go", "this is { not go at all")];
        let err = load_package("./broken", &files, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, PackageError::Load(LoadError::Parse { .. })));
    }

    #[test]
    fn test_channel_dir() {
        assert_eq!(channel_dir("chan int"), ChanDir::Both);
        assert_eq!(channel_dir("chan<- int"), ChanDir::Send);
        assert_eq!(channel_dir("<-chan int"), ChanDir::Recv);
        assert_eq!(channel_dir("chan (<-chan int)"), ChanDir::Both);
    }

    #[test]
    fn test_combine_untyped() {
        assert_eq!(combine(untyped("int"), untyped("float")), untyped("float"));
        assert_eq!(combine(untyped("int"), Type::local("Level")), Type::local("Level"));
        assert_eq!(combine(Type::basic("int64"), untyped("int")), Type::basic("int64"));
    }
}
