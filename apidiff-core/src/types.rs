//! Type descriptors for exported API surfaces.
//!
//! A [`Type`] is a closed, structural representation of one Go type: basic
//! types, references to named types, composite types (pointer, slice, array,
//! map, channel), struct and interface bodies, function signatures, and the
//! generic building blocks (type parameters, union terms). Descriptors are
//! plain values: cloned freely, never mutated after the loader builds them.
//!
//! Two descriptors are *identical* when their canonical encodings match
//! byte-for-byte (see [`Type::canonical`]). The canonical encoding is Go
//! syntax with parameter names dropped, type parameters numbered by position
//! and cross-package references fully qualified by import path, so it is
//! independent of source formatting and of the order in which unrelated
//! declarations were written.

use serde::Serialize;
use std::fmt::{self, Write as _};

/// Kind tag of a type descriptor, used in change messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Basic,
    Named,
    TypeParam,
    Pointer,
    Slice,
    Array,
    Map,
    Chan,
    Struct,
    Interface,
    Signature,
    Union,
    Defined,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Basic => "basic",
            TypeKind::Named => "named",
            TypeKind::TypeParam => "type parameter",
            TypeKind::Pointer => "pointer",
            TypeKind::Slice => "slice",
            TypeKind::Array => "array",
            TypeKind::Map => "map",
            TypeKind::Chan => "channel",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Signature => "func",
            TypeKind::Union => "union",
            TypeKind::Defined => "defined type",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A structural type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// Predeclared type (`int`, `string`, `error`, `untyped int`, ...).
    Basic { name: String },
    /// Reference to a defined type, compared by identity only.
    Named(NamedRef),
    /// Type parameter in scope of a generic declaration.
    TypeParam { name: String },
    Pointer { elem: Box<Type> },
    Slice { elem: Box<Type> },
    Array { len: String, elem: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    Chan { dir: ChanDir, elem: Box<Type> },
    Struct(StructType),
    Interface(InterfaceType),
    Signature(Signature),
    /// Constraint term list, e.g. `~int | ~string`.
    Union { terms: Vec<Term> },
    /// The declaration side of a `type` symbol.
    Defined(Box<DefinedType>),
}

/// Reference to a named type.
///
/// `package` is `None` for types declared in the package under comparison
/// and for identifiers the loader could not resolve; otherwise it is the
/// import path of the declaring package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NamedRef {
    pub package: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_args: Vec<Type>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct StructType {
    pub fields: Vec<Field>,
}

impl StructType {
    /// Exported fields in declaration order.
    pub fn exported_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.exported)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
    pub exported: bool,
}

/// Interface body: explicit methods plus embedded elements that could not
/// be flattened (types from other packages, union constraints).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct InterfaceType {
    pub methods: Vec<Method>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embedded: Vec<Type>,
}

impl InterfaceType {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Method {
    pub name: String,
    pub sig: Signature,
}

/// Function signature. Receivers are not part of the signature; they live
/// on the method symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Signature {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParamDecl>,
    /// Type parameters bound by a generic receiver (`func (l *List[T]) ...`).
    /// Not printed, but part of identity.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recv_type_params: Vec<String>,
    pub params: Tuple,
    pub results: Tuple,
    pub variadic: bool,
}

/// Ordered parameter or result list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Tuple {
    pub vars: Vec<Var>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Var {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Term {
    pub tilde: bool,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypeParamDecl {
    pub name: String,
    pub constraint: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DefinedType {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParamDecl>,
    pub alias: bool,
    pub underlying: Type,
}

impl Type {
    pub fn basic(name: &str) -> Self {
        Type::Basic {
            name: name.to_string(),
        }
    }

    /// Reference to a type declared in the package under comparison.
    pub fn local(name: &str) -> Self {
        Type::Named(NamedRef {
            package: None,
            name: name.to_string(),
            type_args: Vec::new(),
        })
    }

    pub fn qualified(package: &str, name: &str) -> Self {
        Type::Named(NamedRef {
            package: Some(package.to_string()),
            name: name.to_string(),
            type_args: Vec::new(),
        })
    }

    pub fn pointer(elem: Type) -> Self {
        Type::Pointer {
            elem: Box::new(elem),
        }
    }

    pub fn slice(elem: Type) -> Self {
        Type::Slice {
            elem: Box::new(elem),
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// The empty interface, which is also what `any` resolves to.
    pub fn empty_interface() -> Self {
        Type::Interface(InterfaceType::default())
    }

    /// The predeclared `error` interface, used when flattening embeds.
    pub fn error_interface() -> InterfaceType {
        InterfaceType {
            methods: vec![Method {
                name: "Error".to_string(),
                sig: Signature::new(vec![], vec![Type::basic("string")]),
            }],
            embedded: Vec::new(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Basic { .. } => TypeKind::Basic,
            Type::Named(_) => TypeKind::Named,
            Type::TypeParam { .. } => TypeKind::TypeParam,
            Type::Pointer { .. } => TypeKind::Pointer,
            Type::Slice { .. } => TypeKind::Slice,
            Type::Array { .. } => TypeKind::Array,
            Type::Map { .. } => TypeKind::Map,
            Type::Chan { .. } => TypeKind::Chan,
            Type::Struct(_) => TypeKind::Struct,
            Type::Interface(_) => TypeKind::Interface,
            Type::Signature(_) => TypeKind::Signature,
            Type::Union { .. } => TypeKind::Union,
            Type::Defined(_) => TypeKind::Defined,
        }
    }

    /// Canonical structural encoding: cross-package references carry their
    /// full import path, interface members are sorted and type parameters
    /// are spelled `$0`, `$1`, ... by binding position.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        let positional = Renamer::positional().ty(self);
        // Writing into a String cannot fail.
        let _ = write_type(&mut out, &positional, Qualify::ImportPath);
        out
    }

    /// Copy with free type parameters renamed through `names` (from, to).
    /// Parameters bound inside the type keep their names.
    pub fn rename_type_params(&self, names: &[(String, String)]) -> Type {
        Renamer::with_bindings(names.to_vec()).ty(self)
    }
}

/// Structural identity of two descriptors.
pub fn identical(a: &Type, b: &Type) -> bool {
    a == b || a.canonical() == b.canonical()
}

impl Signature {
    /// Unnamed, non-variadic, non-generic signature.
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self {
            type_params: Vec::new(),
            recv_type_params: Vec::new(),
            params: Tuple::unnamed(params),
            results: Tuple::unnamed(results),
            variadic: false,
        }
    }

    pub fn canonical(&self) -> String {
        let mut out = String::new();
        let positional = Renamer::positional().signature(self);
        let _ = write_signature(&mut out, &positional, Qualify::ImportPath, true);
        out
    }
}

/// Rewrites type parameter names, honoring the scope of each binding list.
struct Renamer {
    /// (source name, replacement), innermost last.
    bound: Vec<(String, String)>,
    positional: bool,
}

impl Renamer {
    fn positional() -> Self {
        Self {
            bound: Vec::new(),
            positional: true,
        }
    }

    fn with_bindings(bound: Vec<(String, String)>) -> Self {
        Self {
            bound,
            positional: false,
        }
    }

    fn bind(&mut self, name: &str) -> String {
        let replacement = if self.positional {
            format!("${}", self.bound.len())
        } else {
            name.to_string()
        };
        self.bound.push((name.to_string(), replacement.clone()));
        replacement
    }

    fn lookup(&self, name: &str) -> String {
        self.bound
            .iter()
            .rev()
            .find(|(from, _)| from == name)
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Bind a declaration's parameter list; constraints may refer to any
    /// parameter of the same list.
    fn decls(&mut self, params: &[TypeParamDecl]) -> Vec<TypeParamDecl> {
        let names: Vec<String> = params.iter().map(|p| self.bind(&p.name)).collect();
        params
            .iter()
            .zip(names)
            .map(|(p, name)| TypeParamDecl {
                name,
                constraint: self.ty(&p.constraint),
            })
            .collect()
    }

    fn signature(&mut self, sig: &Signature) -> Signature {
        let depth = self.bound.len();
        let recv_type_params = sig.recv_type_params.iter().map(|p| self.bind(p)).collect();
        let type_params = self.decls(&sig.type_params);
        let params = self.tuple(&sig.params);
        let results = self.tuple(&sig.results);
        self.bound.truncate(depth);

        Signature {
            type_params,
            recv_type_params,
            params,
            results,
            variadic: sig.variadic,
        }
    }

    fn tuple(&mut self, tuple: &Tuple) -> Tuple {
        Tuple {
            vars: tuple
                .vars
                .iter()
                .map(|v| Var {
                    name: v.name.clone(),
                    ty: self.ty(&v.ty),
                })
                .collect(),
        }
    }

    fn ty(&mut self, ty: &Type) -> Type {
        match ty {
            Type::Basic { .. } => ty.clone(),
            Type::TypeParam { name } => Type::TypeParam {
                name: self.lookup(name),
            },
            Type::Named(named) => Type::Named(NamedRef {
                package: named.package.clone(),
                name: named.name.clone(),
                type_args: named.type_args.iter().map(|a| self.ty(a)).collect(),
            }),
            Type::Pointer { elem } => Type::Pointer {
                elem: Box::new(self.ty(elem)),
            },
            Type::Slice { elem } => Type::Slice {
                elem: Box::new(self.ty(elem)),
            },
            Type::Array { len, elem } => Type::Array {
                len: len.clone(),
                elem: Box::new(self.ty(elem)),
            },
            Type::Map { key, value } => Type::Map {
                key: Box::new(self.ty(key)),
                value: Box::new(self.ty(value)),
            },
            Type::Chan { dir, elem } => Type::Chan {
                dir: *dir,
                elem: Box::new(self.ty(elem)),
            },
            Type::Struct(st) => Type::Struct(StructType {
                fields: st
                    .fields
                    .iter()
                    .map(|f| Field {
                        ty: self.ty(&f.ty),
                        ..f.clone()
                    })
                    .collect(),
            }),
            Type::Interface(it) => Type::Interface(InterfaceType {
                methods: it
                    .methods
                    .iter()
                    .map(|m| Method {
                        name: m.name.clone(),
                        sig: self.signature(&m.sig),
                    })
                    .collect(),
                embedded: it.embedded.iter().map(|e| self.ty(e)).collect(),
            }),
            Type::Signature(sig) => Type::Signature(self.signature(sig)),
            Type::Union { terms } => Type::Union {
                terms: terms
                    .iter()
                    .map(|t| Term {
                        tilde: t.tilde,
                        ty: self.ty(&t.ty),
                    })
                    .collect(),
            },
            Type::Defined(def) => {
                let depth = self.bound.len();
                let type_params = self.decls(&def.type_params);
                let underlying = self.ty(&def.underlying);
                self.bound.truncate(depth);
                Type::Defined(Box::new(DefinedType {
                    name: def.name.clone(),
                    type_params,
                    alias: def.alias,
                    underlying,
                }))
            }
        }
    }
}

impl Tuple {
    pub fn unnamed(types: Vec<Type>) -> Self {
        Self {
            vars: types
                .into_iter()
                .map(|ty| Var {
                    name: String::new(),
                    ty,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_type(&mut out, self, Qualify::PackageName)?;
        f.write_str(&out)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_signature(&mut out, self, Qualify::PackageName, true)?;
        f.write_str(&out)
    }
}

/// How cross-package references are spelled.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Qualify {
    /// `context.Context`, for messages.
    PackageName,
    /// `"context".Context`, for identity.
    ImportPath,
}

/// Last import path element, skipping a trailing major version (`/v2`).
pub(crate) fn package_name(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let last = segments.next().unwrap_or(path);
    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}

fn write_type(out: &mut String, ty: &Type, q: Qualify) -> fmt::Result {
    match ty {
        Type::Basic { name } => out.push_str(name),
        Type::Named(named) => write_named(out, named, q)?,
        Type::TypeParam { name } => out.push_str(name),
        Type::Pointer { elem } => {
            out.push('*');
            write_type(out, elem, q)?;
        }
        Type::Slice { elem } => {
            out.push_str("[]");
            write_type(out, elem, q)?;
        }
        Type::Array { len, elem } => {
            write!(out, "[{}]", len)?;
            write_type(out, elem, q)?;
        }
        Type::Map { key, value } => {
            out.push_str("map[");
            write_type(out, key, q)?;
            out.push(']');
            write_type(out, value, q)?;
        }
        Type::Chan { dir, elem } => {
            out.push_str(match dir {
                ChanDir::Both => "chan ",
                ChanDir::Send => "chan<- ",
                ChanDir::Recv => "<-chan ",
            });
            let needs_parens = *dir == ChanDir::Both
                && matches!(elem.as_ref(), Type::Chan { dir: ChanDir::Recv, .. });
            if needs_parens {
                out.push('(');
            }
            write_type(out, elem, q)?;
            if needs_parens {
                out.push(')');
            }
        }
        Type::Struct(st) => {
            out.push_str("struct{");
            for (i, field) in st.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                if !field.embedded {
                    out.push_str(&field.name);
                    out.push(' ');
                }
                write_type(out, &field.ty, q)?;
            }
            out.push('}');
        }
        Type::Interface(it) => write_interface(out, it, q)?,
        Type::Signature(sig) => write_signature(out, sig, q, true)?,
        Type::Union { terms } => {
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                if term.tilde {
                    out.push('~');
                }
                write_type(out, &term.ty, q)?;
            }
        }
        Type::Defined(def) => {
            write!(out, "type {}", def.name)?;
            write_type_params(out, &def.type_params, q)?;
            out.push_str(if def.alias { " = " } else { " " });
            write_type(out, &def.underlying, q)?;
        }
    }
    Ok(())
}

fn write_named(out: &mut String, named: &NamedRef, q: Qualify) -> fmt::Result {
    if let Some(package) = &named.package {
        match q {
            Qualify::PackageName => write!(out, "{}.", package_name(package))?,
            Qualify::ImportPath => write!(out, "{:?}.", package)?,
        }
    }
    out.push_str(&named.name);
    if !named.type_args.is_empty() {
        out.push('[');
        for (i, arg) in named.type_args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_type(out, arg, q)?;
        }
        out.push(']');
    }
    Ok(())
}

fn write_interface(out: &mut String, it: &InterfaceType, q: Qualify) -> fmt::Result {
    if it.methods.is_empty() && it.embedded.is_empty() {
        out.push_str("interface{}");
        return Ok(());
    }

    // Method sets are unordered; sort so identity ignores declaration order.
    let mut methods: Vec<&Method> = it.methods.iter().collect();
    methods.sort_by(|a, b| a.name.cmp(&b.name));

    let mut embedded = Vec::with_capacity(it.embedded.len());
    for ty in &it.embedded {
        let mut s = String::new();
        write_type(&mut s, ty, q)?;
        embedded.push(s);
    }
    embedded.sort();

    out.push_str("interface{");
    let mut first = true;
    for method in methods {
        if !first {
            out.push_str("; ");
        }
        first = false;
        out.push_str(&method.name);
        write_signature(out, &method.sig, q, false)?;
    }
    for s in embedded {
        if !first {
            out.push_str("; ");
        }
        first = false;
        out.push_str(&s);
    }
    out.push('}');
    Ok(())
}

fn write_type_params(out: &mut String, params: &[TypeParamDecl], q: Qualify) -> fmt::Result {
    if params.is_empty() {
        return Ok(());
    }
    out.push('[');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "{} ", param.name)?;
        write_type(out, &param.constraint, q)?;
    }
    out.push(']');
    Ok(())
}

fn write_signature(out: &mut String, sig: &Signature, q: Qualify, keyword: bool) -> fmt::Result {
    if keyword {
        out.push_str("func");
    }
    write_type_params(out, &sig.type_params, q)?;

    out.push('(');
    let last = sig.params.vars.len().saturating_sub(1);
    for (i, var) in sig.params.vars.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match (&var.ty, sig.variadic && i == last) {
            (Type::Slice { elem }, true) => {
                out.push_str("...");
                write_type(out, elem, q)?;
            }
            (ty, _) => write_type(out, ty, q)?,
        }
    }
    out.push(')');

    match sig.results.vars.as_slice() {
        [] => {}
        [single] => {
            out.push(' ');
            write_type(out, &single.ty, q)?;
        }
        many => {
            out.push_str(" (");
            for (i, var) in many.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_type(out, &var.ty, q)?;
            }
            out.push(')');
        }
    }
    Ok(())
}
