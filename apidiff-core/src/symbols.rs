//! Symbol tables: the exported surface of one package at one revision.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::TableError;
use crate::types::Type;

/// Declaration kind of an exported symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Type,
    Func,
    Method,
    Const,
    Var,
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Type => "type",
            DeclKind::Func => "func",
            DeclKind::Method => "method",
            DeclKind::Const => "const",
            DeclKind::Var => "var",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exported declaration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Symbol {
    /// Package-relative name; receiver-qualified for methods (`(*T).M`).
    pub name: String,
    pub kind: DeclKind,
    /// Receiver spelling for methods (`*T` or `T`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: DeclKind, ty: Type) -> Self {
        Self {
            name: name.into(),
            kind,
            receiver: None,
            ty,
        }
    }

    /// Method symbol keyed by receiver: `(*T).M` or `T.M`.
    pub fn method(receiver: &str, method: &str, ty: Type) -> Self {
        Self {
            name: method_key(receiver, method),
            kind: DeclKind::Method,
            receiver: Some(receiver.to_string()),
            ty,
        }
    }

    /// The identifier that decides visibility: the method name for methods.
    pub fn identifier(&self) -> &str {
        match self.kind {
            DeclKind::Method => self.name.rsplit('.').next().unwrap_or(&self.name),
            _ => &self.name,
        }
    }
}

/// Key of a method symbol.
pub fn method_key(receiver: &str, method: &str) -> String {
    if receiver.starts_with('*') {
        format!("({}).{}", receiver, method)
    } else {
        format!("{}.{}", receiver, method)
    }
}

/// Go visibility rule: exported iff the first character is an uppercase
/// letter. The blank identifier is never exported.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Exported symbols of one package, keyed by qualified name.
///
/// Immutable once built; iteration order is lexicographic on the key.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SymbolTable {
    package: String,
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Qualified names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

/// Builds a [`SymbolTable`], enforcing visibility and key uniqueness.
#[derive(Debug)]
pub struct SymbolTableBuilder {
    package: String,
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolTableBuilder {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            symbols: BTreeMap::new(),
        }
    }

    /// Insert a symbol. Unexported symbols are dropped (`Ok(false)`);
    /// a second exported symbol with the same key is an invariant violation.
    pub fn insert(&mut self, symbol: Symbol) -> Result<bool, TableError> {
        if !is_exported(symbol.identifier()) {
            tracing::trace!("skipping unexported {}", symbol.name);
            return Ok(false);
        }
        if let Some(receiver) = &symbol.receiver {
            if !is_exported(receiver.trim_start_matches('*')) {
                tracing::trace!("skipping method on unexported receiver {}", symbol.name);
                return Ok(false);
            }
        }
        if self.symbols.contains_key(&symbol.name) {
            return Err(TableError::DuplicateSymbol {
                package: self.package.clone(),
                name: symbol.name,
            });
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(true)
    }

    pub fn build(self) -> SymbolTable {
        SymbolTable {
            package: self.package,
            symbols: self.symbols,
        }
    }
}

/// Build a table from an iterator of symbols.
pub fn table_from<I>(package: &str, symbols: I) -> Result<SymbolTable, TableError>
where
    I: IntoIterator<Item = Symbol>,
{
    let mut builder = SymbolTableBuilder::new(package);
    for symbol in symbols {
        builder.insert(symbol)?;
    }
    Ok(builder.build())
}
