//! Per-symbol classification of two symbol tables.

use std::collections::BTreeSet;

use super::changes::{ChangeRecord, PackageChanges};
use super::comparator::{compare_types, DiffPolicy, TypeDelta};
use crate::symbols::{DeclKind, Symbol, SymbolTable};
use crate::types::identical;

/// Classify every symbol present in either table.
///
/// Records come out ordered by symbol name; symbols that did not change
/// produce nothing.
pub fn classify(old: &SymbolTable, new: &SymbolTable, policy: &DiffPolicy) -> Vec<ChangeRecord> {
    let names: BTreeSet<&str> = old.names().chain(new.names()).collect();

    names
        .into_iter()
        .filter_map(|name| classify_symbol(name, old.get(name), new.get(name), policy))
        .collect()
}

/// Classify a single symbol given its presence on each side.
pub fn classify_symbol(
    name: &str,
    old: Option<&Symbol>,
    new: Option<&Symbol>,
    policy: &DiffPolicy,
) -> Option<ChangeRecord> {
    match (old, new) {
        (None, None) => None,
        (None, Some(_)) => Some(ChangeRecord::added(name)),
        (Some(_), None) => Some(ChangeRecord::removed(name)),
        (Some(old), Some(new)) => compare_symbols(name, old, new, policy),
    }
}

fn compare_symbols(
    name: &str,
    old: &Symbol,
    new: &Symbol,
    policy: &DiffPolicy,
) -> Option<ChangeRecord> {
    if old.kind != new.kind {
        let description = format!("changed from {} to {}", old.kind, new.kind);
        return Some(ChangeRecord::changed(name, false, &description));
    }

    let delta = match old.kind {
        DeclKind::Type | DeclKind::Func | DeclKind::Method => {
            compare_types(&old.ty, &new.ty, policy)
        }
        // A value's type flows into every use site, so there is no widening.
        DeclKind::Const | DeclKind::Var => {
            if identical(&old.ty, &new.ty) {
                TypeDelta::Identical
            } else {
                TypeDelta::IncompatibleChange(format!("changed from {} to {}", old.ty, new.ty))
            }
        }
    };

    match delta {
        TypeDelta::Identical => None,
        TypeDelta::CompatibleChange(reason) => Some(ChangeRecord::changed(name, true, &reason)),
        TypeDelta::IncompatibleChange(reason) => Some(ChangeRecord::changed(name, false, &reason)),
    }
}

/// Classify one package. Absence on one side short-circuits to a single
/// package-level record; absence on both sides yields nothing.
pub fn classify_package(
    package: &str,
    old: Option<&SymbolTable>,
    new: Option<&SymbolTable>,
    policy: &DiffPolicy,
) -> Option<PackageChanges> {
    let changes = match (old, new) {
        (None, None) => return None,
        (None, Some(_)) => vec![ChangeRecord::package_added(package)],
        (Some(_), None) => vec![ChangeRecord::package_removed(package)],
        (Some(old), Some(new)) => classify(old, new, policy),
    };

    Some(PackageChanges {
        package: package.to_string(),
        changes,
    })
}
