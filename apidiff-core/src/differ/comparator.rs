//! Structural comparison of type descriptors.
//!
//! [`compare_types`] decides whether replacing `old` with `new` at a
//! symbol's declared type is invisible, compatible for existing callers, or
//! breaking. Widening is only granted at the top level of a declaration
//! (struct fields added, interface methods added); anything nested inside a
//! composite type is compared by identity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{
    identical, DefinedType, InterfaceType, Signature, StructType, Type, TypeKind, TypeParamDecl,
};

/// How callers construct struct values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrder {
    /// Keyed composite literals: reordering existing fields is compatible.
    #[default]
    Keyed,
    /// Positional composite literals: reordering existing fields breaks.
    Positional,
}

/// How external code relates to exported interfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceAdditions {
    /// Callers only call interface methods: adding one is compatible.
    #[default]
    Consumed,
    /// Callers implement the interface: adding a method breaks them.
    Implemented,
}

/// Configurable compatibility policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPolicy {
    #[serde(default)]
    pub field_order: FieldOrder,
    #[serde(default)]
    pub interface_additions: InterfaceAdditions,
}

/// Outcome of comparing two descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDelta {
    Identical,
    CompatibleChange(String),
    IncompatibleChange(String),
}

impl TypeDelta {
    pub fn is_identical(&self) -> bool {
        matches!(self, TypeDelta::Identical)
    }

    pub fn is_compatible(&self) -> bool {
        !matches!(self, TypeDelta::IncompatibleChange(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TypeDelta::Identical => None,
            TypeDelta::CompatibleChange(r) | TypeDelta::IncompatibleChange(r) => Some(r),
        }
    }
}

/// Individual findings for one symbol, folded into a single verdict.
#[derive(Default)]
struct Notes {
    items: Vec<(bool, String)>,
}

impl Notes {
    fn compatible(&mut self, note: String) {
        self.items.push((true, note));
    }

    fn breaking(&mut self, note: String) {
        self.items.push((false, note));
    }

    fn push(&mut self, compatible: bool, note: String) {
        self.items.push((compatible, note));
    }

    fn finish(self) -> TypeDelta {
        if self.items.is_empty() {
            return TypeDelta::Identical;
        }
        let compatible = self.items.iter().all(|(ok, _)| *ok);
        let text = self
            .items
            .into_iter()
            .map(|(_, note)| note)
            .collect::<Vec<_>>()
            .join("; ");
        if compatible {
            TypeDelta::CompatibleChange(text)
        } else {
            TypeDelta::IncompatibleChange(text)
        }
    }
}

/// Compare the declared types of one symbol across two revisions.
pub fn compare_types(old: &Type, new: &Type, policy: &DiffPolicy) -> TypeDelta {
    let mut notes = Notes::default();
    diff_into(old, new, policy, &mut notes);
    notes.finish()
}

fn diff_into(old: &Type, new: &Type, policy: &DiffPolicy, notes: &mut Notes) {
    if identical(old, new) {
        return;
    }

    match old {
        Type::Defined(a) => match new {
            Type::Defined(b) => diff_defined(a, b, policy, notes),
            _ => kind_changed(old, new, notes),
        },
        Type::Struct(a) => match new {
            Type::Struct(b) => diff_structs(a, b, policy, notes),
            _ => kind_changed(old, new, notes),
        },
        Type::Interface(a) => match new {
            Type::Interface(b) => diff_interfaces(a, b, policy, notes),
            _ => kind_changed(old, new, notes),
        },
        Type::Signature(a) => match new {
            Type::Signature(b) => diff_signatures(a, b, notes),
            _ => kind_changed(old, new, notes),
        },
        // Identity-only kinds: any difference is a change callers can see.
        Type::Basic { .. }
        | Type::Named(_)
        | Type::TypeParam { .. }
        | Type::Pointer { .. }
        | Type::Slice { .. }
        | Type::Array { .. }
        | Type::Map { .. }
        | Type::Chan { .. }
        | Type::Union { .. } => {
            notes.breaking(format!("changed from {} to {}", old, new));
        }
    }
}

fn is_bulky(kind: TypeKind) -> bool {
    matches!(kind, TypeKind::Struct | TypeKind::Interface | TypeKind::Defined)
}

fn kind_changed(old: &Type, new: &Type, notes: &mut Notes) {
    let (old_kind, new_kind) = (old.kind(), new.kind());
    if is_bulky(old_kind) || is_bulky(new_kind) {
        notes.breaking(format!("changed from {} to {}", old_kind, new_kind));
    } else {
        notes.breaking(format!("changed from {} to {}", old, new));
    }
}

fn diff_defined(old: &DefinedType, new: &DefinedType, policy: &DiffPolicy, notes: &mut Notes) {
    match (old.alias, new.alias) {
        (false, true) => notes.breaking("changed from defined type to alias".to_string()),
        (true, false) => notes.breaking("changed from alias to defined type".to_string()),
        _ => {}
    }

    // Parameters are matched by position; spell the new side with the old
    // names so a consistent rename compares equal.
    let renames: Vec<(String, String)> = if old.type_params.len() == new.type_params.len() {
        new.type_params
            .iter()
            .zip(&old.type_params)
            .map(|(n, o)| (n.name.clone(), o.name.clone()))
            .collect()
    } else {
        Vec::new()
    };

    let same_params = old.type_params.len() == new.type_params.len()
        && old.type_params.iter().zip(&new.type_params).all(|(o, n)| {
            identical(&o.constraint, &n.constraint.rename_type_params(&renames))
        });
    if !same_params {
        notes.breaking(format!(
            "type parameters changed from [{}] to [{}]",
            render_type_params(&old.type_params),
            render_type_params(&new.type_params)
        ));
    }

    let new_underlying = new.underlying.rename_type_params(&renames);
    diff_into(&old.underlying, &new_underlying, policy, notes);
}

fn render_type_params(params: &[TypeParamDecl]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", p.name, p.constraint))
        .collect::<Vec<_>>()
        .join(", ")
}

fn diff_structs(old: &StructType, new: &StructType, policy: &DiffPolicy, notes: &mut Notes) {
    for field in old.exported_fields() {
        let Some(counterpart) = new.field(&field.name) else {
            notes.breaking(format!("field {} removed", field.name));
            continue;
        };

        if !identical(&field.ty, &counterpart.ty) {
            notes.breaking(format!(
                "field {} changed from {} to {}",
                field.name, field.ty, counterpart.ty
            ));
        }
        match (field.embedded, counterpart.embedded) {
            (true, false) => notes.breaking(format!("field {} no longer embedded", field.name)),
            (false, true) => notes.compatible(format!("field {} now embedded", field.name)),
            _ => {}
        }
    }

    for field in new.exported_fields() {
        if old.field(&field.name).is_none() {
            notes.compatible(format!("field {} added", field.name));
        }
    }

    // Relative order of the exported fields present on both sides.
    let old_order: Vec<&str> = old
        .exported_fields()
        .filter(|f| new.field(&f.name).is_some())
        .map(|f| f.name.as_str())
        .collect();
    let new_order: Vec<&str> = new
        .exported_fields()
        .filter(|f| old.field(&f.name).is_some())
        .map(|f| f.name.as_str())
        .collect();
    if old_order != new_order {
        let compatible = policy.field_order == FieldOrder::Keyed;
        notes.push(compatible, "fields reordered".to_string());
    }
}

fn diff_interfaces(
    old: &InterfaceType,
    new: &InterfaceType,
    policy: &DiffPolicy,
    notes: &mut Notes,
) {
    let additions_ok = policy.interface_additions == InterfaceAdditions::Consumed;

    let mut old_methods: Vec<_> = old.methods.iter().collect();
    old_methods.sort_by(|a, b| a.name.cmp(&b.name));
    for method in old_methods {
        match new.method(&method.name) {
            None => notes.breaking(format!("method {} removed", method.name)),
            Some(other) if !identical_signatures(&method.sig, &other.sig) => {
                notes.breaking(format!(
                    "method {} changed from {} to {}",
                    method.name, method.sig, other.sig
                ));
            }
            Some(_) => {}
        }
    }

    let mut new_methods: Vec<_> = new.methods.iter().collect();
    new_methods.sort_by(|a, b| a.name.cmp(&b.name));
    for method in new_methods {
        if old.method(&method.name).is_none() {
            notes.push(additions_ok, format!("method {} added", method.name));
        }
    }

    let old_embeds: BTreeSet<String> = old.embedded.iter().map(|t| t.canonical()).collect();
    let new_embeds: BTreeSet<String> = new.embedded.iter().map(|t| t.canonical()).collect();
    for ty in &old.embedded {
        if !new_embeds.contains(&ty.canonical()) {
            notes.breaking(format!("embedded {} removed", ty));
        }
    }
    for ty in &new.embedded {
        if !old_embeds.contains(&ty.canonical()) {
            notes.push(additions_ok, format!("embedded {} added", ty));
        }
    }
}

fn identical_signatures(a: &Signature, b: &Signature) -> bool {
    a.canonical() == b.canonical()
}

/// Call sites are positional: any parameter or result difference breaks.
fn diff_signatures(old: &Signature, new: &Signature, notes: &mut Notes) {
    if !identical_signatures(old, new) {
        notes.breaking(format!("changed from {} to {}", old, new));
    }
}
