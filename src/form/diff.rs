use std::collections::HashSet;

use crate::form::form_model::{FormField, FormSnapshot};

/// Fields present in `snapshot` whose selector is absent from `baseline`,
/// in snapshot order.
///
/// The diff is add-only by construction: fields that disappeared from the
/// page are simply no longer in the snapshot and never show up here. An
/// empty result means the last action rendered nothing new.
pub fn new_fields<'a>(
    baseline: &HashSet<String>,
    snapshot: &'a FormSnapshot,
) -> Vec<&'a FormField> {
    snapshot
        .fields
        .iter()
        .filter(|f| !baseline.contains(&f.selector))
        .collect()
}

/// Extend a baseline with every selector of a snapshot. Used after each
/// expansion round so the next diff only reports genuinely new fields.
pub fn absorb(baseline: &mut HashSet<String>, snapshot: &FormSnapshot) {
    for field in &snapshot.fields {
        baseline.insert(field.selector.clone());
    }
}
