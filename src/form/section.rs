use std::collections::HashSet;

use crate::form::form_model::{MappedField, Section};

// Section heading keywords -> profile list keys. Matching is on the heading
// text, never on field selectors.
const SECTION_PROFILE_KEYWORDS: &[(&str, &str)] = &[
    ("work experience", "experience"),
    ("employment", "experience"),
    ("education", "education"),
    ("certification", "certifications"),
    ("language", "languages"),
];

/// Resolve a section heading to the profile list it fills from.
/// Returns `None` for sections we have no data for (they are skipped).
pub fn resolve_profile_key(section_name: &str) -> Option<String> {
    let name_lower = section_name.to_lowercase();
    SECTION_PROFILE_KEYWORDS
        .iter()
        .find(|(keyword, _)| name_lower.contains(keyword))
        .map(|(_, key)| (*key).to_string())
}

/// Selectors owned by any section entry, i.e. everything the flat-fill phase
/// must leave alone. Membership is structural containment recorded at
/// extraction time.
pub fn section_owned_selectors(sections: &[Section]) -> HashSet<String> {
    sections
        .iter()
        .flat_map(|s| s.entries.iter())
        .flat_map(|e| e.field_selectors.iter().cloned())
        .collect()
}

/// Mapped fields owned by entry `entry_idx` of `section`, in mapping order.
pub fn entry_fields<'a>(
    section: &Section,
    entry_idx: usize,
    fields: &'a [MappedField],
) -> Vec<&'a MappedField> {
    let Some(entry) = section.entries.get(entry_idx) else {
        return Vec::new();
    };
    fields
        .iter()
        .filter(|f| entry.field_selectors.iter().any(|s| *s == f.selector))
        .collect()
}
