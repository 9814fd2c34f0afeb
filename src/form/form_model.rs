use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Field model
// ============================================================================

/// One selectable option of a select/radio/combobox control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// Fillable control types. Hidden/disabled controls are filtered out by the
/// extraction collaborator before a snapshot ever reaches us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Tel,
    Textarea,
    Select,
    Checkbox,
    Radio,
    File,
    Combobox,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Tel => "tel",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::File => "file",
            FieldType::Combobox => "combobox",
        };
        write!(f, "{}", name)
    }
}

/// One fillable control as reported by the extraction collaborator.
///
/// `selector` is an opaque locator: stable across snapshots of the same
/// rendered element, unique within one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub selector: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Empty for free-text field types.
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub current_value: String,
    /// Combobox only: locator of the associated ARIA listbox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listbox_locator: Option<String>,
    /// Combobox only: true when options are not rendered until the listbox
    /// opens and must be read live at fill time.
    #[serde(default)]
    pub options_deferred: bool,
}

// ============================================================================
// Repeatable sections
// ============================================================================

/// Fields structurally contained by one rendered entry of a section,
/// recorded by the extraction collaborator at snapshot time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionEntry {
    #[serde(default)]
    pub field_selectors: Vec<String>,
}

/// A repeatable group of fields requiring an explicit "add" action to
/// materialize additional entries (e.g. Work Experience, Education).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub add_action_locator: String,
    /// Entries already rendered when the snapshot was taken.
    #[serde(default)]
    pub entries: Vec<SectionEntry>,
    /// Which profile list this section fills from, resolved during analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_profile_key: Option<String>,
}

impl Section {
    pub fn existing_entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Structural containment: a field belongs to this section iff one of the
    /// recorded entries owns its selector. Never inferred from selector text.
    pub fn owns(&self, selector: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.field_selectors.iter().any(|s| s == selector))
    }
}

// ============================================================================
// Snapshot
// ============================================================================

fn default_captured_at() -> DateTime<Utc> {
    Utc::now()
}

/// One immutable point-in-time reading of a form's fillable structure.
///
/// A new page action requires a brand-new snapshot; snapshots are never
/// patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSnapshot {
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default = "default_captured_at")]
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Default for FormSnapshot {
    fn default() -> FormSnapshot {
        FormSnapshot {
            source_url: String::new(),
            page_title: String::new(),
            captured_at: Utc::now(),
            fields: Vec::new(),
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("duplicate selector in snapshot: {0}")]
    DuplicateSelector(String),
    #[error("section '{section}' references unknown selector: {selector}")]
    UnknownSectionSelector { section: String, selector: String },
}

impl FormSnapshot {
    /// Validate the snapshot invariants: selectors are unique, and every
    /// selector a section entry claims exists as a field.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.selector.as_str()) {
                return Err(ModelError::DuplicateSelector(field.selector.clone()));
            }
        }
        for section in &self.sections {
            for entry in &section.entries {
                for selector in &entry.field_selectors {
                    if !seen.contains(selector.as_str()) {
                        return Err(ModelError::UnknownSectionSelector {
                            section: section.name.clone(),
                            selector: selector.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn selector_set(&self) -> HashSet<String> {
        self.fields.iter().map(|f| f.selector.clone()).collect()
    }
}

// ============================================================================
// Mapping (analysis result)
// ============================================================================

/// A field plus the value the mapping service proposed for it. Only
/// meaningful relative to the snapshot it was derived from (same selector
/// space).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedField {
    pub selector: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listbox_locator: Option<String>,
    #[serde(default)]
    pub options_deferred: bool,
    /// Value to fill, empty when the field could not be mapped.
    #[serde(default)]
    pub mapped_value: String,
    /// Mapping service confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// Dotted profile attribute the value came from, e.g. "personal_info.email".
    #[serde(default)]
    pub source_attribute: String,
}

impl MappedField {
    pub fn is_mapped(&self) -> bool {
        !self.mapped_value.is_empty()
    }

    /// Build an unmapped carrier for a field the service could not resolve.
    pub fn unmapped(field: &FormField) -> MappedField {
        MappedField {
            selector: field.selector.clone(),
            field_type: field.field_type,
            label: field.label.clone(),
            required: field.required,
            options: field.options.clone(),
            listbox_locator: field.listbox_locator.clone(),
            options_deferred: field.options_deferred,
            mapped_value: String::new(),
            confidence: 0.0,
            source_attribute: String::new(),
        }
    }
}

/// Full analysis of a snapshot: every field annotated with a proposed value,
/// sections carried through with their profile key resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormMapping {
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub fields: Vec<MappedField>,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Labels the mapping service could not resolve to any profile value.
    #[serde(default)]
    pub unmapped_labels: Vec<String>,
}

// ============================================================================
// Fill outcome
// ============================================================================

/// One failed field or aborted section, with a machine-readable reason.
/// `scope` is the field selector, or the section name for section aborts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillError {
    pub scope: String,
    pub reason: String,
}

/// Terminal summary of one fill run. Accumulated across all phases; partial
/// results survive a run-level abort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillOutcome {
    pub filled: usize,
    pub failed: usize,
    #[serde(default)]
    pub errors: Vec<FillError>,
}

impl FillOutcome {
    pub fn record_fill(&mut self) {
        self.filled += 1;
    }

    pub fn record_failure(&mut self, scope: &str, reason: &str) {
        self.failed += 1;
        self.errors.push(FillError {
            scope: scope.to_string(),
            reason: reason.to_string(),
        });
    }
}
