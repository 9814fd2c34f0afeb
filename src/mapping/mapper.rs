use async_trait::async_trait;
use tracing::info;

use crate::form::form_model::{FormField, FormMapping, FormSnapshot, MappedField, Section};
use crate::form::section::resolve_profile_key;
use crate::profile::context::full_context;
use crate::profile::profile_model::UserProfile;

// ============================================================================
// MappingBackend trait — the seam to the external mapping service
// ============================================================================

/// Raw result of one backend call: proposed values for a set of fields, plus
/// the labels it could not resolve.
#[derive(Debug, Clone, Default)]
pub struct BackendAnalysis {
    pub fields: Vec<MappedField>,
    pub unmapped_labels: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// Transport-level failure. Aborts the whole run.
    #[error("mapping service unreachable: {0}")]
    Unreachable(String),
}

/// Proposes a value for each field given a profile context. Must be callable
/// on an arbitrary subset of fields with a single-entry context, which is how
/// section entries are analyzed.
#[async_trait]
pub trait MappingBackend: Send + Sync {
    async fn map_fields(
        &self,
        fields: &[FormField],
        context: &str,
    ) -> Result<BackendAnalysis, MappingError>;
}

// ============================================================================
// Analysis pipeline
// ============================================================================

/// Full-form analysis: map every field against the whole profile and resolve
/// each section's profile key from its heading.
pub async fn analyze_snapshot(
    backend: &dyn MappingBackend,
    snapshot: &FormSnapshot,
    profile: &UserProfile,
) -> Result<FormMapping, MappingError> {
    let context = full_context(profile);
    let analysis = backend.map_fields(&snapshot.fields, &context).await?;
    let fields = align(&snapshot.fields, analysis.fields);

    let sections: Vec<Section> = snapshot
        .sections
        .iter()
        .map(|s| Section {
            resolved_profile_key: resolve_profile_key(&s.name),
            ..s.clone()
        })
        .collect();

    let mapping = FormMapping {
        source_url: snapshot.source_url.clone(),
        fields,
        sections,
        unmapped_labels: analysis.unmapped_labels,
    };
    info!(
        mapped = mapping.fields.iter().filter(|f| f.is_mapped()).count(),
        unmapped = mapping.unmapped_labels.len(),
        sections = mapping.sections.len(),
        url = %mapping.source_url,
        "form analysis complete"
    );
    Ok(mapping)
}

/// Scoped analysis of a field subset (one section entry) against a
/// single-entry context.
pub async fn analyze_scoped(
    backend: &dyn MappingBackend,
    fields: &[FormField],
    context: &str,
) -> Result<Vec<MappedField>, MappingError> {
    let analysis = backend.map_fields(fields, context).await?;
    Ok(align(fields, analysis.fields))
}

/// Re-align backend output with the input fields: keep input order, carry an
/// unmapped placeholder for anything the backend dropped, and discard
/// anything it invented (mappings are only meaningful in the snapshot's
/// selector space).
fn align(inputs: &[FormField], mut mapped: Vec<MappedField>) -> Vec<MappedField> {
    inputs
        .iter()
        .map(|field| {
            match mapped.iter().position(|m| m.selector == field.selector) {
                Some(pos) => {
                    let m = mapped.swap_remove(pos);
                    MappedField {
                        // Descriptor always comes from the snapshot; the
                        // backend only contributes the proposal.
                        mapped_value: m.mapped_value,
                        confidence: m.confidence.clamp(0.0, 1.0),
                        source_attribute: m.source_attribute,
                        ..MappedField::unmapped(field)
                    }
                }
                None => MappedField::unmapped(field),
            }
        })
        .collect()
}

// ============================================================================
// Mock backend — label-keyword mapping, no LLM needed
// ============================================================================

/// Deterministic backend for offline analysis and tests: maps fields by
/// label keywords against the profile's personal info.
pub struct MockMapper {
    pub profile: UserProfile,
}

impl MockMapper {
    fn propose(&self, label: &str) -> Option<(String, &'static str)> {
        let l = label.to_lowercase();
        let p = &self.profile.personal_info;
        if l.contains("email") {
            return Some((p.email.clone(), "personal_info.email"));
        }
        if l.contains("first name") {
            return Some((p.first_name.clone(), "personal_info.first_name"));
        }
        if l.contains("last name") || l.contains("surname") {
            return Some((p.last_name.clone(), "personal_info.last_name"));
        }
        if l.contains("name") {
            return Some((self.profile.full_name(), "personal_info"));
        }
        if l.contains("phone") || l.contains("tel") {
            return Some((p.phone.clone(), "personal_info.phone"));
        }
        if l.contains("city") {
            return Some((p.address.city.clone(), "personal_info.address.city"));
        }
        if l.contains("country") {
            return Some((p.address.country.clone(), "personal_info.address.country"));
        }
        if l.contains("linkedin") {
            return Some((p.linkedin_url.clone(), "personal_info.linkedin_url"));
        }
        if l.contains("resume") || l.contains("cv") {
            return Some(("resume".to_string(), "resume"));
        }
        None
    }
}

#[async_trait]
impl MappingBackend for MockMapper {
    async fn map_fields(
        &self,
        fields: &[FormField],
        _context: &str,
    ) -> Result<BackendAnalysis, MappingError> {
        let mut analysis = BackendAnalysis::default();
        for field in fields {
            match self.propose(&field.label) {
                Some((value, source)) if !value.is_empty() => {
                    analysis.fields.push(MappedField {
                        mapped_value: value,
                        confidence: 0.9,
                        source_attribute: source.to_string(),
                        ..MappedField::unmapped(field)
                    });
                }
                _ => analysis.unmapped_labels.push(field.label.clone()),
            }
        }
        Ok(analysis)
    }
}
