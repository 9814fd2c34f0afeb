use tracing::debug;

use crate::actuator::actuator::{FillActuator, FillFailure};
use crate::form::form_model::{FieldType, FormField, MappedField};
use crate::matcher::matcher::match_option;

// ============================================================================
// Single-field fill dispatch
// ============================================================================

const TRUTHY: &[&str] = &["true", "yes", "1", "checked"];

pub struct FieldFiller<'a> {
    pub actuator: &'a dyn FillActuator,
    pub match_threshold: u8,
    pub resume_path: &'a str,
}

impl FieldFiller<'_> {
    /// Fill one mapped field with the appropriate actuator primitive.
    /// Failures are field-level: the caller records them and moves on.
    pub async fn fill(&self, mapped: &MappedField) -> Result<(), FillFailure> {
        let field = descriptor(mapped);
        let value = mapped.mapped_value.as_str();

        match field.field_type {
            FieldType::Text | FieldType::Email | FieldType::Tel | FieldType::Textarea => {
                self.actuator.fill_text(&field, value).await
            }
            FieldType::Select => {
                let (option, score) = match_option(value, &field.options, self.match_threshold)
                    .ok_or(FillFailure::NoMatchingOption)?;
                debug!(selector = %field.selector, %value, option = %option.text, score, "select matched");
                self.actuator.select_native(&field, &option.value).await
            }
            FieldType::Checkbox => {
                let checked = TRUTHY.contains(&value.to_lowercase().as_str());
                self.actuator.set_checked(&field, checked).await
            }
            FieldType::Radio => {
                // Radios with a known option set resolve through the matcher;
                // otherwise the proposed value is used verbatim.
                let resolved = if field.options.is_empty() {
                    value.to_string()
                } else {
                    match_option(value, &field.options, self.match_threshold)
                        .ok_or(FillFailure::NoMatchingOption)?
                        .0
                        .value
                        .clone()
                };
                self.actuator.check_radio(&field, &resolved).await
            }
            FieldType::File => self.actuator.upload_file(&field, self.resume_path).await,
            FieldType::Combobox => self.fill_combobox(&field, value).await,
        }
    }

    /// Combobox sequence: open, read live options when deferred, match,
    /// click. The listbox is closed again on every failure after the open.
    async fn fill_combobox(&self, field: &FormField, value: &str) -> Result<(), FillFailure> {
        self.actuator.open_combobox(field).await?;

        let live_options;
        let options = if field.options_deferred || field.options.is_empty() {
            live_options = match self.actuator.read_combobox_options(field).await {
                Ok(options) => options,
                Err(e) => {
                    let _ = self.actuator.close_combobox(field).await;
                    return Err(e);
                }
            };
            &live_options
        } else {
            &field.options
        };

        let Some((option, score)) = match_option(value, options, self.match_threshold) else {
            let _ = self.actuator.close_combobox(field).await;
            return Err(FillFailure::NoMatchingOption);
        };
        debug!(selector = %field.selector, %value, option = %option.text, score, "combobox matched");

        if let Err(e) = self.actuator.click_combobox_option(field, option).await {
            let _ = self.actuator.close_combobox(field).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Rebuild the plain field descriptor the actuator works with.
pub fn descriptor(mapped: &MappedField) -> FormField {
    FormField {
        selector: mapped.selector.clone(),
        field_type: mapped.field_type,
        label: mapped.label.clone(),
        required: mapped.required,
        options: mapped.options.clone(),
        current_value: String::new(),
        listbox_locator: mapped.listbox_locator.clone(),
        options_deferred: mapped.options_deferred,
    }
}
