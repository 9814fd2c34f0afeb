use async_trait::async_trait;

use crate::form::form_model::{FormField, SelectOption};

// ============================================================================
// FillActuator trait — the seam to the external browser driver
// ============================================================================

/// Why a single field-level action failed. Field-level only: none of these
/// ever aborts a phase on their own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FillFailure {
    #[error("driver rejected the value: {0}")]
    Rejected(String),
    #[error("combobox listbox did not appear before the open timeout")]
    TimeoutWaitingForListbox,
    #[error("no option matched the proposed value")]
    NoMatchingOption,
    #[error("matched option could not be clicked")]
    OptionClickFailed,
    #[error("upload target missing: {0}")]
    UploadTargetMissing(String),
    #[error("action failed: {0}")]
    ActionFailed(String),
    #[error("driver error: {0}")]
    Driver(String),
}

impl FillFailure {
    /// Stable machine-readable code, recorded in `FillOutcome.errors`.
    pub fn code(&self) -> &'static str {
        match self {
            FillFailure::Rejected(_) => "value_rejected",
            FillFailure::TimeoutWaitingForListbox => "timeout_waiting_for_listbox",
            FillFailure::NoMatchingOption => "no_matching_option",
            FillFailure::OptionClickFailed => "option_click_failed",
            FillFailure::UploadTargetMissing(_) => "upload_target_missing",
            FillFailure::ActionFailed(_) => "action_failed",
            FillFailure::Driver(_) => "driver_error",
        }
    }
}

/// Executes single field-level actions against the live page. The engine
/// composes these primitives; it never talks to the page any other way.
///
/// Calls are sequential by contract — a fill may trigger page-level side
/// effects, so the engine never issues two concurrently.
#[async_trait]
pub trait FillActuator: Send + Sync {
    /// Fill a text-like control (text, email, tel, textarea).
    async fn fill_text(&self, field: &FormField, value: &str) -> Result<(), FillFailure>;

    /// Select a native `<select>` option by its value attribute.
    async fn select_native(&self, field: &FormField, option_value: &str)
    -> Result<(), FillFailure>;

    /// Check or uncheck a checkbox.
    async fn set_checked(&self, field: &FormField, checked: bool) -> Result<(), FillFailure>;

    /// Check the radio input carrying the given value.
    async fn check_radio(&self, field: &FormField, value: &str) -> Result<(), FillFailure>;

    /// Attach a file to an upload input.
    async fn upload_file(&self, field: &FormField, path: &str) -> Result<(), FillFailure>;

    /// Trigger a page action by locator (section "add" buttons).
    async fn trigger_action(&self, locator: &str) -> Result<(), FillFailure>;

    // ---- Combobox primitive sequence ------------------------------------

    /// Open the combobox and wait for its listbox to appear. A listbox that
    /// never materializes is `TimeoutWaitingForListbox`; there is no retry.
    async fn open_combobox(&self, field: &FormField) -> Result<(), FillFailure>;

    /// Read the live options of an open combobox.
    async fn read_combobox_options(
        &self,
        field: &FormField,
    ) -> Result<Vec<SelectOption>, FillFailure>;

    /// Click one option of an open combobox.
    async fn click_combobox_option(
        &self,
        field: &FormField,
        option: &SelectOption,
    ) -> Result<(), FillFailure>;

    /// Close an open combobox without selecting (cleanup after a failure).
    async fn close_combobox(&self, field: &FormField) -> Result<(), FillFailure>;
}
