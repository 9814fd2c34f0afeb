#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use form_autofill::actuator::actuator::{FillActuator, FillFailure};
use form_autofill::channel::channel::{ChannelError, SnapshotSource};
use form_autofill::form::form_model::{
    FieldType, FillOutcome, FormField, FormMapping, FormSnapshot, MappedField, Section,
    SectionEntry, SelectOption,
};
use form_autofill::mapping::mapper::{BackendAnalysis, MappingBackend, MappingError};
use form_autofill::orchestrator::orchestrator::{FillSettings, Orchestrator};
use form_autofill::profile::profile_model::{Experience, PersonalInfo, UserProfile};

// =========================================================================
// Builders
// =========================================================================

pub fn field(selector: &str, field_type: FieldType, label: &str) -> FormField {
    FormField {
        selector: selector.to_string(),
        field_type,
        label: label.to_string(),
        required: false,
        options: Vec::new(),
        current_value: String::new(),
        listbox_locator: None,
        options_deferred: false,
    }
}

pub fn text_field(selector: &str, label: &str) -> FormField {
    field(selector, FieldType::Text, label)
}

pub fn option(value: &str, text: &str) -> SelectOption {
    SelectOption {
        value: value.to_string(),
        text: text.to_string(),
    }
}

pub fn snapshot(fields: Vec<FormField>) -> FormSnapshot {
    FormSnapshot {
        source_url: "https://jobs.example.com/apply".to_string(),
        fields,
        ..FormSnapshot::default()
    }
}

pub fn mapped(selector: &str, field_type: FieldType, label: &str, value: &str) -> MappedField {
    MappedField {
        mapped_value: value.to_string(),
        confidence: 0.9,
        source_attribute: String::new(),
        ..MappedField::unmapped(&field(selector, field_type, label))
    }
}

pub fn section(name: &str, add_locator: &str, entries: Vec<Vec<&str>>, key: &str) -> Section {
    Section {
        name: name.to_string(),
        add_action_locator: add_locator.to_string(),
        entries: entries
            .into_iter()
            .map(|selectors| SectionEntry {
                field_selectors: selectors.into_iter().map(String::from).collect(),
            })
            .collect(),
        resolved_profile_key: Some(key.to_string()),
    }
}

/// A profile with `n` work experience entries.
pub fn profile_with_experience(n: usize) -> UserProfile {
    UserProfile {
        personal_info: PersonalInfo {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            ..PersonalInfo::default()
        },
        experience: (0..n)
            .map(|i| Experience {
                title: format!("Engineer {}", i + 1),
                company: format!("Company {}", i + 1),
                ..Experience::default()
            })
            .collect(),
        ..UserProfile::default()
    }
}

/// Zero-delay settings so tests run instantly.
pub fn fast_settings() -> FillSettings {
    FillSettings {
        fill_delay_min_ms: 0,
        fill_delay_max_ms: 0,
        add_settle_delay_ms: 0,
        extraction_timeout_ms: 100,
        ..FillSettings::default()
    }
}

// =========================================================================
// Scripted actuator
// =========================================================================

/// Records every call; fails selectors/locators on request.
#[derive(Default)]
pub struct ScriptedActuator {
    pub calls: Mutex<Vec<String>>,
    pub fail_selectors: HashSet<String>,
    pub fail_actions: HashSet<String>,
    pub listbox_times_out: bool,
    pub live_options: HashMap<String, Vec<SelectOption>>,
    pub option_click_fails: bool,
}

impl ScriptedActuator {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn check(&self, field: &FormField) -> Result<(), FillFailure> {
        if self.fail_selectors.contains(&field.selector) {
            Err(FillFailure::Rejected("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FillActuator for ScriptedActuator {
    async fn fill_text(&self, field: &FormField, value: &str) -> Result<(), FillFailure> {
        self.record(format!("fill:{}={}", field.selector, value));
        self.check(field)
    }

    async fn select_native(
        &self,
        field: &FormField,
        option_value: &str,
    ) -> Result<(), FillFailure> {
        self.record(format!("select:{}={}", field.selector, option_value));
        self.check(field)
    }

    async fn set_checked(&self, field: &FormField, checked: bool) -> Result<(), FillFailure> {
        self.record(format!("check:{}={}", field.selector, checked));
        self.check(field)
    }

    async fn check_radio(&self, field: &FormField, value: &str) -> Result<(), FillFailure> {
        self.record(format!("radio:{}={}", field.selector, value));
        self.check(field)
    }

    async fn upload_file(&self, field: &FormField, path: &str) -> Result<(), FillFailure> {
        self.record(format!("upload:{}={}", field.selector, path));
        self.check(field)
    }

    async fn trigger_action(&self, locator: &str) -> Result<(), FillFailure> {
        self.record(format!("click:{}", locator));
        if self.fail_actions.contains(locator) {
            Err(FillFailure::ActionFailed("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn open_combobox(&self, field: &FormField) -> Result<(), FillFailure> {
        self.record(format!("open:{}", field.selector));
        if self.listbox_times_out {
            Err(FillFailure::TimeoutWaitingForListbox)
        } else {
            Ok(())
        }
    }

    async fn read_combobox_options(
        &self,
        field: &FormField,
    ) -> Result<Vec<SelectOption>, FillFailure> {
        self.record(format!("read_options:{}", field.selector));
        Ok(self
            .live_options
            .get(&field.selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn click_combobox_option(
        &self,
        field: &FormField,
        option: &SelectOption,
    ) -> Result<(), FillFailure> {
        self.record(format!("click_option:{}={}", field.selector, option.value));
        if self.option_click_fails {
            Err(FillFailure::OptionClickFailed)
        } else {
            Ok(())
        }
    }

    async fn close_combobox(&self, field: &FormField) -> Result<(), FillFailure> {
        self.record(format!("close:{}", field.selector));
        Ok(())
    }
}

// =========================================================================
// Scripted mapper
// =========================================================================

/// Maps every field to "<label>-value" unless told to skip or fail.
#[derive(Default)]
pub struct ScriptedMapper {
    pub skip_labels: HashSet<String>,
    pub unreachable: bool,
    pub call_count: Mutex<usize>,
}

#[async_trait]
impl MappingBackend for ScriptedMapper {
    async fn map_fields(
        &self,
        fields: &[FormField],
        _context: &str,
    ) -> Result<BackendAnalysis, MappingError> {
        *self.call_count.lock().unwrap() += 1;
        if self.unreachable {
            return Err(MappingError::Unreachable("scripted outage".to_string()));
        }
        let mut analysis = BackendAnalysis::default();
        for f in fields {
            if self.skip_labels.contains(&f.label) {
                analysis.unmapped_labels.push(f.label.clone());
                continue;
            }
            analysis.fields.push(MappedField {
                mapped_value: format!("{}-value", f.label),
                confidence: 0.8,
                source_attribute: String::new(),
                ..MappedField::unmapped(f)
            });
        }
        Ok(analysis)
    }
}

// =========================================================================
// Scripted snapshot source
// =========================================================================

/// Hands out pre-queued snapshots (or errors) per extraction request.
#[derive(Default)]
pub struct ScriptedSnapshots {
    queue: Mutex<VecDeque<Result<FormSnapshot, ChannelError>>>,
    pub requests: Mutex<usize>,
}

impl ScriptedSnapshots {
    pub fn push_ok(&self, snapshot: FormSnapshot) {
        self.queue.lock().unwrap().push_back(Ok(snapshot));
    }

    pub fn push_timeout(&self) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(ChannelError::ExtractionTimeout(Duration::from_millis(
                100,
            ))));
    }

    pub fn push_disconnect(&self) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(ChannelError::Disconnected));
    }

    pub fn request_count(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSnapshots {
    async fn request_snapshot(&self, timeout: Duration) -> Result<FormSnapshot, ChannelError> {
        *self.requests.lock().unwrap() += 1;
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ChannelError::ExtractionTimeout(timeout)))
    }
}

// =========================================================================
// Run harness
// =========================================================================

pub struct RunResult {
    pub outcome: FillOutcome,
    pub progress: Vec<String>,
}

pub async fn run_fill(
    mapping: &FormMapping,
    actuator: Arc<ScriptedActuator>,
    mapper: Arc<ScriptedMapper>,
    snapshots: Arc<ScriptedSnapshots>,
    profile: UserProfile,
    settings: FillSettings,
    cancelled: bool,
) -> RunResult {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let mut orchestrator = Orchestrator::new(
        actuator,
        mapper,
        snapshots,
        Arc::new(profile),
        settings,
        progress_tx,
        Arc::new(AtomicBool::new(cancelled)),
    );
    let outcome = orchestrator.run(mapping).await;

    let mut progress = Vec::new();
    while let Ok(message) = progress_rx.try_recv() {
        progress.push(message);
    }
    RunResult { outcome, progress }
}
