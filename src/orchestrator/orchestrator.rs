use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::actuator::actuator::FillActuator;
use crate::channel::channel::{ChannelError, SnapshotSource};
use crate::form::diff::{absorb, new_fields};
use crate::form::form_model::{FillOutcome, FormField, FormMapping, MappedField, Section};
use crate::form::section::{entry_fields, section_owned_selectors};
use crate::mapping::mapper::{MappingBackend, analyze_scoped};
use crate::orchestrator::field_fill::{FieldFiller, descriptor};
use crate::profile::context::entry_context;
use crate::profile::profile_model::UserProfile;

// ============================================================================
// Fill orchestration state machine
// ============================================================================

/// Where a run currently is. Phases advance strictly in order; `Failed` is
/// terminal and reachable from anywhere on an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    FlatFill,
    SectionLoop(usize),
    EntryFill(usize, usize),
    Expand(usize),
    AwaitSnapshot(usize),
    DiffAnalyzeFill(usize),
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::FlatFill => write!(f, "flat_fill"),
            RunPhase::SectionLoop(i) => write!(f, "section_loop[{}]", i),
            RunPhase::EntryFill(i, j) => write!(f, "entry_fill[{},{}]", i, j),
            RunPhase::Expand(i) => write!(f, "expand[{}]", i),
            RunPhase::AwaitSnapshot(i) => write!(f, "await_snapshot[{}]", i),
            RunPhase::DiffAnalyzeFill(i) => write!(f, "diff_analyze_fill[{}]", i),
            RunPhase::Done => write!(f, "done"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Run-level aborts. Lower tiers never escalate into these on their own.
enum RunAbort {
    Cancelled,
    Mapping(String),
    Channel(ChannelError),
}

impl RunAbort {
    fn code(&self) -> &'static str {
        match self {
            RunAbort::Cancelled => "cancelled",
            RunAbort::Mapping(_) => "mapping_unreachable",
            RunAbort::Channel(_) => "channel_disconnected",
        }
    }
}

/// Numeric tunables of one run. All durations in milliseconds.
#[derive(Debug, Clone)]
pub struct FillSettings {
    pub fill_delay_min_ms: u64,
    pub fill_delay_max_ms: u64,
    pub match_threshold: u8,
    pub add_settle_delay_ms: u64,
    pub extraction_timeout_ms: u64,
    pub max_section_entries: usize,
    pub resume_path: String,
}

impl Default for FillSettings {
    fn default() -> FillSettings {
        FillSettings {
            fill_delay_min_ms: 200,
            fill_delay_max_ms: 800,
            match_threshold: 70,
            add_settle_delay_ms: 1500,
            extraction_timeout_ms: 10_000,
            max_section_entries: 10,
            resume_path: "resume.pdf".to_string(),
        }
    }
}

/// Drives one complete fill run: flat fields, then each repeatable section
/// (existing entries, then expansion round-trips). Field fills are strictly
/// sequential; the run suspends only on actuator, mapper and channel calls.
pub struct Orchestrator {
    actuator: Arc<dyn FillActuator>,
    mapper: Arc<dyn MappingBackend>,
    snapshots: Arc<dyn SnapshotSource>,
    profile: Arc<UserProfile>,
    settings: FillSettings,
    progress: mpsc::UnboundedSender<String>,
    cancel: Arc<AtomicBool>,
    phase: RunPhase,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actuator: Arc<dyn FillActuator>,
        mapper: Arc<dyn MappingBackend>,
        snapshots: Arc<dyn SnapshotSource>,
        profile: Arc<UserProfile>,
        settings: FillSettings,
        progress: mpsc::UnboundedSender<String>,
        cancel: Arc<AtomicBool>,
    ) -> Orchestrator {
        Orchestrator {
            actuator,
            mapper,
            snapshots,
            profile,
            settings,
            progress,
            cancel,
            phase: RunPhase::Idle,
        }
    }

    /// Execute the run to completion. Never panics, never loses partial
    /// results: whatever was filled before an abort is in the outcome.
    pub async fn run(&mut self, mapping: &FormMapping) -> FillOutcome {
        let mut outcome = FillOutcome::default();
        // One baseline for the whole run: the analyzed snapshot's selector
        // space, extended after every expansion round-trip.
        let mut baseline: HashSet<String> =
            mapping.fields.iter().map(|f| f.selector.clone()).collect();

        if let Err(abort) = self.fill_flat(mapping, &mut outcome).await {
            return self.abort_run(abort, outcome);
        }

        for (i, section) in mapping.sections.iter().enumerate() {
            self.phase = RunPhase::SectionLoop(i);
            if let Err(abort) = self
                .fill_section(i, section, mapping, &mut baseline, &mut outcome)
                .await
            {
                return self.abort_run(abort, outcome);
            }
        }

        self.phase = RunPhase::Done;
        info!(
            filled = outcome.filled,
            failed = outcome.failed,
            "fill run complete"
        );
        outcome
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    // ---- Flat phase ------------------------------------------------------

    async fn fill_flat(
        &mut self,
        mapping: &FormMapping,
        outcome: &mut FillOutcome,
    ) -> Result<(), RunAbort> {
        self.phase = RunPhase::FlatFill;
        let owned = section_owned_selectors(&mapping.sections);
        let flat: Vec<&MappedField> = mapping
            .fields
            .iter()
            .filter(|f| f.is_mapped() && !owned.contains(&f.selector))
            .collect();

        if flat.is_empty() {
            self.report("No standard fields to fill");
            return Ok(());
        }
        self.report(&format!("Filling {} standard fields...", flat.len()));

        for (i, field) in flat.into_iter().enumerate() {
            self.check_cancelled()?;
            if i > 0 {
                self.pace().await;
            }
            self.fill_one(field, outcome).await;
        }
        Ok(())
    }

    // ---- Section phases --------------------------------------------------

    async fn fill_section(
        &mut self,
        idx: usize,
        section: &Section,
        mapping: &FormMapping,
        baseline: &mut HashSet<String>,
        outcome: &mut FillOutcome,
    ) -> Result<(), RunAbort> {
        let Some(profile_key) = section.resolved_profile_key.as_deref() else {
            info!(section = %section.name, "skipping section without profile mapping");
            return Ok(());
        };
        let profile_len = self.profile.entry_count(profile_key);
        if profile_len == 0 {
            info!(section = %section.name, profile_key, "skipping section, profile list empty");
            return Ok(());
        }

        let existing = section.existing_entry_count();
        // The cap bounds total entries per section, however long the profile
        // list is.
        let target = profile_len.min(self.settings.max_section_entries);
        let to_add = target.saturating_sub(existing);

        self.report(&format!(
            "Processing {}: {} existing + {} to add",
            section.name, existing, to_add
        ));

        // Existing entries first, each against its own profile entry.
        for j in 0..existing.min(profile_len) {
            self.phase = RunPhase::EntryFill(idx, j);
            self.fill_existing_entry(j, section, profile_key, mapping, outcome)
                .await?;
        }

        if to_add == 0 {
            info!(
                section = %section.name,
                existing, profile_len,
                "no new entries to add"
            );
            return Ok(());
        }

        // Expansion: add, settle, re-extract, diff, analyze, fill.
        for entry_idx in existing..target {
            self.check_cancelled()?;
            self.phase = RunPhase::Expand(idx);
            self.report(&format!(
                "{}: adding entry {}/{}...",
                section.name,
                entry_idx + 1,
                target
            ));

            if let Err(e) = self.actuator.trigger_action(&section.add_action_locator).await {
                warn!(section = %section.name, error = %e, "add action failed, aborting section");
                outcome.record_failure(&section.name, "add_action_failed");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(self.settings.add_settle_delay_ms)).await;

            self.phase = RunPhase::AwaitSnapshot(idx);
            let timeout = Duration::from_millis(self.settings.extraction_timeout_ms);
            let snapshot = match self.snapshots.request_snapshot(timeout).await {
                Ok(snapshot) => snapshot,
                Err(ChannelError::ExtractionTimeout(_)) => {
                    warn!(section = %section.name, "re-extraction timed out, aborting section");
                    outcome.record_failure(&section.name, "extraction_timeout");
                    return Ok(());
                }
                Err(e) => return Err(RunAbort::Channel(e)),
            };

            self.phase = RunPhase::DiffAnalyzeFill(idx);
            let added: Vec<FormField> = new_fields(baseline, &snapshot)
                .into_iter()
                .cloned()
                .collect();
            if added.is_empty() {
                // The add action had no visible effect; stop before looping
                // forever on a section that will never grow.
                warn!(section = %section.name, "empty diff after add, aborting section");
                outcome.record_failure(&section.name, "empty_diff");
                return Ok(());
            }
            info!(
                section = %section.name,
                entry = entry_idx + 1,
                new_fields = added.len(),
                "new entry rendered"
            );

            let Some(context) = entry_context(&self.profile, profile_key, entry_idx) else {
                outcome.record_failure(&section.name, "missing_profile_entry");
                return Ok(());
            };
            let scoped = analyze_scoped(self.mapper.as_ref(), &added, &context)
                .await
                .map_err(|e| RunAbort::Mapping(e.to_string()))?;

            let to_fill: Vec<&MappedField> = scoped.iter().filter(|f| f.is_mapped()).collect();
            if !to_fill.is_empty() {
                self.report(&format!(
                    "{} entry {}: filling {} fields...",
                    section.name,
                    entry_idx + 1,
                    to_fill.len()
                ));
                for (i, field) in to_fill.into_iter().enumerate() {
                    self.check_cancelled()?;
                    if i > 0 {
                        self.pace().await;
                    }
                    self.fill_one(field, outcome).await;
                }
            }

            absorb(baseline, &snapshot);
        }
        Ok(())
    }

    async fn fill_existing_entry(
        &mut self,
        entry_idx: usize,
        section: &Section,
        profile_key: &str,
        mapping: &FormMapping,
        outcome: &mut FillOutcome,
    ) -> Result<(), RunAbort> {
        let fields = entry_fields(section, entry_idx, &mapping.fields);
        if fields.is_empty() {
            return Ok(());
        }
        let Some(context) = entry_context(&self.profile, profile_key, entry_idx) else {
            return Ok(());
        };

        self.report(&format!(
            "{} entry {}: filling existing fields...",
            section.name,
            entry_idx + 1
        ));

        let descriptors: Vec<FormField> = fields.iter().map(|f| descriptor(f)).collect();
        let scoped = analyze_scoped(self.mapper.as_ref(), &descriptors, &context)
            .await
            .map_err(|e| RunAbort::Mapping(e.to_string()))?;

        let to_fill: Vec<&MappedField> = scoped.iter().filter(|f| f.is_mapped()).collect();
        for (i, field) in to_fill.into_iter().enumerate() {
            self.check_cancelled()?;
            if i > 0 {
                self.pace().await;
            }
            self.fill_one(field, outcome).await;
        }
        Ok(())
    }

    // ---- Helpers ---------------------------------------------------------

    async fn fill_one(&self, field: &MappedField, outcome: &mut FillOutcome) {
        let filler = FieldFiller {
            actuator: self.actuator.as_ref(),
            match_threshold: self.settings.match_threshold,
            resume_path: &self.settings.resume_path,
        };
        match filler.fill(field).await {
            Ok(()) => {
                outcome.record_fill();
            }
            Err(failure) => {
                warn!(selector = %field.selector, label = %field.label, error = %failure, "field fill failed");
                outcome.record_failure(&field.selector, failure.code());
            }
        }
    }

    /// Randomized inter-field delay, so fills do not land in a burst that
    /// trips anti-automation defenses.
    async fn pace(&self) {
        let (min, max) = (
            self.settings.fill_delay_min_ms,
            self.settings.fill_delay_max_ms,
        );
        if max == 0 {
            return;
        }
        let delay = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    fn check_cancelled(&self) -> Result<(), RunAbort> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(RunAbort::Cancelled)
        } else {
            Ok(())
        }
    }

    fn abort_run(&mut self, abort: RunAbort, mut outcome: FillOutcome) -> FillOutcome {
        self.phase = RunPhase::Failed;
        match &abort {
            RunAbort::Cancelled => warn!("fill run cancelled"),
            RunAbort::Mapping(e) => warn!(error = %e, "fill run aborted, mapping service unreachable"),
            RunAbort::Channel(e) => warn!(error = %e, "fill run aborted, channel lost"),
        }
        outcome.errors.push(crate::form::form_model::FillError {
            scope: "run".to_string(),
            reason: abort.code().to_string(),
        });
        outcome
    }

    fn report(&self, message: &str) {
        // Progress is best-effort; a gone receiver never stops the run.
        let _ = self.progress.send(message.to_string());
    }
}
