//! Semi-automated filling of multi-step, dynamically-rendered web forms.
//!
//! A browser-side extraction collaborator connects over one WebSocket and
//! pushes form snapshots; an external mapping service proposes a value for
//! every field; after human review the orchestrator executes the fill:
//! flat fields first, then repeatable sections, expanding each section with
//! add-action round-trips and snapshot diffs. The engine never submits a
//! form and never infers field semantics itself.

pub mod actuator;
pub mod channel;
pub mod cli;
pub mod form;
pub mod mapping;
pub mod matcher;
pub mod orchestrator;
pub mod profile;
