use serde::{Deserialize, Serialize};

use crate::form::form_model::{FillOutcome, FormMapping, FormSnapshot};

// ============================================================================
// Typed message envelopes
// ============================================================================
//
// One duplex connection carries everything: control traffic (ping/status),
// progress text, and the extraction request/response overlay. Every frame is
// a tagged JSON object; correlation of extraction responses is by
// `request_id`, never by arrival order.

/// Frames the extraction collaborator sends us.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Ping,
    /// Spontaneous push of a freshly extracted form (initial page load).
    FormExtracted { data: FormSnapshot },
    /// The user approved a mapping; start a fill run.
    FillForm { data: FormMapping },
    /// Response to a `request_extraction` we issued mid-run.
    ExtractionResult {
        request_id: String,
        #[serde(default)]
        data: Option<FormSnapshot>,
    },
    /// The user edited one field mapping client-side; acknowledge only.
    UpdateField,
    CancelFill,
    Status,
}

/// Frames we send to the extraction collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Pong,
    RequestExtraction { request_id: String },
    Analyzing { message: String },
    FormAnalysis { data: FormMapping },
    Filling { message: String },
    FillProgress { message: String },
    FillResult { data: FillOutcome },
    FieldUpdated { ok: bool },
    Status { fill_running: bool },
    Error { message: String },
}
