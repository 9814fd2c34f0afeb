mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use common::{snapshot, text_field};
use form_autofill::channel::channel::{ChannelError, ExtensionChannel, SnapshotSource};
use form_autofill::channel::envelope::{InboundMessage, OutboundMessage};
use form_autofill::channel::registry::PendingExtractions;

// ============================================================================
// Pending-extraction registry
// ============================================================================

#[tokio::test]
async fn test_register_and_resolve_delivers_snapshot() {
    let pending = PendingExtractions::new();
    let rx = pending.register("req-1", Duration::from_secs(5));
    assert_eq!(pending.outstanding(), 1);

    assert!(pending.resolve("req-1", snapshot(vec![text_field("f1", "Email")])));
    assert_eq!(pending.outstanding(), 0);

    let delivered = rx.await.expect("snapshot delivered");
    assert_eq!(delivered.fields.len(), 1);
}

#[tokio::test]
async fn test_resolve_is_at_most_once() {
    let pending = PendingExtractions::new();
    let _rx = pending.register("req-1", Duration::from_secs(5));

    assert!(pending.resolve("req-1", snapshot(vec![])));
    // The duplicate finds nothing.
    assert!(!pending.resolve("req-1", snapshot(vec![])));
}

#[tokio::test]
async fn test_unknown_id_is_a_noop() {
    let pending = PendingExtractions::new();
    assert!(!pending.resolve("never-issued", snapshot(vec![])));
}

#[tokio::test]
async fn test_abandoned_request_discards_late_response() {
    let pending = PendingExtractions::new();
    let _rx = pending.register("req-1", Duration::from_secs(5));
    pending.abandon("req-1");
    assert_eq!(pending.outstanding(), 0);
    assert!(!pending.resolve("req-1", snapshot(vec![])));
}

#[tokio::test]
async fn test_expired_response_discarded() {
    let pending = PendingExtractions::new();
    let _rx = pending.register("req-1", Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!pending.resolve("req-1", snapshot(vec![])), "past its deadline");
}

#[tokio::test]
async fn test_sweep_expired_keeps_live_entries() {
    let pending = PendingExtractions::new();
    let _short = pending.register("short", Duration::from_millis(1));
    let _long = pending.register("long", Duration::from_secs(60));
    tokio::time::sleep(Duration::from_millis(10)).await;

    pending.sweep_expired();
    assert_eq!(pending.outstanding(), 1);
    assert!(pending.resolve("long", snapshot(vec![])));
}

#[tokio::test]
async fn test_fail_all_drops_every_waiter() {
    let pending = PendingExtractions::new();
    let rx = pending.register("req-1", Duration::from_secs(5));
    pending.fail_all();
    assert_eq!(pending.outstanding(), 0);
    assert!(rx.await.is_err(), "waiter sees the dropped sender");
}

// ============================================================================
// Channel request/response overlay
// ============================================================================

fn channel() -> (
    ExtensionChannel,
    mpsc::UnboundedReceiver<OutboundMessage>,
    Arc<PendingExtractions>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(PendingExtractions::new());
    (ExtensionChannel::new(tx, Arc::clone(&pending)), rx, pending)
}

#[tokio::test]
async fn test_request_snapshot_round_trip() {
    let (chan, mut outbound, _pending) = channel();

    // Play the collaborator: answer the extraction request by id.
    let responder = chan.clone();
    let collaborator = tokio::spawn(async move {
        match outbound.recv().await {
            Some(OutboundMessage::RequestExtraction { request_id }) => {
                responder.resolve_extraction(&request_id, snapshot(vec![text_field("f1", "")]));
            }
            other => panic!("expected RequestExtraction, got {:?}", other),
        }
    });

    let snap = chan
        .request_snapshot(Duration::from_secs(2))
        .await
        .expect("round trip");
    assert_eq!(snap.fields.len(), 1);
    collaborator.await.expect("collaborator task");
}

#[tokio::test]
async fn test_responses_pair_by_id_not_order() {
    let (chan, mut outbound, _pending) = channel();

    // Issue two requests, learning which id belongs to which waiter.
    let first = chan.clone();
    let task_a = tokio::spawn(async move { first.request_snapshot(Duration::from_secs(2)).await });
    let id_a = match outbound.recv().await {
        Some(OutboundMessage::RequestExtraction { request_id }) => request_id,
        other => panic!("expected RequestExtraction, got {:?}", other),
    };

    let second = chan.clone();
    let task_b = tokio::spawn(async move { second.request_snapshot(Duration::from_secs(2)).await });
    let id_b = match outbound.recv().await {
        Some(OutboundMessage::RequestExtraction { request_id }) => request_id,
        other => panic!("expected RequestExtraction, got {:?}", other),
    };
    assert_ne!(id_a, id_b, "fresh id per request");

    // Answer in reverse order; each waiter still gets its own snapshot.
    chan.resolve_extraction(&id_b, snapshot(vec![text_field("second", "")]));
    chan.resolve_extraction(&id_a, snapshot(vec![text_field("first", "")]));

    let snap_a = task_a.await.expect("join").expect("first request");
    let snap_b = task_b.await.expect("join").expect("second request");
    assert_eq!(snap_a.fields[0].selector, "first");
    assert_eq!(snap_b.fields[0].selector, "second");
}

#[tokio::test]
async fn test_invalid_extraction_snapshot_is_dropped() {
    let (chan, mut outbound, pending) = channel();

    let waiter = chan.clone();
    let task = tokio::spawn(async move { waiter.request_snapshot(Duration::from_secs(2)).await });
    let request_id = match outbound.recv().await {
        Some(OutboundMessage::RequestExtraction { request_id }) => request_id,
        other => panic!("expected RequestExtraction, got {:?}", other),
    };

    // Duplicate selectors violate the snapshot invariant; the waiter must
    // never see this payload.
    chan.resolve_extraction(
        &request_id,
        snapshot(vec![text_field("dup", "Email"), text_field("dup", "Phone")]),
    );
    assert_eq!(pending.outstanding(), 1, "request stays outstanding");

    // A later well-formed response for the same id still resolves.
    chan.resolve_extraction(&request_id, snapshot(vec![text_field("f1", "Email")]));
    let snap = task.await.expect("join").expect("valid response resolves");
    assert_eq!(snap.fields[0].selector, "f1");
}

#[tokio::test]
async fn test_request_snapshot_times_out_and_cleans_up() {
    let (chan, mut outbound, pending) = channel();

    let result = chan.request_snapshot(Duration::from_millis(20)).await;
    match result {
        Err(ChannelError::ExtractionTimeout(_)) => {}
        other => panic!("expected ExtractionTimeout, got {:?}", other),
    }
    assert_eq!(pending.outstanding(), 0, "timed-out request is abandoned");

    // The request frame did go out.
    match outbound.recv().await {
        Some(OutboundMessage::RequestExtraction { .. }) => {}
        other => panic!("expected RequestExtraction, got {:?}", other),
    }
}

#[tokio::test]
async fn test_late_response_after_timeout_is_dropped() {
    let (chan, mut outbound, _pending) = channel();

    let result = chan.request_snapshot(Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ChannelError::ExtractionTimeout(_))));

    let request_id = match outbound.recv().await {
        Some(OutboundMessage::RequestExtraction { request_id }) => request_id,
        other => panic!("expected RequestExtraction, got {:?}", other),
    };
    // Nothing is waiting any more; this must not panic or block.
    chan.resolve_extraction(&request_id, snapshot(vec![]));
}

#[tokio::test]
async fn test_send_after_disconnect_fails() {
    let (chan, outbound, _pending) = channel();
    drop(outbound);
    assert!(matches!(
        chan.send(OutboundMessage::Pong),
        Err(ChannelError::NotConnected)
    ));
}

#[tokio::test]
async fn test_disconnect_fails_outstanding_request() {
    let (chan, mut outbound, pending) = channel();

    let waiter = chan.clone();
    let task = tokio::spawn(async move { waiter.request_snapshot(Duration::from_secs(5)).await });

    match outbound.recv().await {
        Some(OutboundMessage::RequestExtraction { .. }) => {}
        other => panic!("expected RequestExtraction, got {:?}", other),
    }
    pending.fail_all();

    let result = task.await.expect("join");
    assert!(matches!(result, Err(ChannelError::Disconnected)));
}

// ============================================================================
// Envelope wire format
// ============================================================================

#[test]
fn test_inbound_frames_parse() {
    let ping: InboundMessage = serde_json::from_str(r#"{"type": "ping"}"#).expect("ping");
    assert!(matches!(ping, InboundMessage::Ping));

    let extracted: InboundMessage = serde_json::from_str(
        r#"{"type": "form_extracted", "data": {"fields": [{"selector": "f1", "field_type": "text"}]}}"#,
    )
    .expect("form_extracted");
    match extracted {
        InboundMessage::FormExtracted { data } => assert_eq!(data.fields.len(), 1),
        other => panic!("expected FormExtracted, got {:?}", other),
    }

    let result: InboundMessage = serde_json::from_str(
        r#"{"type": "extraction_result", "request_id": "abc123", "data": {"fields": []}}"#,
    )
    .expect("extraction_result");
    match result {
        InboundMessage::ExtractionResult { request_id, data } => {
            assert_eq!(request_id, "abc123");
            assert!(data.is_some());
        }
        other => panic!("expected ExtractionResult, got {:?}", other),
    }

    // Missing payload is tolerated; the server substitutes an empty snapshot.
    let bare: InboundMessage =
        serde_json::from_str(r#"{"type": "extraction_result", "request_id": "abc123"}"#)
            .expect("payload-less extraction_result");
    match bare {
        InboundMessage::ExtractionResult { data, .. } => assert!(data.is_none()),
        other => panic!("expected ExtractionResult, got {:?}", other),
    }
}

#[test]
fn test_outbound_frames_are_tagged() {
    let json = serde_json::to_value(OutboundMessage::RequestExtraction {
        request_id: "abc123".to_string(),
    })
    .expect("serialize");
    assert_eq!(json["type"], "request_extraction");
    assert_eq!(json["request_id"], "abc123");

    let status = serde_json::to_value(OutboundMessage::Status { fill_running: true })
        .expect("serialize");
    assert_eq!(status["type"], "status");
    assert_eq!(status["fill_running"], true);
}
