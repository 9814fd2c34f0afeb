use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::actuator::actuator::FillActuator;
use crate::channel::channel::ExtensionChannel;
use crate::channel::envelope::{InboundMessage, OutboundMessage};
use crate::channel::registry::PendingExtractions;
use crate::form::form_model::{FormMapping, FormSnapshot};
use crate::mapping::mapper::{MappingBackend, analyze_snapshot};
use crate::orchestrator::orchestrator::{FillSettings, Orchestrator};
use crate::profile::profile_model::UserProfile;

// ============================================================================
// WebSocket server
// ============================================================================
//
// One connection to the extraction collaborator. The receive loop stays
// responsive at all times: a fill run is spawned as a background task, so
// pings, status queries and the extraction responses the run itself is
// waiting on keep flowing while fields are being filled.

/// Everything a connection needs to analyze and fill forms.
pub struct Services {
    pub actuator: Arc<dyn FillActuator>,
    pub mapper: Arc<dyn MappingBackend>,
    pub profile: Arc<UserProfile>,
    pub fill_settings: FillSettings,
}

pub fn router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(services)
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind_addr: &str, services: Arc<Services>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("listening on {}", bind_addr);
    axum::serve(listener, router(services)).await?;
    Ok(())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(services): State<Arc<Services>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, services))
}

async fn handle_socket(socket: WebSocket, services: Arc<Services>) {
    info!("extraction collaborator connected");
    let (sink, mut stream) = socket.split();

    // Single writer task: every frame goes out whole, in queue order.
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(sink, out_rx));

    let pending = Arc::new(PendingExtractions::new());
    // Entries whose waiter went away without abandoning (an aborted task)
    // would otherwise sit in the registry until disconnect.
    let sweeper = {
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tick.tick().await;
                pending.sweep_expired();
            }
        })
    };
    let channel = ExtensionChannel::new(out_tx, pending.clone());
    let cancel = Arc::new(AtomicBool::new(false));
    let mut fill_task: Option<JoinHandle<()>> = None;

    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let inbound: InboundMessage = match serde_json::from_str(&text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("unrecognized message: {}", e);
                let _ = channel.send(OutboundMessage::Error {
                    message: format!("unrecognized message: {}", e),
                });
                continue;
            }
        };

        match inbound {
            InboundMessage::Ping => {
                let _ = channel.send(OutboundMessage::Pong);
            }

            InboundMessage::FormExtracted { data } => {
                handle_form_extracted(&channel, &services, data).await;
            }

            InboundMessage::FillForm { data } => {
                let running = fill_task.as_ref().is_some_and(|t| !t.is_finished());
                if running {
                    let _ = channel.send(OutboundMessage::Error {
                        message: "a fill run is already in progress".to_string(),
                    });
                    continue;
                }
                cancel.store(false, Ordering::Relaxed);
                fill_task = Some(spawn_fill_run(
                    services.clone(),
                    channel.clone(),
                    cancel.clone(),
                    data,
                ));
            }

            InboundMessage::ExtractionResult { request_id, data } => {
                channel.resolve_extraction(&request_id, data.unwrap_or_default());
            }

            InboundMessage::UpdateField => {
                // Mapping edits live client-side; just acknowledge.
                let _ = channel.send(OutboundMessage::FieldUpdated { ok: true });
            }

            InboundMessage::CancelFill => {
                cancel.store(true, Ordering::Relaxed);
                let _ = channel.send(OutboundMessage::FillProgress {
                    message: "cancelling fill run...".to_string(),
                });
            }

            InboundMessage::Status => {
                let fill_running = fill_task.as_ref().is_some_and(|t| !t.is_finished());
                let _ = channel.send(OutboundMessage::Status { fill_running });
            }
        }
    }

    // Disconnect: wake every outstanding extraction wait and stop the run at
    // its next suspend point.
    info!("extraction collaborator disconnected");
    cancel.store(true, Ordering::Relaxed);
    pending.fail_all();
    drop(channel);
    sweeper.abort();
    writer.abort();
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
) {
    while let Some(frame) = out_rx.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                error!("failed to serialize outbound frame: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn handle_form_extracted(
    channel: &ExtensionChannel,
    services: &Services,
    snapshot: FormSnapshot,
) {
    if let Err(e) = snapshot.validate() {
        let _ = channel.send(OutboundMessage::Error {
            message: format!("invalid snapshot: {}", e),
        });
        return;
    }
    let _ = channel.send(OutboundMessage::Analyzing {
        message: format!("Analyzing {} fields...", snapshot.fields.len()),
    });
    match analyze_snapshot(services.mapper.as_ref(), &snapshot, &services.profile).await {
        Ok(mapping) => {
            let _ = channel.send(OutboundMessage::FormAnalysis { data: mapping });
        }
        Err(e) => {
            error!("form analysis failed: {}", e);
            let _ = channel.send(OutboundMessage::Error {
                message: format!("form analysis failed: {}", e),
            });
        }
    }
}

fn spawn_fill_run(
    services: Arc<Services>,
    channel: ExtensionChannel,
    cancel: Arc<AtomicBool>,
    mapping: FormMapping,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = channel.send(OutboundMessage::Filling {
            message: "Filling form fields...".to_string(),
        });

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let progress_channel = channel.clone();
        tokio::spawn(async move {
            while let Some(message) = progress_rx.recv().await {
                if progress_channel
                    .send(OutboundMessage::FillProgress { message })
                    .is_err()
                {
                    break;
                }
            }
        });

        let mut orchestrator = Orchestrator::new(
            services.actuator.clone(),
            services.mapper.clone(),
            Arc::new(channel.clone()),
            services.profile.clone(),
            services.fill_settings.clone(),
            progress_tx,
            cancel,
        );
        let outcome = orchestrator.run(&mapping).await;
        let _ = channel.send(OutboundMessage::FillResult { data: outcome });
    })
}
