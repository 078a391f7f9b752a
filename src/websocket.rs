//! # WebSocket Event Streaming Handler
//!
//! Streams pipeline events to review clients. A client connects to
//! `/ws/events?session_id=<id>` and receives the JSON frames the analysis
//! pipeline pushes through the [`ConnectionHub`](crate::hub::ConnectionHub)
//! for that session.
//!
//! ## Protocol:
//! 1. **Connection**: client connects with a `session_id` query parameter
//! 2. **Event stream**: server sends JSON text frames (`progress_update`,
//!    `analysis_update`, `error`, `complete`)
//! 3. **Heartbeat**: server pings every 30s; an unresponsive client is
//!    dropped after 60s
//!
//! Inbound application messages are ignored; the event stream is one-way.

use crate::hub::ConnectionHub;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long a client may go silent before the connection is closed.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// WebSocket actor for one event subscription.
///
/// ## Actor Model:
/// Each connection is an independent actor. On start it registers a push
/// channel with the hub and adds the receiving end as a stream, so every
/// frame the pipeline pushes arrives through `StreamHandler<String>` and is
/// forwarded to the client as a text frame.
pub struct EventSocket {
    /// Session whose events this connection receives
    session_id: String,

    /// Channel registry shared with the pipeline
    hub: Arc<ConnectionHub>,

    /// Sender half registered with the hub; kept so cleanup only removes
    /// this connection's own registration
    sender: Option<UnboundedSender<String>>,

    /// Last time the client gave any sign of life
    last_heartbeat: Instant,
}

impl EventSocket {
    pub fn new(session_id: String, hub: Arc<ConnectionHub>) -> Self {
        Self {
            session_id,
            hub,
            sender: None,
            last_heartbeat: Instant::now(),
        }
    }
}

impl Actor for EventSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Register with the hub and start the heartbeat timer.
    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Event subscription started for session {}", self.session_id);

        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.connect(&self.session_id, tx.clone());
        self.sender = Some(tx);

        // Every frame pushed by the pipeline lands in StreamHandler<String>.
        // If a reconnect replaces our registration the pipeline's senders
        // drop, the stream finishes, and this actor stops itself.
        ctx.add_stream(UnboundedReceiverStream::new(rx));

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    "WebSocket heartbeat timeout for session {}, closing connection",
                    act.session_id
                );
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    /// Deregister from the hub when the connection goes away.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(sender) = &self.sender {
            self.hub.disconnect_channel(&self.session_id, sender);
        }
        info!("Event subscription stopped for session {}", self.session_id);
    }
}

/// Frames pushed by the pipeline, forwarded verbatim as text.
impl StreamHandler<String> for EventSocket {
    fn handle(&mut self, frame: String, ctx: &mut Self::Context) {
        ctx.text(frame);
    }
}

/// Control traffic from the client.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for EventSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // The event stream is one-way
                debug!(
                    "Ignoring inbound message on event stream for session {}",
                    self.session_id
                );
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(
                    "WebSocket closed for session {}: {:?}",
                    self.session_id, reason
                );
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(
                    "WebSocket protocol error for session {}: {}",
                    self.session_id, err
                );
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler.
///
/// Upgrades the HTTP request to a WebSocket connection after validating that
/// a `session_id` query parameter is present. The session does not have to
/// exist yet; clients routinely subscribe before the first upload.
pub async fn event_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .unwrap_or_else(|_| web::Query(HashMap::new()));

    let session_id = match query.get("session_id") {
        Some(id) if !id.is_empty() => id.clone(),
        _ => {
            warn!("WebSocket connection rejected: missing session_id parameter");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": {
                    "type": "bad_request",
                    "message": "session_id query parameter is required"
                }
            })));
        }
    };

    info!(
        "New event subscription for session {} from {:?}",
        session_id,
        req.connection_info().peer_addr()
    );

    let socket = EventSocket::new(session_id, app_state.hub.clone());
    ws::start(socket, &req, stream)
}
