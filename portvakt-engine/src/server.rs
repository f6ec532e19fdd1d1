//! ## portvakt-engine::server
//! **WebSocket endpoint for live alert subscribers**
//!
//! One task per connection. The handshake only succeeds on the configured
//! route; anything else is answered with `404`. After the upgrade the
//! session registers with the hub, forwards its queue as text frames and
//! treats inbound text as keep-alive. The session ends on close, on a
//! transport error, when the hub evicts it, or on server shutdown, and in
//! every case leaves the hub.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use portvakt_core::broadcast::{SessionEvent, SubscriberId, SubscriberState};
use portvakt_core::BroadcastHub;
use portvakt_telemetry::MetricsRecorder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::EngineError;

struct SessionContext {
    hub: Arc<BroadcastHub>,
    metrics: Arc<MetricsRecorder>,
    path: String,
}

pub struct SubscriberServer {
    listener: TcpListener,
    context: Arc<SessionContext>,
}

impl SubscriberServer {
    pub async fn bind(
        addr: SocketAddr,
        path: &str,
        hub: Arc<BroadcastHub>,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, EngineError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EngineError::Bind { addr, source })?;
        Ok(Self {
            listener,
            context: Arc::new(SessionContext {
                hub,
                metrics,
                path: path.to_string(),
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` flips to `true`; open sessions
    /// are then closed as well.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, path = %self.context.path, "subscriber endpoint listening");
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let context = Arc::clone(&self.context);
                        tokio::spawn(run_session(stream, peer, context, shutdown.clone()));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        debug!("subscriber endpoint closed");
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    context: Arc<SessionContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let route = context.path.as_str();
    let check_route = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() == route {
            Ok(response)
        } else {
            let mut refused = ErrorResponse::new(Some("not found".into()));
            *refused.status_mut() = StatusCode::NOT_FOUND;
            Err(refused)
        }
    };

    let socket = match accept_hdr_async(stream, check_route).await {
        Ok(socket) => socket,
        Err(e) => {
            debug!(%peer, error = %e, "websocket handshake refused");
            return;
        }
    };

    let (subscriber, mut queue) = context.hub.subscribe(Some(peer));
    let id = subscriber.id();
    let mut state = SubscriberState::default();
    context.hub.connect(subscriber);
    advance(id, &mut state, SessionEvent::Accepted);
    context.metrics.subscribers.set(context.hub.len() as i64);
    info!(subscriber = %id, %peer, "subscriber connected");

    let (mut outbound, mut inbound) = socket.split();
    let ended_by = loop {
        tokio::select! {
            message = queue.next() => match message {
                Some(text) => {
                    if let Err(e) = outbound.send(Message::text(&*text)).await {
                        debug!(subscriber = %id, error = %e, "send failed");
                        break SessionEvent::SendFailed;
                    }
                }
                // Evicted by the hub and drained.
                None => break SessionEvent::SendFailed,
            },
            frame = inbound.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break SessionEvent::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = %id, error = %e, "transport lost");
                    break SessionEvent::TransportLost;
                }
            },
            _ = shutdown.changed() => {
                let _ = outbound.send(Message::Close(None)).await;
                break SessionEvent::Closed;
            }
        }
    };

    advance(id, &mut state, ended_by);
    context.hub.disconnect(id);
    context.metrics.subscribers.set(context.hub.len() as i64);
    info!(subscriber = %id, reason = ?ended_by, "subscriber disconnected");
}

fn advance(id: SubscriberId, state: &mut SubscriberState, event: SessionEvent) {
    match state.on(event) {
        Ok(next) => *state = next,
        Err(e) => debug!(subscriber = %id, error = %e, "ignored session event"),
    }
}
