//! Per-connection WebSocket actor.
//!
//! Lifecycle: `Connecting` → (cookie verification + token decode) →
//! `Authenticated` → `Joined` once the first room subscription lands →
//! stopped on disconnect or auth failure. Only authentication failures close
//! the connection; component errors surface as `error` events and the
//! session keeps running.

use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web_actors::ws;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::gateway;
use super::message_types::{WsInboundEvent, WsOutboundEvent};
use super::{SessionEntry, SubscriberId};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

enum SessionState {
    Connecting,
    Authenticated(SessionEntry),
    Joined(SessionEntry),
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct AuthSucceeded(SessionEntry);

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct AuthFailed(String);

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundText(String);

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct RoomJoined {
    room_id: String,
    subscriber_id: SubscriberId,
    reply: String,
}

pub struct WsSession {
    connection_id: Uuid,
    cookie_header: String,
    app_state: AppState,
    state: SessionState,
    // room_id -> subscription held by this connection
    subscriptions: HashMap<String, SubscriberId>,
    hb: Instant,
}

impl WsSession {
    pub fn new(connection_id: Uuid, cookie_header: String, app_state: AppState) -> Self {
        Self {
            connection_id,
            cookie_header,
            app_state,
            state: SessionState::Connecting,
            subscriptions: HashMap::new(),
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(connection_id = %act.connection_id, "heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn session(&self) -> Option<&SessionEntry> {
        match &self.state {
            SessionState::Connecting => None,
            SessionState::Authenticated(entry) | SessionState::Joined(entry) => Some(entry),
        }
    }

    fn send_event(ctx: &mut ws::WebsocketContext<Self>, event: &WsOutboundEvent) {
        match serde_json::to_string(event) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!(error = %e, "outbound event serialization failed"),
        }
    }

    fn dispatch(&self, event: WsInboundEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(session) = self.session().cloned() else {
            Self::send_event(
                ctx,
                &WsOutboundEvent::AuthFailed {
                    message: "Unauthorized".to_string(),
                },
            );
            return;
        };

        let state = self.app_state.clone();
        let addr = ctx.address();

        match event {
            WsInboundEvent::StartChat(payload) => {
                actix::spawn(async move {
                    match gateway::handle_start_chat(&state, &session, &payload).await {
                        Ok((room_id, reply)) => {
                            let (subscriber_id, mut rx) =
                                state.registry.add_subscriber(&room_id).await;

                            let forward = addr.clone();
                            tokio::spawn(async move {
                                while let Some(msg) = rx.recv().await {
                                    forward.do_send(OutboundText(msg));
                                }
                            });

                            let reply = serde_json::to_string(&reply).unwrap_or_default();
                            addr.do_send(RoomJoined {
                                room_id,
                                subscriber_id,
                                reply,
                            });
                        }
                        Err(e) => {
                            let event = gateway::error_event(&e);
                            if let Ok(text) = serde_json::to_string(&event) {
                                addr.do_send(OutboundText(text));
                            }
                        }
                    }
                });
            }
            WsInboundEvent::SendMessage(payload) => {
                actix::spawn(async move {
                    if let Err(e) = gateway::handle_send_message(&state, &session, &payload).await {
                        let event = gateway::error_event(&e);
                        if let Ok(text) = serde_json::to_string(&event) {
                            addr.do_send(OutboundText(text));
                        }
                    }
                    // Delivery of the message itself loops back through the
                    // fanout fabric to every subscriber, sender included.
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        let state = self.app_state.clone();
        let connection_id = self.connection_id;
        let cookie_header = self.cookie_header.clone();
        let addr = ctx.address();

        actix::spawn(async move {
            match gateway::authenticate(&state, connection_id, &cookie_header).await {
                Ok(entry) => addr.do_send(AuthSucceeded(entry)),
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "connection auth failed");
                    addr.do_send(AuthFailed("Authentication failed. Disconnecting...".into()));
                }
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(connection_id = %self.connection_id, "connection closed");

        let state = self.app_state.clone();
        let connection_id = self.connection_id;
        let subscriptions = std::mem::take(&mut self.subscriptions);

        actix::spawn(async move {
            state.sessions.remove(connection_id).await;
            for (room_id, subscriber_id) in subscriptions {
                state.registry.remove_subscriber(&room_id, subscriber_id).await;
            }
        });
    }
}

impl Handler<AuthSucceeded> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: AuthSucceeded, _ctx: &mut Self::Context) {
        self.state = SessionState::Authenticated(msg.0);
    }
}

impl Handler<AuthFailed> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: AuthFailed, ctx: &mut Self::Context) {
        Self::send_event(ctx, &WsOutboundEvent::AuthFailed { message: msg.0 });
        ctx.stop();
    }
}

impl Handler<OutboundText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<RoomJoined> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: RoomJoined, ctx: &mut Self::Context) {
        if let Some(stale) = self.subscriptions.insert(msg.room_id.clone(), msg.subscriber_id) {
            let registry = self.app_state.registry.clone();
            let room_id = msg.room_id.clone();
            actix::spawn(async move {
                registry.remove_subscriber(&room_id, stale).await;
            });
        }

        if let SessionState::Authenticated(entry) = &self.state {
            self.state = SessionState::Joined(entry.clone());
        }

        ctx.text(msg.reply);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(event) => self.dispatch(event, ctx),
                Err(e) => {
                    tracing::warn!(error = %e, "inbound event not parseable");
                    Self::send_event(
                        ctx,
                        &WsOutboundEvent::Error {
                            code: "validation_error".to_string(),
                            message: "malformed event payload".to_string(),
                        },
                    );
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary frames are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(?reason, "close frame received");
                ctx.stop();
            }
            _ => {}
        }
    }
}
