//! WebSocket upgrade endpoint.
//!
//! The upgrade always succeeds; authentication runs inside the session's
//! `Connecting` state so the client receives an `auth_failed` event before
//! the connection closes, rather than a bare HTTP rejection.

use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use uuid::Uuid;

use super::cookie_header;
use crate::state::AppState;
use crate::websocket::session::WsSession;

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let connection_id = Uuid::new_v4();
    let cookies = cookie_header(&req);

    tracing::debug!(%connection_id, "websocket connection opening");

    let session = WsSession::new(connection_id, cookies, state.as_ref().clone());
    ws::start(session, &req, stream)
}
