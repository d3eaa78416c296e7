use std::sync::Arc;

use crate::auth::{CookieVerifier, TokenCodec};
use crate::config::Config;
use crate::services::membership::MembershipLookup;
use crate::storage::ChatStore;
use crate::websocket::fanout::FanoutTransport;
use crate::websocket::{ConnectionRegistry, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub registry: ConnectionRegistry,
    pub sessions: SessionRegistry,
    pub fanout: Arc<dyn FanoutTransport>,
    pub verifier: Arc<dyn CookieVerifier>,
    pub membership: Arc<dyn MembershipLookup>,
    pub tokens: Arc<TokenCodec>,
    pub config: Arc<Config>,
}
