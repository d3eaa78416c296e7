//! End-to-end scenarios over the in-memory stack: gateway functions driving
//! the room, message, cursor, and prekey services the way a connected
//! client would.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::RngCore;
use serde::Serialize;
use uuid::Uuid;

use direct_chat_service::auth::{StaticVerifier, TokenCodec};
use direct_chat_service::config::Config;
use direct_chat_service::error::AppError;
use direct_chat_service::models::message::{MessageType, NewMessage};
use direct_chat_service::models::prekey::{PrekeyBundleUpload, SignedPrekey};
use direct_chat_service::models::room::StartChat;
use direct_chat_service::services::membership::StaticMembership;
use direct_chat_service::services::prekey_service::PrekeyService;
use direct_chat_service::services::read_cursor_service::ReadCursorService;
use direct_chat_service::state::AppState;
use direct_chat_service::storage::memory::MemoryStore;
use direct_chat_service::websocket::fanout::LocalFanout;
use direct_chat_service::websocket::gateway;
use direct_chat_service::websocket::{ConnectionRegistry, SessionRegistry};

const SECRET: &str = "integration-secret";

#[derive(Serialize)]
struct TestClaims {
    user_id: String,
    exp: usize,
}

fn cookie_for(user_id: &str) -> String {
    let claims = TestClaims {
        user_id: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("access={token}")
}

fn test_state() -> AppState {
    let registry = ConnectionRegistry::new();
    let membership = StaticMembership::new();
    membership.add_member("teamAAAAA", "1001", "Alice");
    membership.add_member("teamAAAAA", "1002", "Bob");

    AppState {
        store: Arc::new(MemoryStore::new()),
        registry: registry.clone(),
        sessions: SessionRegistry::new(),
        fanout: Arc::new(LocalFanout::new(registry)),
        verifier: Arc::new(StaticVerifier),
        membership: Arc::new(membership),
        tokens: Arc::new(TokenCodec::new(SECRET.into(), Algorithm::HS256)),
        config: Arc::new(Config {
            port: 0,
            redis_url: None,
            backend_base_url: "http://backend.test".into(),
            secret_key: SECRET.into(),
            token_algorithm: Algorithm::HS256,
            cors_origins: vec![],
        }),
    }
}

async fn login(state: &AppState, user_id: &str) -> direct_chat_service::websocket::SessionEntry {
    gateway::authenticate(state, Uuid::new_v4(), &cookie_for(user_id))
        .await
        .unwrap()
}

fn text_message(room_id: &str, receiver_id: &str, content: &str) -> NewMessage {
    NewMessage {
        room_id: room_id.into(),
        receiver_id: receiver_id.into(),
        message_type: MessageType::Text,
        content: Some(content.into()),
        attachment_url: None,
        file_name: None,
        file_size: None,
        mime_type: None,
    }
}

#[tokio::test]
async fn start_chat_from_either_side_lands_in_the_same_room() {
    let state = test_state();
    let alice = login(&state, "1001").await;
    let bob = login(&state, "1002").await;

    let (room_a, _) = gateway::handle_start_chat(
        &state,
        &alice,
        &StartChat {
            team_id: "teamAAAAA".into(),
            receiver_id: "1002".into(),
        },
    )
    .await
    .unwrap();

    let (room_b, reply) = gateway::handle_start_chat(
        &state,
        &bob,
        &StartChat {
            team_id: "teamAAAAA".into(),
            receiver_id: "1001".into(),
        },
    )
    .await
    .unwrap();

    assert_eq!(room_a, room_b);
    assert_eq!(room_a, "room_teamAAAAA_1001_1002");

    // Bob's reply names Alice as the participant.
    match reply {
        direct_chat_service::websocket::message_types::WsOutboundEvent::ChatRoom { data, .. } => {
            assert_eq!(data.participant_id, "1001");
            assert_eq!(data.participant_name, "Alice");
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    // Exactly one room row exists.
    assert!(state
        .store
        .get_room("teamAAAAA", &room_a)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn message_flow_broadcasts_and_tracks_unread() {
    let state = test_state();
    let alice = login(&state, "1001").await;
    let bob = login(&state, "1002").await;

    let (room_id, _) = gateway::handle_start_chat(
        &state,
        &alice,
        &StartChat {
            team_id: "teamAAAAA".into(),
            receiver_id: "1002".into(),
        },
    )
    .await
    .unwrap();

    // Both connections subscribe; the sender receives its own broadcast.
    let (_a_sub, mut alice_rx) = state.registry.add_subscriber(&room_id).await;
    let (_b_sub, mut bob_rx) = state.registry.add_subscriber(&room_id).await;

    gateway::handle_send_message(&state, &alice, &text_message(&room_id, "1002", "hi bob"))
        .await
        .unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        let delivered: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(delivered["type"], "new_message");
        assert_eq!(delivered["content"], "hi bob");
        assert_eq!(delivered["sender_id"], "1001");
    }

    // Bob has one unread message until he opens the room.
    let unread = ReadCursorService::unread_count(state.store.as_ref(), "teamAAAAA", &room_id, "1002")
        .await
        .unwrap();
    assert_eq!(unread, 1);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    gateway::handle_start_chat(
        &state,
        &bob,
        &StartChat {
            team_id: "teamAAAAA".into(),
            receiver_id: "1001".into(),
        },
    )
    .await
    .unwrap();

    let unread = ReadCursorService::unread_count(state.store.as_ref(), "teamAAAAA", &room_id, "1002")
        .await
        .unwrap();
    assert_eq!(unread, 0);
}

#[tokio::test]
async fn validation_errors_surface_as_error_events() {
    let state = test_state();
    let alice = login(&state, "1001").await;

    let (room_id, _) = gateway::handle_start_chat(
        &state,
        &alice,
        &StartChat {
            team_id: "teamAAAAA".into(),
            receiver_id: "1002".into(),
        },
    )
    .await
    .unwrap();

    // Empty text content.
    let mut bad = text_message(&room_id, "1002", "");
    bad.content = None;
    let err = gateway::handle_send_message(&state, &alice, &bad).await.unwrap_err();
    match gateway::error_event(&err) {
        direct_chat_service::websocket::message_types::WsOutboundEvent::Error { code, .. } => {
            assert_eq!(code, "validation_error");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Image missing attachment metadata.
    let mut image = text_message(&room_id, "1002", "");
    image.content = None;
    image.message_type = MessageType::Image;
    assert!(matches!(
        gateway::handle_send_message(&state, &alice, &image).await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn unauthenticated_connections_never_get_a_session() {
    let state = test_state();
    let conn = Uuid::new_v4();

    let err = gateway::authenticate(&state, conn, "theme=dark")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
    assert!(state.sessions.get(conn).await.is_none());
    assert!(state.sessions.is_empty().await);
}

fn random_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

#[tokio::test]
async fn prekey_lifecycle_upload_claim_exhaust() {
    let state = test_state();
    let device = Uuid::new_v4();

    let upload = PrekeyBundleUpload {
        identity_key: random_key(),
        registration_id: 117,
        signed_prekey: SignedPrekey {
            key_id: 1,
            public_key: random_key(),
            signature: random_key(),
        },
        one_time_prekeys: (1..=3).map(|i| (i, random_key())).collect(),
    };

    assert!(!PrekeyService::exists(state.store.as_ref(), "1001", device)
        .await
        .unwrap());
    PrekeyService::upload_bundle(state.store.as_ref(), "1001", device, &upload)
        .await
        .unwrap();
    assert!(PrekeyService::exists(state.store.as_ref(), "1001", device)
        .await
        .unwrap());

    let mut claimed = HashSet::new();
    for _ in 0..3 {
        let bundle = PrekeyService::claim_bundle(state.store.as_ref(), "1001", device)
            .await
            .unwrap();
        assert_eq!(bundle.registration_id, 117);
        assert_eq!(bundle.one_time_prekeys.len(), 1);
        assert!(claimed.insert(*bundle.one_time_prekeys.keys().next().unwrap()));
    }
    assert_eq!(claimed, HashSet::from([1, 2, 3]));

    assert!(matches!(
        PrekeyService::claim_bundle(state.store.as_ref(), "1001", device).await,
        Err(AppError::Exhausted)
    ));

    // A device that never uploaded stays NotFound.
    assert!(matches!(
        PrekeyService::claim_bundle(state.store.as_ref(), "1001", Uuid::new_v4()).await,
        Err(AppError::NotFound)
    ));
}
