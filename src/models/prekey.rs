use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longer-lived public key with an identity signature. One active signed
/// prekey per device; re-upload overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPrekey {
    #[serde(rename = "keyId", alias = "key_id")]
    pub key_id: i32,
    #[serde(rename = "publicKey", alias = "public_key")]
    pub public_key: String,
    pub signature: String,
}

/// Upload payload: identity material plus a batch of one-time prekeys.
#[derive(Debug, Clone, Deserialize)]
pub struct PrekeyBundleUpload {
    #[serde(alias = "identityKey")]
    pub identity_key: String,
    #[serde(alias = "registrationId")]
    pub registration_id: i32,
    #[serde(alias = "signedPreKey")]
    pub signed_prekey: SignedPrekey,
    #[serde(alias = "oneTimePreKeys", default)]
    pub one_time_prekeys: BTreeMap<i32, String>,
}

/// The bundle row as stored per (user, device).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPrekeyBundle {
    pub identity_key: String,
    pub registration_id: i32,
    pub signed_prekey: SignedPrekey,
    pub last_updated: DateTime<Utc>,
}

/// Single-use public key consumed once during session bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimePrekey {
    pub prekey_id: i32,
    pub prekey: String,
    pub used: bool,
}

/// Claim response: the bundle plus exactly one freshly claimed one-time key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimedBundle {
    pub identity_key: String,
    pub registration_id: i32,
    pub signed_prekey: SignedPrekey,
    pub one_time_prekeys: BTreeMap<i32, String>,
}
