//! Prekey exchange: bundle upload, existence probe, atomic one-time claim.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::prekey::{ClaimedBundle, OneTimePrekey, PrekeyBundleUpload, StoredPrekeyBundle};
use crate::storage::ChatStore;

pub struct PrekeyService;

impl PrekeyService {
    /// Existence probe only. Never allocates or consumes anything.
    pub async fn exists(store: &dyn ChatStore, user_id: &str, device_id: Uuid) -> AppResult<bool> {
        Ok(store.get_prekey_bundle(user_id, device_id).await?.is_some())
    }

    /// Upsert the device's identity material and add its one-time batch.
    ///
    /// Re-uploading the same signed-prekey id is an idempotent overwrite.
    /// One-time batches accumulate; ids already in the pool keep their
    /// stored state, so a used key can never come back.
    pub async fn upload_bundle(
        store: &dyn ChatStore,
        user_id: &str,
        device_id: Uuid,
        upload: &PrekeyBundleUpload,
    ) -> AppResult<()> {
        for (field, value) in [
            ("identity_key", &upload.identity_key),
            ("signed_prekey.public_key", &upload.signed_prekey.public_key),
            ("signed_prekey.signature", &upload.signed_prekey.signature),
        ] {
            if value.is_empty() || STANDARD.decode(value).is_err() {
                return Err(AppError::BadRequest(format!(
                    "{field} must be base64-encoded key material"
                )));
            }
        }

        let bundle = StoredPrekeyBundle {
            identity_key: upload.identity_key.clone(),
            registration_id: upload.registration_id,
            signed_prekey: upload.signed_prekey.clone(),
            last_updated: Utc::now(),
        };
        store.upsert_prekey_bundle(user_id, device_id, &bundle).await?;

        let batch: Vec<OneTimePrekey> = upload
            .one_time_prekeys
            .iter()
            .map(|(id, key)| OneTimePrekey {
                prekey_id: *id,
                prekey: key.clone(),
                used: false,
            })
            .collect();
        store
            .insert_one_time_prekeys(user_id, device_id, &batch)
            .await?;

        tracing::info!(
            user_id,
            %device_id,
            batch_size = batch.len(),
            "prekey bundle uploaded"
        );
        Ok(())
    }

    /// Claim the bundle plus exactly one unused one-time prekey.
    ///
    /// Failure modes in order: no bundle at all, then an empty unused pool.
    /// The mark-used write is conditional; losing it to a concurrent
    /// claimer re-selects from the remaining pool, so a key is handed out
    /// at most once and a retry can only terminate with a fresh key or
    /// exhaustion.
    pub async fn claim_bundle(
        store: &dyn ChatStore,
        user_id: &str,
        device_id: Uuid,
    ) -> AppResult<ClaimedBundle> {
        let bundle = store
            .get_prekey_bundle(user_id, device_id)
            .await?
            .ok_or(AppError::NotFound)?;

        loop {
            let unused = store.list_unused_prekeys(user_id, device_id).await?;
            let Some(candidate) = unused.into_iter().next() else {
                return Err(AppError::Exhausted);
            };

            match store
                .mark_prekey_used(user_id, device_id, candidate.prekey_id)
                .await
            {
                Ok(()) => {
                    let mut claimed = BTreeMap::new();
                    claimed.insert(candidate.prekey_id, candidate.prekey);
                    return Ok(ClaimedBundle {
                        identity_key: bundle.identity_key,
                        registration_id: bundle.registration_id,
                        signed_prekey: bundle.signed_prekey,
                        one_time_prekeys: claimed,
                    });
                }
                Err(AppError::Conflict) => {
                    tracing::debug!(
                        user_id,
                        %device_id,
                        prekey_id = candidate.prekey_id,
                        "one-time prekey claim raced, reselecting"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prekey::SignedPrekey;
    use crate::storage::memory::MemoryStore;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn upload_with_keys(ids: &[i32]) -> PrekeyBundleUpload {
        PrekeyBundleUpload {
            identity_key: STANDARD.encode([1u8; 32]),
            registration_id: 42,
            signed_prekey: SignedPrekey {
                key_id: 7,
                public_key: STANDARD.encode([2u8; 32]),
                signature: STANDARD.encode([3u8; 64]),
            },
            one_time_prekeys: ids
                .iter()
                .map(|id| (*id, STANDARD.encode([*id as u8; 32])))
                .collect(),
        }
    }

    #[tokio::test]
    async fn exists_is_a_pure_probe() {
        let store = MemoryStore::new();
        let device = Uuid::new_v4();
        assert!(!PrekeyService::exists(&store, "1001", device).await.unwrap());

        PrekeyService::upload_bundle(&store, "1001", device, &upload_with_keys(&[1]))
            .await
            .unwrap();
        assert!(PrekeyService::exists(&store, "1001", device).await.unwrap());
        // Probing did not consume the one key.
        assert_eq!(store.list_unused_prekeys("1001", device).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_without_bundle_is_not_found() {
        let store = MemoryStore::new();
        let err = PrekeyService::claim_bundle(&store, "1001", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn three_keys_three_claims_then_exhausted() {
        let store = MemoryStore::new();
        let device = Uuid::new_v4();
        PrekeyService::upload_bundle(&store, "1001", device, &upload_with_keys(&[1, 2, 3]))
            .await
            .unwrap();

        let mut seen = HashSet::new();
        for _ in 0..3 {
            let bundle = PrekeyService::claim_bundle(&store, "1001", device)
                .await
                .unwrap();
            assert_eq!(bundle.one_time_prekeys.len(), 1);
            let id = *bundle.one_time_prekeys.keys().next().unwrap();
            assert!(seen.insert(id));
        }

        let err = PrekeyService::claim_bundle(&store, "1001", device)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Exhausted));
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_key() {
        let store = Arc::new(MemoryStore::new());
        let device = Uuid::new_v4();
        let ids: Vec<i32> = (1..=8).collect();
        PrekeyService::upload_bundle(store.as_ref(), "1001", device, &upload_with_keys(&ids))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                PrekeyService::claim_bundle(store.as_ref(), "1001", device)
                    .await
                    .unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let bundle = handle.await.unwrap();
            let id = *bundle.one_time_prekeys.keys().next().unwrap();
            assert!(seen.insert(id), "prekey {id} delivered twice");
        }
        assert_eq!(seen.len(), 8);
        assert!(store.list_unused_prekeys("1001", device).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_claims_leave_exact_remainder() {
        let store = MemoryStore::new();
        let device = Uuid::new_v4();
        PrekeyService::upload_bundle(&store, "1001", device, &upload_with_keys(&[1, 2, 3, 4, 5]))
            .await
            .unwrap();

        for _ in 0..2 {
            PrekeyService::claim_bundle(&store, "1001", device)
                .await
                .unwrap();
        }
        assert_eq!(store.list_unused_prekeys("1001", device).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn reupload_overwrites_signed_prekey_and_accumulates_batches() {
        let store = MemoryStore::new();
        let device = Uuid::new_v4();
        PrekeyService::upload_bundle(&store, "1001", device, &upload_with_keys(&[1, 2]))
            .await
            .unwrap();

        let mut second = upload_with_keys(&[3, 4]);
        second.signed_prekey.key_id = 8;
        PrekeyService::upload_bundle(&store, "1001", device, &second)
            .await
            .unwrap();

        let bundle = store.get_prekey_bundle("1001", device).await.unwrap().unwrap();
        assert_eq!(bundle.signed_prekey.key_id, 8);
        assert_eq!(store.list_unused_prekeys("1001", device).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn malformed_key_material_is_rejected() {
        let store = MemoryStore::new();
        let mut upload = upload_with_keys(&[1]);
        upload.identity_key = "not base64!!".into();
        let err = PrekeyService::upload_bundle(&store, "1001", Uuid::new_v4(), &upload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
