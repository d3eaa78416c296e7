//! Prekey bundle endpoints: existence probe, claim, upload.

use actix_web::{get, post, web, HttpResponse};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::prekey::PrekeyBundleUpload;
use crate::models::validate_user_id;
use crate::services::prekey_service::PrekeyService;
use crate::state::AppState;

fn checked_user_id(user_id: &str) -> Result<(), AppError> {
    validate_user_id(user_id).map_err(|_| AppError::BadRequest("invalid user id".into()))
}

#[get("/api/prekeys/exists/{user_id}/{device_id}")]
pub async fn check_prekey_bundle_exists(
    state: web::Data<AppState>,
    path: web::Path<(String, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (user_id, device_id) = path.into_inner();
    checked_user_id(&user_id)?;

    let exists = PrekeyService::exists(state.store.as_ref(), &user_id, device_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "exists": exists })))
}

/// Claims one one-time prekey as a side effect: each GET hands out a key
/// that will never be served again.
#[get("/api/prekeys/{user_id}/{device_id}")]
pub async fn claim_prekey_bundle(
    state: web::Data<AppState>,
    path: web::Path<(String, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (user_id, device_id) = path.into_inner();
    checked_user_id(&user_id)?;

    let bundle = PrekeyService::claim_bundle(state.store.as_ref(), &user_id, device_id).await?;
    Ok(HttpResponse::Ok().json(bundle))
}

#[post("/api/prekeys/{user_id}/{device_id}")]
pub async fn upload_prekey_bundle(
    state: web::Data<AppState>,
    path: web::Path<(String, Uuid)>,
    bundle: web::Json<PrekeyBundleUpload>,
) -> Result<HttpResponse, AppError> {
    let (user_id, device_id) = path.into_inner();
    checked_user_id(&user_id)?;

    PrekeyService::upload_bundle(state.store.as_ref(), &user_id, device_id, &bundle).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}
