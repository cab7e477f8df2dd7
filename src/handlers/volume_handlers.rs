//! HTTP handlers for volume operations.

use crate::{
    errors::AppError,
    handlers::AccountId,
    models::Volume,
    services::storage_service::{StorageService, VolumePatch},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /volumes`.
#[derive(Debug, Deserialize)]
pub struct CreateVolumeReq {
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
}

/// Body of `PATCH /volumes/{volume}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateVolumeReq {
    pub name: Option<String>,
    pub is_public: Option<bool>,
}

/// GET `/volumes` - every volume of the caller's account.
pub async fn list_volumes(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
) -> Result<Json<Vec<Volume>>, AppError> {
    Ok(Json(service.list_volumes(account_id).await?))
}

/// POST `/volumes` - create a volume.
pub async fn create_volume(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Json(req): Json<CreateVolumeReq>,
) -> Result<impl IntoResponse, AppError> {
    let volume = service
        .create_volume(account_id, &req.name, req.is_public)
        .await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

pub async fn get_volume(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path(volume): Path<String>,
) -> Result<Json<Volume>, AppError> {
    Ok(Json(service.get_volume(account_id, &volume).await?))
}

pub async fn get_volume_by_id(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> Result<Json<Volume>, AppError> {
    Ok(Json(service.get_volume_by_id(account_id, id).await?))
}

/// PATCH `/volumes/{volume}` - rename and/or change visibility.
pub async fn update_volume(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path(volume): Path<String>,
    Json(req): Json<UpdateVolumeReq>,
) -> Result<Json<Volume>, AppError> {
    let patch = VolumePatch {
        name: req.name,
        is_public: req.is_public,
    };
    Ok(Json(service.update_volume(account_id, &volume, patch).await?))
}

/// DELETE `/volumes/{volume}` - only empty volumes can go.
pub async fn delete_volume(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path(volume): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete_volume(account_id, &volume).await?;
    Ok(StatusCode::NO_CONTENT)
}
