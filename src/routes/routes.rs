//! Defines routes for all volume and entry operations.
//!
//! ## Structure
//! - **Volume endpoints**
//!   - `GET    /volumes` - list the account's volumes
//!   - `POST   /volumes` - create volume
//!   - `GET    /volumes/{volume}` - volume metadata
//!   - `PATCH  /volumes/{volume}` - rename / change visibility
//!   - `DELETE /volumes/{volume}` - delete an empty volume
//!   - `GET    /volume-by-id/{id}` - volume metadata by id
//!
//! - **Entry endpoints**
//!   - `GET    /volumes/{volume}/entries` - list entries (prefix, delimiter, max-keys)
//!   - `PUT    /volumes/{volume}/entries/{*key}` - upload file, or create folder for keys ending in `/`
//!   - `GET    /volumes/{volume}/entries/{*key}` - download file / folder metadata
//!   - `HEAD   /volumes/{volume}/entries/{*key}` - metadata only
//!   - `PATCH  /volumes/{volume}/entries/{*key}` - rename/move / change visibility
//!   - `DELETE /volumes/{volume}/entries/{*key}` - delete, folders recursively
//!   - `POST   /volumes/{volume}/copy/{*key}` - copy next to the source
//!   - `POST   /volumes/{volume}/upload` - multipart upload
//!   - `GET    /public/{account_id}/{volume}/{*key}` - unauthenticated read of public entries
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        entry_handlers::{
            copy_entry, delete_entry, get_entry, get_public_entry, head_entry, list_entries,
            put_entry, update_entry, upload_entries,
        },
        health_handlers::{healthz, readyz},
        volume_handlers::{
            create_volume, delete_volume, get_volume, get_volume_by_id, list_volumes,
            update_volume,
        },
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router for every endpoint. Handlers share `StorageService` as state.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Volume routes
        .route("/volumes", get(list_volumes).post(create_volume))
        .route(
            "/volumes/{volume}",
            get(get_volume).patch(update_volume).delete(delete_volume),
        )
        .route("/volume-by-id/{id}", get(get_volume_by_id))
        // Entry routes
        .route("/volumes/{volume}/entries", get(list_entries))
        .route(
            "/volumes/{volume}/entries/{*key}",
            get(get_entry)
                .put(put_entry)
                .head(head_entry)
                .patch(update_entry)
                .delete(delete_entry),
        )
        .route("/volumes/{volume}/copy/{*key}", post(copy_entry))
        .route("/volumes/{volume}/upload", post(upload_entries))
        .route("/public/{account_id}/{volume}/{*key}", get(get_public_entry))
}
