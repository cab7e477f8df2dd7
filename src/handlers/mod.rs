//! HTTP handlers and the request extractors they share.

pub mod entry_handlers;
pub mod health_handlers;
pub mod volume_handlers;

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the caller's account id.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// The authenticated account, taken from the `x-account-id` header.
///
/// Requests without a well-formed, non-nil UUID are rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountId(pub Uuid);

impl<S> FromRequestParts<S> for AccountId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACCOUNT_HEADER)
            .ok_or_else(|| AppError::unauthorized("missing x-account-id header"))?;
        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .filter(|id| !id.is_nil())
            .map(AccountId)
            .ok_or_else(|| AppError::unauthorized("invalid x-account-id header"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<AccountId, AppError> {
        let mut builder = Request::builder().uri("/volumes");
        if let Some(value) = header {
            builder = builder.header(ACCOUNT_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AccountId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_the_account_header() {
        let id = Uuid::new_v4();
        let account = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(account, AccountId(id));
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_accounts() {
        for header in [None, Some("not-a-uuid"), Some("00000000-0000-0000-0000-000000000000")] {
            let err = extract(header).await.unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
    }
}
