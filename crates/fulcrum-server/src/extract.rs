//! Request extractors: the bearer-authenticated caller and JSON bodies
//! whose rejections use the API error shape.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use fulcrum_auth::token::parse_bearer;
use fulcrum_auth::{AuthError, Authenticator};
use fulcrum_core::auth::AuthIdentity;
use fulcrum_core::error::FulcrumError;
use fulcrum_core::repository::Store;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller. Rejects with 401 when the header is
/// missing, malformed or names no live credential.
#[derive(Debug, Clone)]
pub struct Caller(pub AuthIdentity);

impl<S: Store> FromRequestParts<AppState<S>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;
        let bearer = parse_bearer(header)?;

        match state.authenticator.authenticate(bearer).await? {
            Some(identity) => {
                tracing::debug!(caller = %identity.id(), role = %identity.role(), "authenticated");
                Ok(Caller(identity))
            }
            None => Err(AuthError::InvalidToken.into()),
        }
    }
}

/// A JSON request body. Bodies that fail to parse are rejected as
/// invalid input (400) instead of axum's plain-text 4xx.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::debug!(status = %rejection.status(), "rejected request body");
                Err(FulcrumError::validation(rejection.body_text()).into())
            }
        }
    }
}
