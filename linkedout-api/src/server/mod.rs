use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use linkedout_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenDecodeError, SecretHashError},
        post::PostMarker,
        user::UserMarker,
    },
    util::PositiveDuration,
};
use linkedout_db::{postgres::PgStore, store::DbError};
use linkedout_sync::{error::SyncError, services::Services};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

mod auth;
mod json;
mod query;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub services: Services<PgStore>,
    pub store: Arc<PgStore>,
    pub token_ttl: Option<PositiveDuration>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error(transparent)]
    SecretHash(#[from] SecretHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Email or password did not match")]
    InvalidCredentials,
    #[error("Invalid input: {0}")]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::Sync(SyncError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken
            | ServerError::InvalidCredentials
            | ServerError::Sync(SyncError::SignedOut) => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::Validation(_)
            | ServerError::Sync(SyncError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::Sync(SyncError::Conflict(_)) => StatusCode::CONFLICT,
            ServerError::JsonResponse(_)
            | ServerError::SecretHash(_)
            | ServerError::Database(_)
            | ServerError::Sync(
                SyncError::InconsistentState { .. }
                | SyncError::TransientStore(_)
                | SyncError::Credentials(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use axum::http::StatusCode;
    use linkedout_common::model::{Id, like::LikeTarget};
    use linkedout_db::store::{DbError, DocumentRef};
    use linkedout_sync::error::SyncError;

    #[test]
    fn sync_errors_map_to_statuses() {
        let not_found = ServerError::from(SyncError::NotFound(DocumentRef::Post(Id::from(1_u64))));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let inconsistent = ServerError::from(SyncError::InconsistentState {
            target: LikeTarget::Post(Id::from(1_u64)),
            actor: Id::from(2_u64),
            applied: 1,
            total: 2,
        });
        assert_eq!(inconsistent.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let transient = ServerError::from(SyncError::TransientStore(DbError::Unavailable(
            "down".to_owned(),
        )));
        assert_eq!(transient.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let conflict = ServerError::from(SyncError::Conflict("email".to_owned()));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        assert_eq!(
            ServerError::InvalidToken.status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
