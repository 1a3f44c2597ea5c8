use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use linkedout_common::{
    model::{
        Id,
        auth::{AuthToken, Authentication, IssuedToken, SecretHash},
        user::UserMarker,
    },
    util::PositiveDuration,
};
use linkedout_db::{
    batch::Write,
    postgres::PgStore,
    store::Store,
};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The user behind a valid bearer token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: SecretHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &SecretHash {
        &self.token_hash
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<PgStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let token_hash = request_token.hash()?;

        let authentication = Arc::<PgStore>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id
            || authentication.is_expired_at(UtcDateTime::now())
        {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
            token_hash,
        })
    }
}

/// Mints a token for `user` and stores its hash.
pub async fn issue_token(
    store: &PgStore,
    user: Id<UserMarker>,
    ttl: Option<PositiveDuration>,
) -> Result<IssuedToken> {
    let token = AuthToken::generate_random(user);
    let authentication = Authentication {
        user,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: ttl,
    };

    store
        .commit(&Write::InsertAuthentication(authentication).into())
        .await?;
    debug!(%user, "Issued auth token");

    Ok(IssuedToken {
        user_id: user,
        token: token.as_token_str(),
    })
}
