use linkedout_common::model::{
    Id, ModelValidationError,
    auth::{InvalidPasswordError, SecretHashError},
    content::InvalidContentError,
    like::LikeTarget,
    user::UserMarker,
};
use linkedout_db::store::{DbError, DocumentRef};
use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} was not found")]
    NotFound(DocumentRef),
    #[error("Invalid input: {0}")]
    Validation(#[from] ModelValidationError),
    /// One side of a like was written and the other was not.
    #[error(
        "Like of {target} by user {actor} was only partially written \
        ({applied} of {total} writes applied)"
    )]
    InconsistentState {
        target: LikeTarget,
        actor: Id<UserMarker>,
        applied: usize,
        total: usize,
    },
    #[error("Store request failed: {0}")]
    TransientStore(DbError),
    #[error("Already taken: {0}")]
    Conflict(String),
    #[error(transparent)]
    Credentials(#[from] SecretHashError),
    #[error("No user is signed in")]
    SignedOut,
}

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::MissingDocument(document) => SyncError::NotFound(document),
            DbError::DuplicateKey(key) => SyncError::Conflict(key),
            err => SyncError::TransientStore(err),
        }
    }
}

impl From<InvalidContentError> for SyncError {
    fn from(err: InvalidContentError) -> Self {
        SyncError::Validation(err.into())
    }
}

impl From<InvalidPasswordError> for SyncError {
    fn from(err: InvalidPasswordError) -> Self {
        SyncError::Validation(err.into())
    }
}
