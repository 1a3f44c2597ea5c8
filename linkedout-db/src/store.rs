use crate::batch::WriteBatch;
use linkedout_common::{
    model::{
        Id, ModelValidationError,
        auth::{Authentication, Credentials, SecretHash},
        comment::{CommentMarker, PartialComment},
        post::{PartialPost, PostMarker},
        user::{Email, User, UserMarker},
    },
    snowflake::SnowflakeTimestampError,
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Could not mint a document id: {0}")]
    IdGeneration(#[from] SnowflakeTimestampError),
    #[error("Write target {0} does not exist")]
    MissingDocument(DocumentRef),
    #[error("A document with key {0} already exists")]
    DuplicateKey(String),
    #[error("Only {applied} of {total} writes in a batch were applied")]
    PartialCommit { applied: usize, total: usize },
    #[error("The store is unavailable: {0}")]
    Unavailable(String),
}

/// Names the document a failed write pointed at.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum DocumentRef {
    User(Id<UserMarker>),
    Post(Id<PostMarker>),
    Comment(Id<CommentMarker>),
    Authentication,
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentRef::User(id) => write!(f, "user {id}"),
            DocumentRef::Post(id) => write!(f, "post {id}"),
            DocumentRef::Comment(id) => write!(f, "comment {id}"),
            DocumentRef::Authentication => f.write_str("authentication"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum PostOrder {
    /// Creation time descending, ties by id descending.
    #[default]
    Newest,
    /// Like count descending, then [`PostOrder::Newest`].
    MostLiked,
}

/// Filtered, sorted and limited read over the posts collection.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostQuery {
    pub author: Option<Id<UserMarker>>,
    pub order: PostOrder,
    /// Only posts strictly after this one in [`PostOrder::Newest`] order.
    pub after: Option<Id<PostMarker>>,
    pub limit: usize,
}

impl PostQuery {
    #[must_use]
    pub fn newest(limit: usize) -> Self {
        Self {
            author: None,
            order: PostOrder::Newest,
            after: None,
            limit,
        }
    }

    #[must_use]
    pub fn most_liked(limit: usize) -> Self {
        Self {
            order: PostOrder::MostLiked,
            ..Self::newest(limit)
        }
    }

    #[must_use]
    pub fn by_author(mut self, author: Id<UserMarker>) -> Self {
        self.author = Some(author);
        self
    }

    #[must_use]
    pub fn after(mut self, cursor: Id<PostMarker>) -> Self {
        self.after = Some(cursor);
        self
    }
}

/// The remote document store.
///
/// Reads are point reads or single queries. All mutations go through
/// [`Store::commit`], which either applies the whole batch, applies none of
/// it, or reports [`DbError::PartialCommit`] when the backend could not keep
/// the batch together.
pub trait Store: Send + Sync {
    /// Mints a fresh, time-ordered document id.
    fn next_id<Marker>(&self) -> Result<Id<Marker>>;

    fn fetch_user(&self, id: Id<UserMarker>)
    -> impl Future<Output = Result<Option<User>>> + Send;

    fn fetch_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;

    fn fetch_post(
        &self,
        id: Id<PostMarker>,
    ) -> impl Future<Output = Result<Option<PartialPost>>> + Send;

    fn query_posts(
        &self,
        query: PostQuery,
    ) -> impl Future<Output = Result<Vec<PartialPost>>> + Send;

    fn fetch_comment(
        &self,
        id: Id<CommentMarker>,
    ) -> impl Future<Output = Result<Option<PartialComment>>> + Send;

    /// Comments on `post`, newest first.
    fn query_comments(
        &self,
        post: Id<PostMarker>,
    ) -> impl Future<Output = Result<Vec<PartialComment>>> + Send;

    fn fetch_credentials(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<Credentials>>> + Send;

    fn fetch_auth(
        &self,
        token_hash: &SecretHash,
    ) -> impl Future<Output = Result<Option<Authentication>>> + Send;

    fn commit(&self, batch: &WriteBatch) -> impl Future<Output = Result<()>> + Send;
}
