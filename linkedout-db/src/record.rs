use linkedout_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, Credentials, InvalidSecretHashError},
    comment::PartialComment,
    content::Content,
    post::PartialPost,
    user::{DisplayName, Email, User, UserProfile},
};
use linkedout_common::util::non_blank;
use std::collections::BTreeSet;
use time::{Duration, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub liked_posts: Vec<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub content: String,
    pub comments: i64,
    pub shares: i64,
    pub liked_by: Vec<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub content: String,
    pub liked_by: Vec<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct CredentialsRecord {
    pub email: String,
    pub user_snowflake: i64,
    pub password_hash: Vec<u8>,
    pub salt: Vec<u8>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn id_set<Marker: Ord>(snowflakes: Vec<i64>) -> BTreeSet<Id<Marker>> {
    snowflakes
        .into_iter()
        .map(|snowflake| snowflake.cast_unsigned().into())
        .collect()
}

fn non_negative(count: i64) -> u64 {
    count.max(0).cast_unsigned()
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            profile: UserProfile {
                name: DisplayName::new(&value.name)?,
                email: Email::new(&value.email)?,
                title: non_blank(Some(value.title)),
                company: non_blank(Some(value.company)),
                location: non_blank(Some(value.location)),
            },
            liked_posts: id_set(value.liked_posts),
        })
    }
}

impl TryFrom<PostRecord> for PartialPost {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_snowflake.cast_unsigned().into(),
            author_id: value.user_snowflake.cast_unsigned().into(),
            content: Content::new(&value.content)?,
            comments: non_negative(value.comments),
            shares: non_negative(value.shares),
            liked_by: id_set(value.liked_by),
        })
    }
}

impl TryFrom<CommentRecord> for PartialComment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_snowflake.cast_unsigned().into(),
            post_id: value.post_snowflake.cast_unsigned().into(),
            author_id: value.user_snowflake.cast_unsigned().into(),
            content: Content::new(&value.content)?,
            liked_by: id_set(value.liked_by),
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            email: Email::new(&value.email)?,
            password_hash: value.password_hash.try_into()?,
            salt: value
                .salt
                .try_into()
                .map_err(|_| InvalidSecretHashError)?,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
