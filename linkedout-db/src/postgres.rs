use crate::{
    batch::{Write, WriteBatch},
    record::{AuthenticationRecord, CommentRecord, CredentialsRecord, PostRecord, UserRecord},
    store::{DbError, DocumentRef, PostOrder, PostQuery, Result, Store},
};
use linkedout_common::{
    model::{
        Id, LinkedoutSnowflakeGenerator,
        auth::{Authentication, Credentials, SecretHash},
        comment::{CommentMarker, PartialComment},
        post::{PartialPost, PostMarker},
        user::{Email, User, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use parking_lot::Mutex;
use sqlx::{PgConnection, PgPool, Postgres, Transaction, postgres::PgQueryResult, query, query_as};
use time::PrimitiveDateTime;
use tracing::debug;

const NEWEST_POSTS: &str = "
    SELECT post_snowflake, user_snowflake, content, comments, shares, liked_by
    FROM posts.posts
    WHERE ($1::BIGINT IS NULL OR user_snowflake = $1)
      AND ($2::BIGINT IS NULL OR post_snowflake < $2)
    ORDER BY post_snowflake DESC
    LIMIT $3
";

const MOST_LIKED_POSTS: &str = "
    SELECT post_snowflake, user_snowflake, content, comments, shares, liked_by
    FROM posts.posts
    WHERE ($1::BIGINT IS NULL OR user_snowflake = $1)
      AND ($2::BIGINT IS NULL OR post_snowflake < $2)
    ORDER BY likes DESC, post_snowflake DESC
    LIMIT $3
";

/// [`Store`] backed by PostgreSQL. Batches run in one transaction.
pub struct PgStore {
    pool: PgPool,
    snowflake_generator: Mutex<LinkedoutSnowflakeGenerator>,
}

fn snowflake<Marker>(id: Id<Marker>) -> i64 {
    id.snowflake().get().cast_signed()
}

fn expect_row(result: &PgQueryResult, document: DocumentRef) -> Result<()> {
    if result.rows_affected() == 0 {
        Err(DbError::MissingDocument(document))
    } else {
        Ok(())
    }
}

fn classify(err: sqlx::Error, key: impl FnOnce() -> String) -> DbError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::DuplicateKey(key())
        }
        err => DbError::Sqlx(err),
    }
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = Mutex::new(LinkedoutSnowflakeGenerator::new(
            worker_id, process_id,
        ));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(url: &str, worker_id: WorkerId, process_id: ProcessId) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn apply(connection: &mut PgConnection, write: &Write) -> Result<()> {
        match write {
            Write::InsertUser(user) => {
                let profile = &user.profile;
                let liked_posts: Vec<i64> = user.liked_posts.iter().copied().map(snowflake).collect();
                query(
                    "
                    INSERT INTO users.users
                        (user_snowflake, name, email, title, company, location, liked_posts)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ",
                )
                .bind(snowflake(user.id))
                .bind(profile.name.get())
                .bind(profile.email.get())
                .bind(profile.title.as_deref().unwrap_or_default())
                .bind(profile.company.as_deref().unwrap_or_default())
                .bind(profile.location.as_deref().unwrap_or_default())
                .bind(liked_posts)
                .execute(connection)
                .await
                .map_err(|err| classify(err, || format!("user {}", user.id)))?;
            }
            Write::InsertPost(post) => {
                let liked_by: Vec<i64> = post.liked_by.iter().copied().map(snowflake).collect();
                query(
                    "
                    INSERT INTO posts.posts
                        (post_snowflake, user_snowflake, content, comments, shares, liked_by)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ",
                )
                .bind(snowflake(post.id))
                .bind(snowflake(post.author_id))
                .bind(post.content.get())
                .bind(post.comments.cast_signed())
                .bind(post.shares.cast_signed())
                .bind(liked_by)
                .execute(connection)
                .await
                .map_err(|err| classify(err, || format!("post {}", post.id)))?;
            }
            Write::InsertComment(comment) => {
                let liked_by: Vec<i64> = comment.liked_by.iter().copied().map(snowflake).collect();
                query(
                    "
                    INSERT INTO posts.comments
                        (comment_snowflake, post_snowflake, user_snowflake, content, liked_by)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(snowflake(comment.id))
                .bind(snowflake(comment.post_id))
                .bind(snowflake(comment.author_id))
                .bind(comment.content.get())
                .bind(liked_by)
                .execute(connection)
                .await
                .map_err(|err| classify(err, || format!("comment {}", comment.id)))?;
            }
            Write::IncrementPostComments(post) => {
                let result = query(
                    "UPDATE posts.posts SET comments = comments + 1 WHERE post_snowflake = $1",
                )
                .bind(snowflake(*post))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::Post(*post))?;
            }
            Write::AddPostLiker { post, user } => {
                let result = query(
                    "
                    UPDATE posts.posts
                    SET liked_by = CASE
                        WHEN $2 = ANY(liked_by) THEN liked_by
                        ELSE array_append(liked_by, $2)
                    END
                    WHERE post_snowflake = $1
                    ",
                )
                .bind(snowflake(*post))
                .bind(snowflake(*user))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::Post(*post))?;
            }
            Write::RemovePostLiker { post, user } => {
                let result = query(
                    "UPDATE posts.posts SET liked_by = array_remove(liked_by, $2) WHERE post_snowflake = $1",
                )
                .bind(snowflake(*post))
                .bind(snowflake(*user))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::Post(*post))?;
            }
            Write::AddLikedPost { user, post } => {
                let result = query(
                    "
                    UPDATE users.users
                    SET liked_posts = CASE
                        WHEN $2 = ANY(liked_posts) THEN liked_posts
                        ELSE array_append(liked_posts, $2)
                    END
                    WHERE user_snowflake = $1
                    ",
                )
                .bind(snowflake(*user))
                .bind(snowflake(*post))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::User(*user))?;
            }
            Write::RemoveLikedPost { user, post } => {
                let result = query(
                    "UPDATE users.users SET liked_posts = array_remove(liked_posts, $2) WHERE user_snowflake = $1",
                )
                .bind(snowflake(*user))
                .bind(snowflake(*post))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::User(*user))?;
            }
            Write::AddCommentLiker { comment, user } => {
                let result = query(
                    "
                    UPDATE posts.comments
                    SET liked_by = CASE
                        WHEN $2 = ANY(liked_by) THEN liked_by
                        ELSE array_append(liked_by, $2)
                    END
                    WHERE comment_snowflake = $1
                    ",
                )
                .bind(snowflake(*comment))
                .bind(snowflake(*user))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::Comment(*comment))?;
            }
            Write::RemoveCommentLiker { comment, user } => {
                let result = query(
                    "UPDATE posts.comments SET liked_by = array_remove(liked_by, $2) WHERE comment_snowflake = $1",
                )
                .bind(snowflake(*comment))
                .bind(snowflake(*user))
                .execute(connection)
                .await?;
                expect_row(&result, DocumentRef::Comment(*comment))?;
            }
            Write::InsertCredentials(credentials) => {
                query(
                    "
                    INSERT INTO users.credentials (email, user_snowflake, password_hash, salt)
                    VALUES ($1, $2, $3, $4)
                    ",
                )
                .bind(credentials.email.get())
                .bind(snowflake(credentials.user))
                .bind(credentials.password_hash.0.as_slice())
                .bind(credentials.salt.as_slice())
                .execute(connection)
                .await
                .map_err(|err| classify(err, || format!("email {}", credentials.email.get())))?;
            }
            Write::InsertAuthentication(authentication) => {
                let created_at = authentication.created_at;
                query(
                    "
                    INSERT INTO users.authentications
                        (token_hash, user_snowflake, created_at, expires_after_seconds)
                    VALUES ($1, $2, $3, $4)
                    ",
                )
                .bind(authentication.token_hash.0.as_slice())
                .bind(snowflake(authentication.user))
                .bind(PrimitiveDateTime::new(created_at.date(), created_at.time()))
                .bind(
                    authentication
                        .expires_after
                        .map(|expires_after| expires_after.get().whole_seconds()),
                )
                .execute(connection)
                .await?;
            }
            Write::DeleteAuthentication(token_hash) => {
                let result = query("DELETE FROM users.authentications WHERE token_hash = $1")
                    .bind(token_hash.0.as_slice())
                    .execute(connection)
                    .await?;
                expect_row(&result, DocumentRef::Authentication)?;
            }
        }

        Ok(())
    }
}

impl Store for PgStore {
    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        Ok(self.snowflake_generator.lock().generate()?.into())
    }

    async fn fetch_user(&self, id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_snowflake, name, email, title, company, location, liked_posts
            FROM users.users
            WHERE user_snowflake = $1
            ",
        )
        .bind(snowflake(id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT user_snowflake, name, email, title, company, location, liked_posts
            FROM users.users
            ORDER BY user_snowflake
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    async fn fetch_post(&self, id: Id<PostMarker>) -> Result<Option<PartialPost>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT post_snowflake, user_snowflake, content, comments, shares, liked_by
            FROM posts.posts
            WHERE post_snowflake = $1
            ",
        )
        .bind(snowflake(id))
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(PartialPost::try_from).transpose()?;
        Ok(post)
    }

    async fn query_posts(&self, post_query: PostQuery) -> Result<Vec<PartialPost>> {
        let sql = match post_query.order {
            PostOrder::Newest => NEWEST_POSTS,
            PostOrder::MostLiked => MOST_LIKED_POSTS,
        };
        let limit = i64::try_from(post_query.limit).unwrap_or(i64::MAX);

        let records = query_as::<_, PostRecord>(sql)
            .bind(post_query.author.map(snowflake))
            .bind(post_query.after.map(snowflake))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(PartialPost::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn fetch_comment(&self, id: Id<CommentMarker>) -> Result<Option<PartialComment>> {
        let record = query_as::<_, CommentRecord>(
            "
            SELECT comment_snowflake, post_snowflake, user_snowflake, content, liked_by
            FROM posts.comments
            WHERE comment_snowflake = $1
            ",
        )
        .bind(snowflake(id))
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(PartialComment::try_from).transpose()?;
        Ok(comment)
    }

    async fn query_comments(&self, post: Id<PostMarker>) -> Result<Vec<PartialComment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT comment_snowflake, post_snowflake, user_snowflake, content, liked_by
            FROM posts.comments
            WHERE post_snowflake = $1
            ORDER BY comment_snowflake DESC
            ",
        )
        .bind(snowflake(post))
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(PartialComment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT email, user_snowflake, password_hash, salt
            FROM users.credentials
            WHERE email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn fetch_auth(&self, token_hash: &SecretHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_snowflake, token_hash, created_at, expires_after_seconds
            FROM users.authentications
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        let mut transaction: Transaction<'_, Postgres> = self.pool.begin().await?;

        for write in batch.writes() {
            Self::apply(&mut transaction, write).await?;
        }

        transaction.commit().await?;
        debug!(writes = batch.len(), "Committed write batch");

        Ok(())
    }
}
