use crate::{
    batch::{Write, WriteBatch},
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
use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
};
use tracing::debug;

/// How the next failing operation misbehaves.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Fault {
    /// Fail without touching any document.
    Unavailable,
    /// Apply this many writes of the next batch, then give up.
    AfterWrites(usize),
}

#[derive(Default)]
struct Documents {
    users: BTreeMap<Id<UserMarker>, User>,
    posts: BTreeMap<Id<PostMarker>, PartialPost>,
    comments: BTreeMap<Id<CommentMarker>, PartialComment>,
    credentials: BTreeMap<Email, Credentials>,
    authentications: HashMap<SecretHash, Authentication>,
}

#[derive(Default)]
struct Faults {
    next_commit: Option<Fault>,
    reads: bool,
}

/// In-process [`Store`]. Every batch is applied inside one critical section.
///
/// Faults can be injected to exercise failure handling: a failed read, a
/// rejected batch, or a batch that stops halfway as a store without
/// transactions would.
pub struct MemoryStore {
    documents: Mutex<Documents>,
    faults: Mutex<Faults>,
    snowflake_generator: Mutex<LinkedoutSnowflakeGenerator>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(WorkerId::default(), ProcessId::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            documents: Mutex::new(Documents::default()),
            faults: Mutex::new(Faults::default()),
            snowflake_generator: Mutex::new(LinkedoutSnowflakeGenerator::new(
                worker_id, process_id,
            )),
        }
    }

    /// Makes the next [`Store::commit`] fail in the given way.
    pub fn fail_next_commit(&self, fault: Fault) {
        self.faults.lock().next_commit = Some(fault);
    }

    /// Makes every read fail until turned off again.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.lock().reads = fail;
    }

    /// Drops a post as if another client had deleted it.
    pub fn remove_post(&self, id: Id<PostMarker>) {
        let mut documents = self.documents.lock();
        documents.posts.remove(&id);
        documents.comments.retain(|_, comment| comment.post_id != id);
    }

    fn check_read(&self) -> Result<()> {
        if self.faults.lock().reads {
            return Err(DbError::Unavailable("injected read failure".to_owned()));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Documents) -> T) -> Result<T> {
        self.check_read()?;
        Ok(f(&*self.documents.lock()))
    }
}

fn check_vacant(occupied: bool, key: impl FnOnce() -> String) -> Result<()> {
    if occupied {
        Err(DbError::DuplicateKey(key()))
    } else {
        Ok(())
    }
}

impl Documents {
    /// Fails without side effects if `write` cannot be applied.
    fn check(&self, write: &Write) -> Result<()> {
        let missing = match write {
            Write::InsertUser(user) => {
                return check_vacant(self.users.contains_key(&user.id), || {
                    format!("user {}", user.id)
                });
            }
            Write::InsertPost(post) => {
                return check_vacant(self.posts.contains_key(&post.id), || {
                    format!("post {}", post.id)
                });
            }
            Write::InsertComment(comment) => {
                return check_vacant(self.comments.contains_key(&comment.id), || {
                    format!("comment {}", comment.id)
                });
            }
            Write::InsertCredentials(credentials) => {
                return check_vacant(
                    self.credentials.contains_key(&credentials.email),
                    || format!("email {}", credentials.email.get()),
                );
            }
            Write::InsertAuthentication(_) => None,
            Write::IncrementPostComments(post)
            | Write::AddPostLiker { post, .. }
            | Write::RemovePostLiker { post, .. } => {
                (!self.posts.contains_key(post)).then_some(DocumentRef::Post(*post))
            }
            Write::AddLikedPost { user, .. } | Write::RemoveLikedPost { user, .. } => {
                (!self.users.contains_key(user)).then_some(DocumentRef::User(*user))
            }
            Write::AddCommentLiker { comment, .. } | Write::RemoveCommentLiker { comment, .. } => {
                (!self.comments.contains_key(comment)).then_some(DocumentRef::Comment(*comment))
            }
            Write::DeleteAuthentication(token_hash) => (!self
                .authentications
                .contains_key(token_hash))
            .then_some(DocumentRef::Authentication),
        };

        match missing {
            Some(document) => Err(DbError::MissingDocument(document)),
            None => Ok(()),
        }
    }

    /// Applies a write that already passed [`Documents::check`].
    fn apply(&mut self, write: &Write) {
        match write {
            Write::InsertUser(user) => {
                self.users.insert(user.id, user.clone());
            }
            Write::InsertPost(post) => {
                self.posts.insert(post.id, post.clone());
            }
            Write::InsertComment(comment) => {
                self.comments.insert(comment.id, comment.clone());
            }
            Write::IncrementPostComments(post) => {
                if let Some(post) = self.posts.get_mut(post) {
                    post.comments += 1;
                }
            }
            Write::AddPostLiker { post, user } => {
                if let Some(post) = self.posts.get_mut(post) {
                    post.liked_by.insert(*user);
                }
            }
            Write::RemovePostLiker { post, user } => {
                if let Some(post) = self.posts.get_mut(post) {
                    post.liked_by.remove(user);
                }
            }
            Write::AddLikedPost { user, post } => {
                if let Some(user) = self.users.get_mut(user) {
                    user.liked_posts.insert(*post);
                }
            }
            Write::RemoveLikedPost { user, post } => {
                if let Some(user) = self.users.get_mut(user) {
                    user.liked_posts.remove(post);
                }
            }
            Write::AddCommentLiker { comment, user } => {
                if let Some(comment) = self.comments.get_mut(comment) {
                    comment.liked_by.insert(*user);
                }
            }
            Write::RemoveCommentLiker { comment, user } => {
                if let Some(comment) = self.comments.get_mut(comment) {
                    comment.liked_by.remove(user);
                }
            }
            Write::InsertCredentials(credentials) => {
                self.credentials
                    .insert(credentials.email.clone(), credentials.clone());
            }
            Write::InsertAuthentication(authentication) => {
                self.authentications
                    .insert(authentication.token_hash.clone(), authentication.clone());
            }
            Write::DeleteAuthentication(token_hash) => {
                self.authentications.remove(token_hash);
            }
        }
    }
}

impl Store for MemoryStore {
    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        Ok(self.snowflake_generator.lock().generate()?.into())
    }

    async fn fetch_user(&self, id: Id<UserMarker>) -> Result<Option<User>> {
        self.read(|documents| documents.users.get(&id).cloned())
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        self.read(|documents| documents.users.values().cloned().collect())
    }

    async fn fetch_post(&self, id: Id<PostMarker>) -> Result<Option<PartialPost>> {
        self.read(|documents| documents.posts.get(&id).cloned())
    }

    async fn query_posts(&self, query: PostQuery) -> Result<Vec<PartialPost>> {
        self.read(|documents| {
            let mut posts: Vec<PartialPost> = documents
                .posts
                .values()
                .rev()
                .filter(|post| query.author.is_none_or(|author| post.author_id == author))
                .filter(|post| query.after.is_none_or(|cursor| post.id < cursor))
                .cloned()
                .collect();

            if query.order == PostOrder::MostLiked {
                posts.sort_by_key(|post| (Reverse(post.likes()), Reverse(post.id)));
            }
            posts.truncate(query.limit);
            posts
        })
    }

    async fn fetch_comment(&self, id: Id<CommentMarker>) -> Result<Option<PartialComment>> {
        self.read(|documents| documents.comments.get(&id).cloned())
    }

    async fn query_comments(&self, post: Id<PostMarker>) -> Result<Vec<PartialComment>> {
        self.read(|documents| {
            documents
                .comments
                .values()
                .rev()
                .filter(|comment| comment.post_id == post)
                .cloned()
                .collect()
        })
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<Credentials>> {
        self.read(|documents| documents.credentials.get(email).cloned())
    }

    async fn fetch_auth(&self, token_hash: &SecretHash) -> Result<Option<Authentication>> {
        self.read(|documents| documents.authentications.get(token_hash).cloned())
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        let fault = self.faults.lock().next_commit.take();
        let mut documents = self.documents.lock();

        match fault {
            Some(Fault::Unavailable) => {
                return Err(DbError::Unavailable("injected commit failure".to_owned()));
            }
            Some(Fault::AfterWrites(applied)) if applied < batch.len() => {
                for write in &batch.writes()[..applied] {
                    documents.check(write)?;
                    documents.apply(write);
                }
                return Err(DbError::PartialCommit {
                    applied,
                    total: batch.len(),
                });
            }
            _ => {}
        }

        for write in batch.writes() {
            documents.check(write)?;
        }
        for write in batch.writes() {
            documents.apply(write);
        }
        debug!(writes = batch.len(), "Committed write batch");

        Ok(())
    }
}
