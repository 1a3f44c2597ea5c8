use linkedout_common::model::{
    Id,
    auth::{Authentication, Credentials, SecretHash},
    comment::{CommentMarker, PartialComment},
    post::{PartialPost, PostMarker},
    user::{User, UserMarker},
};

/// A single document mutation.
///
/// Liker and liked-post writes have set semantics: adding a present member
/// or removing an absent one leaves the document unchanged. Like counters
/// are always recomputed from the liker set by the store.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Write {
    InsertUser(User),
    InsertPost(PartialPost),
    InsertComment(PartialComment),
    IncrementPostComments(Id<PostMarker>),
    AddPostLiker {
        post: Id<PostMarker>,
        user: Id<UserMarker>,
    },
    RemovePostLiker {
        post: Id<PostMarker>,
        user: Id<UserMarker>,
    },
    AddLikedPost {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    RemoveLikedPost {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    AddCommentLiker {
        comment: Id<CommentMarker>,
        user: Id<UserMarker>,
    },
    RemoveCommentLiker {
        comment: Id<CommentMarker>,
        user: Id<UserMarker>,
    },
    InsertCredentials(Credentials),
    InsertAuthentication(Authentication),
    DeleteAuthentication(SecretHash),
}

/// Writes that must land together.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    #[must_use]
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl From<Write> for WriteBatch {
    fn from(write: Write) -> Self {
        Self::new().with(write)
    }
}
