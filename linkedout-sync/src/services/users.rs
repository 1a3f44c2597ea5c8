use crate::error::Result;
use linkedout_common::model::{
    Id,
    auth::{Credentials, check_new_password},
    user::{User, UserMarker, UserProfile},
};
use linkedout_db::{
    batch::{Write, WriteBatch},
    store::Store,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, instrument};

pub struct UserService<S> {
    store: Arc<S>,
}

impl<S> Clone for UserService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> UserService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_user_by_id(&self, id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.store.fetch_user(id).await?)
    }

    /// Every user, unpaginated.
    pub async fn get_all_users(&self) -> Result<Vec<User>> {
        Ok(self.store.fetch_users().await?)
    }

    #[instrument(skip_all)]
    pub async fn create_user(&self, profile: UserProfile) -> Result<User> {
        let user = self.new_user(profile)?;
        self.store
            .commit(&Write::InsertUser(user.clone()).into())
            .await?;
        debug!(user = %user.id, "Created user");

        Ok(user)
    }

    /// Creates the user and a password credential for its email in one batch.
    #[instrument(skip_all)]
    pub async fn register(&self, profile: UserProfile, password: &str) -> Result<User> {
        check_new_password(password)?;
        let user = self.new_user(profile)?;
        let credentials = Credentials::new(user.id, user.profile.email.clone(), password)?;

        let batch = WriteBatch::new()
            .with(Write::InsertUser(user.clone()))
            .with(Write::InsertCredentials(credentials));
        self.store.commit(&batch).await?;
        debug!(user = %user.id, "Registered user");

        Ok(user)
    }

    fn new_user(&self, profile: UserProfile) -> Result<User> {
        Ok(User {
            id: self.store.next_id()?,
            profile,
            liked_posts: BTreeSet::new(),
        })
    }
}
