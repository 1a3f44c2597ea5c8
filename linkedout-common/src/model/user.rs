use crate::{
    model::{Id, post::PostMarker},
    util::non_blank,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DISPLAY_NAME_MAX_LEN: usize = 100;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Posts this user likes. Only the like toggle writes this set.
    pub liked_posts: BTreeSet<Id<PostMarker>>,
}

/// Profile fields captured at sign-up.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct UserProfile {
    pub name: DisplayName,
    pub email: Email,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

/// The slice of a user embedded into posts and comments at read time.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Author {
    pub id: Id<UserMarker>,
    pub name: DisplayName,
    pub title: Option<String>,
    pub company: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

/// A trimmed, lowercased address with a local part and a domain.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0:?}")]
pub struct InvalidEmailError(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The display name is invalid: {0:?}")]
pub struct InvalidDisplayNameError(String);

impl UserProfile {
    /// Normalizes optional fields, so blank strings are stored as absent.
    #[must_use]
    pub fn new(
        name: DisplayName,
        email: Email,
        title: Option<String>,
        company: Option<String>,
        location: Option<String>,
    ) -> Self {
        Self {
            name,
            email,
            title: non_blank(title),
            company: non_blank(company),
            location: non_blank(location),
        }
    }
}

impl User {
    #[must_use]
    pub fn has_liked(&self, post: Id<PostMarker>) -> bool {
        self.liked_posts.contains(&post)
    }

    #[must_use]
    pub fn author(&self) -> Author {
        Author {
            id: self.id,
            name: self.profile.name.clone(),
            title: self.profile.title.clone(),
            company: self.profile.company.clone(),
        }
    }
}

impl DisplayName {
    pub fn new(name: &str) -> Result<Self, InvalidDisplayNameError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > DISPLAY_NAME_MAX_LEN {
            return Err(InvalidDisplayNameError(name.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Display name as composed from the sign-up form.
    pub fn from_parts(first_name: &str, last_name: &str) -> Result<Self, InvalidDisplayNameError> {
        Self::new(&format!("{} {}", first_name.trim(), last_name.trim()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Email {
    pub fn new(email: &str) -> Result<Self, InvalidEmailError> {
        let normalized = email.trim().to_lowercase();
        match normalized.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(normalized))
            }
            _ => Err(InvalidEmailError(email.to_owned())),
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(&inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}

impl<'de> Deserialize<'de> for DisplayName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        DisplayName::new(&inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"DisplayName"))
    }
}
