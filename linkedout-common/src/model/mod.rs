pub mod auth;
pub mod comment;
pub mod content;
pub mod like;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::{InvalidPasswordError, InvalidSecretHashError},
        content::InvalidContentError,
        user::{InvalidDisplayNameError, InvalidEmailError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Content(#[from] InvalidContentError),
    #[error(transparent)]
    DisplayName(#[from] InvalidDisplayNameError),
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    Password(#[from] InvalidPasswordError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    SecretHash(#[from] InvalidSecretHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LinkedoutEpoch;
impl Epoch for LinkedoutEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type LinkedoutSnowflake = Snowflake<LinkedoutEpoch>;
pub type LinkedoutSnowflakeGenerator = SnowflakeGenerator<LinkedoutEpoch>;

/// Document id tagged with the kind of document it points at.
///
/// Ids order by creation time, then by minting order, which is the total
/// order every feed is sorted by.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(LinkedoutSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: LinkedoutSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> LinkedoutSnowflake {
        self.0
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime {
        self.0.created_at()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<LinkedoutSnowflake> for Id<Marker> {
    fn from(value: LinkedoutSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(LinkedoutSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
