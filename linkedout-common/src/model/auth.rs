use crate::{
    model::{
        Id,
        user::{Email, UserMarker},
    },
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const SALT_LEN: usize = 18;
pub const SECRET_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_MIN_LEN: usize = 6;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing secret failed: {0}")]
pub struct SecretHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// Bearer token handed to a signed-in client. Only its hash is persisted.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; SALT_LEN],
}

/// Argon2 digest of a token core or a password.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SecretHash(pub Box<[u8; SECRET_HASH_LEN]>);

/// A live session issued by sign-up or sign-in.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: SecretHash,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

/// Email and password login for one user.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: Id<UserMarker>,
    pub email: Email,
    pub password_hash: SecretHash,
    pub salt: [u8; SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

/// Response to a successful sign-up or sign-in.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct IssuedToken {
    pub user_id: Id<UserMarker>,
    pub token: String,
}

fn hash_secret(secret: &[u8], salt: &[u8; SALT_LEN]) -> Result<SecretHash, SecretHashError> {
    let mut hash = Box::new([0; SECRET_HASH_LEN]);
    Argon2::default()
        .hash_password_into(secret, salt, &mut *hash)
        .map_err(SecretHashError)?;

    Ok(SecretHash(hash))
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            core: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<SecretHash, SecretHashError> {
        hash_secret(&self.core, &self.salt)
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = u64::from_str(user_id_part)
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Authentication {
    /// A lifetime that reaches past the representable range never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_after.is_some_and(|expires_after| {
            self.created_at
                .checked_add(expires_after.get())
                .is_some_and(|expires_at| expires_at < now)
        })
    }
}

impl Credentials {
    pub fn new(
        user: Id<UserMarker>,
        email: Email,
        password: &str,
    ) -> Result<Self, SecretHashError> {
        let salt = rand::random();
        let password_hash = hash_secret(password.as_bytes(), &salt)?;

        Ok(Self {
            user,
            email,
            password_hash,
            salt,
        })
    }

    pub fn verify(&self, password: &str) -> Result<bool, SecretHashError> {
        Ok(hash_secret(password.as_bytes(), &self.salt)? == self.password_hash)
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for SecretHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretHash").field(&"[redacted]").finish()
    }
}

impl Debug for SignUp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUp")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

impl Debug for SignIn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignIn")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The secret hash had an invalid length")]
pub struct InvalidSecretHashError;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Passwords need at least {PASSWORD_MIN_LEN} characters")]
pub struct InvalidPasswordError;

/// Checks a password chosen at sign-up. Sign-in accepts whatever was typed.
pub fn check_new_password(password: &str) -> Result<(), InvalidPasswordError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(InvalidPasswordError);
    }
    Ok(())
}

impl TryFrom<Vec<u8>> for SecretHash {
    type Error = InvalidSecretHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let hash: [u8; SECRET_HASH_LEN] = value.try_into().map_err(|_| InvalidSecretHashError)?;
        Ok(Self(Box::new(hash)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::{
                AuthToken, AuthTokenDecodeError, Authentication, Credentials, check_new_password,
            },
            user::Email,
        },
        util::PositiveDuration,
    };
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn token_string_round_trip() {
        let token = AuthToken::generate_random(Id::from(42_u64));
        let parsed: AuthToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
        assert_eq!(parsed.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            "42:abc".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "x:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "42:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn password_verification() {
        let credentials =
            Credentials::new(Id::from(7_u64), Email::new("ada@example.com").unwrap(), "hunter2")
                .unwrap();

        assert!(credentials.verify("hunter2").unwrap());
        assert!(!credentials.verify("hunter3").unwrap());
    }

    #[test]
    fn authentication_expiry() {
        let token = AuthToken::generate_random(Id::from(7_u64));
        let created_at = utc_datetime!(2025-06-01 12:00);
        let mut authentication = Authentication {
            user: token.user_id,
            token_hash: token.hash().unwrap(),
            created_at,
            expires_after: None,
        };
        assert!(!authentication.is_expired_at(created_at + Duration::days(3650)));

        authentication.expires_after = PositiveDuration::new(Duration::hours(1));
        assert!(!authentication.is_expired_at(created_at + Duration::minutes(59)));
        assert!(authentication.is_expired_at(created_at + Duration::minutes(61)));
    }

    #[test]
    fn huge_lifetimes_never_expire() {
        let token = AuthToken::generate_random(Id::from(7_u64));
        let created_at = utc_datetime!(2025-06-01 12:00);
        let authentication = Authentication {
            user: token.user_id,
            token_hash: token.hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::new(Duration::seconds(1_000_000_000_000)),
        };

        assert!(!authentication.is_expired_at(created_at + Duration::days(3650)));
    }

    #[test]
    fn new_passwords_need_a_minimum_length() {
        assert!(check_new_password("").is_err());
        assert!(check_new_password("12345").is_err());
        assert!(check_new_password("123456").is_ok());
    }
}
