use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const CONTENT_MAX_LEN: usize = 3000;

/// Body text of a post or comment. Always trimmed and never empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Content(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidContentError {
    #[error("Content must not be empty")]
    Empty,
    #[error("Content is {0} characters long, the limit is {CONTENT_MAX_LEN}")]
    TooLong(usize),
}

impl Content {
    pub fn new(content: &str) -> Result<Self, InvalidContentError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(InvalidContentError::Empty);
        }

        let len = trimmed.chars().count();
        if len > CONTENT_MAX_LEN {
            return Err(InvalidContentError::TooLong(len));
        }

        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring match.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        self.0.to_lowercase().contains(&term.to_lowercase())
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Content::new(&inner).map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"Content"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::content::{CONTENT_MAX_LEN, Content, InvalidContentError};

    #[test]
    fn trims_and_rejects_blank_content() {
        assert_eq!(Content::new("  hello \n").unwrap().get(), "hello");
        assert_eq!(Content::new(""), Err(InvalidContentError::Empty));
        assert_eq!(Content::new(" \t\n "), Err(InvalidContentError::Empty));
    }

    #[test]
    fn rejects_overlong_content() {
        let limit = "é".repeat(CONTENT_MAX_LEN);
        assert!(Content::new(&limit).is_ok());
        assert_eq!(
            Content::new(&format!("{limit}x")),
            Err(InvalidContentError::TooLong(CONTENT_MAX_LEN + 1))
        );
    }

    #[test]
    fn matches_case_insensitively() {
        let content = Content::new("Hiring Rust engineers in Berlin").unwrap();
        assert!(content.matches("rust"));
        assert!(content.matches("IN BERLIN"));
        assert!(!content.matches("xyz"));
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Content>("\"   \"").is_err());
        assert_eq!(
            serde_json::from_str::<Content>("\" hi \"").unwrap().get(),
            "hi"
        );
    }
}
