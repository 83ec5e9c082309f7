use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::errors::InvalidInputError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Opaque chat user identity, compared by exact string equality.
pub struct UserId(String);

impl UserId {
    /// Validates a raw identity without trimming or case folding it.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidInputError> {
        let value = raw.into();
        if value.is_empty() {
            return Err(InvalidInputError::EmptyIdentity);
        }
        if value
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(InvalidInputError::MalformedIdentity { value });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = InvalidInputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for UserId {
    type Error = InvalidInputError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::UserId;
    use crate::errors::InvalidInputError;

    #[test]
    fn unit_parse_accepts_opaque_identifiers_verbatim() {
        let id = UserId::parse("U024BE7LH").expect("valid id");
        assert_eq!(id.as_str(), "U024BE7LH");
        assert_eq!(id.to_string(), "U024BE7LH");
        assert_ne!(
            UserId::parse("u024be7lh").expect("valid id"),
            id,
            "identities must not be case folded"
        );
    }

    #[test]
    fn unit_parse_rejects_empty_and_padded_values() {
        assert_eq!(UserId::parse(""), Err(InvalidInputError::EmptyIdentity));
        assert_eq!(
            UserId::parse(" U1"),
            Err(InvalidInputError::MalformedIdentity {
                value: " U1".to_string()
            })
        );
        assert!(UserId::parse("U1\n").is_err());
        assert!(UserId::parse("U\u{0007}1").is_err());
    }

    #[test]
    fn regression_serde_round_trip_validates_identities() {
        let id: UserId = serde_json::from_str("\"U1\"").expect("decode");
        assert_eq!(id.as_str(), "U1");
        assert_eq!(serde_json::to_string(&id).expect("encode"), "\"U1\"");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
