use std::fmt;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: String) -> Self {
                Self(id)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(PlayerId);

define_id!(SessionId);

/// Display name of the automated opponent in stored records and on the wire.
pub const BOT_IDENTITY: &str = "Bot";

pub const MAX_IDENTITY_LENGTH: usize = 50;

impl PlayerId {
    /// Trims the raw identity and rejects empty, overlong, or reserved names.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("Identity is required".to_string());
        }
        if trimmed.chars().count() > MAX_IDENTITY_LENGTH {
            return Err(format!("Identity must be at most {} characters", MAX_IDENTITY_LENGTH));
        }
        if trimmed == BOT_IDENTITY {
            return Err(format!("Identity '{}' is reserved", BOT_IDENTITY));
        }
        Ok(Self(trimmed.to_string()))
    }
}
