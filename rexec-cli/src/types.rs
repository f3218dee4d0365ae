//! Common types used across CLI modules

use rexec_core::domain::job::JobId;

/// Identifier that can be either a full job id or an unambiguous prefix
#[derive(Debug, Clone, PartialEq)]
pub enum IdOrPrefix {
    /// Full job id
    Full(JobId),
    /// Prefix that should uniquely identify a job
    Prefix(String),
}

impl IdOrPrefix {
    /// Parse a string into an IdOrPrefix
    ///
    /// Attempts to parse as a full id first, otherwise treats as a prefix
    pub fn parse(input: &str) -> Self {
        match input.parse::<JobId>() {
            Ok(id) => IdOrPrefix::Full(id),
            Err(_) => IdOrPrefix::Prefix(input.to_string()),
        }
    }

    /// Get the id if this is a full one
    pub fn as_id(&self) -> Option<JobId> {
        match self {
            IdOrPrefix::Full(id) => Some(*id),
            IdOrPrefix::Prefix(_) => None,
        }
    }

    /// Get the prefix string
    pub fn as_str(&self) -> String {
        match self {
            IdOrPrefix::Full(id) => id.to_string(),
            IdOrPrefix::Prefix(prefix) => prefix.clone(),
        }
    }
}

impl std::fmt::Display for IdOrPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdOrPrefix::Full(id) => write!(f, "{}", id),
            IdOrPrefix::Prefix(prefix) => write!(f, "{}", prefix),
        }
    }
}

impl From<&str> for IdOrPrefix {
    fn from(s: &str) -> Self {
        IdOrPrefix::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_id() {
        let id = JobId::new();
        let parsed = IdOrPrefix::parse(&id.to_string());
        assert_eq!(parsed, IdOrPrefix::Full(id));
        assert_eq!(parsed.as_id(), Some(id));
    }

    #[test]
    fn test_parse_prefix() {
        let parsed = IdOrPrefix::from("3fa8");
        assert_eq!(parsed, IdOrPrefix::Prefix("3fa8".to_string()));
        assert_eq!(parsed.as_id(), None);
        assert_eq!(parsed.as_str(), "3fa8");
        assert_eq!(parsed.to_string(), "3fa8");
    }
}
