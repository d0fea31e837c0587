// 👤 Subject - who a counter describes
//
// A subject is either a single user or a whole role. Users own a storage slot;
// roles never do, their value is always derived from current membership.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::directory::SubjectProvider;

// ============================================================================
// SUBJECT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// Individual, identified by a numeric user id
    User,

    /// Group, identified by its name
    Role,

    /// Anonymous guest. Declared for visibility rules only
    Visitor,
}

impl SubjectKind {
    /// Stable UID, also the `subject_kind` part of every option key
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::Role => "role",
            SubjectKind::Visitor => "visitor",
        }
    }

    pub fn parse(value: &str) -> Option<SubjectKind> {
        match value.to_lowercase().as_str() {
            "user" => Some(SubjectKind::User),
            "role" => Some(SubjectKind::Role),
            "visitor" => Some(SubjectKind::Visitor),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SUBJECT
// ============================================================================

/// Subject a control object is bound to.
///
/// Immutable for the length of one resolution. Role membership is not part of
/// the value: it is asked from a [`SubjectProvider`] every time it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Subject {
    User { id: u64 },
    Role { name: String },
}

impl Subject {
    pub fn user(id: u64) -> Self {
        Subject::User { id }
    }

    pub fn role(name: impl Into<String>) -> Self {
        Subject::Role { name: name.into() }
    }

    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::User { .. } => SubjectKind::User,
            Subject::Role { .. } => SubjectKind::Role,
        }
    }

    /// Identifier as it appears in option keys
    pub fn id(&self) -> String {
        match self {
            Subject::User { id } => id.to_string(),
            Subject::Role { name } => name.clone(),
        }
    }

    pub fn user_id(&self) -> Option<u64> {
        match self {
            Subject::User { id } => Some(*id),
            Subject::Role { .. } => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Subject::User { .. })
    }

    /// Current members of a role as user subjects. Empty for a user.
    ///
    /// The whole listing is fetched from the provider up front on each call;
    /// nothing is cached, so membership changes show up on the next call.
    pub fn members(&self, provider: &dyn SubjectProvider) -> Result<impl Iterator<Item = Subject>> {
        let ids = match self {
            Subject::User { .. } => Vec::new(),
            Subject::Role { name } => provider.role_members(name)?,
        };

        Ok(ids.into_iter().map(Subject::user))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

// ============================================================================
// TESTS
// ============================================================================
