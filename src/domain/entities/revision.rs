use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a file in a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Added,
    Modified,
    Deleted,
    Unknown,
}

impl FileAction {
    /// Map a git change letter (as printed by `--name-status`) to an action.
    ///
    /// Renames count as additions of the new path. Copies, type changes and
    /// anything else are `Unknown`. A similarity score suffix (`R100`) is
    /// ignored.
    pub fn from_change_letter(status: &str) -> Self {
        match status.chars().next() {
            Some('A') | Some('R') => Self::Added,
            Some('M') => Self::Modified,
            Some('D') => Self::Deleted,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file touched by a revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub path: String,
    pub action: FileAction,
}

impl ModifiedFile {
    pub fn new(path: impl Into<String>, action: FileAction) -> Self {
        Self {
            path: path.into(),
            action,
        }
    }
}

/// A commit, normalized independently of the backend that read it.
///
/// Revisions are built once by a backend and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    revision: String,
    timestamp: DateTime<Utc>,
    comment: String,
    user: String,
    email_id: String,
    modified_files: Vec<ModifiedFile>,
    merge_commit: bool,
}

impl Revision {
    /// Create a revision; the comment is stored trimmed
    pub fn new(
        revision: impl Into<String>,
        timestamp: DateTime<Utc>,
        comment: impl AsRef<str>,
        user: impl Into<String>,
        email_id: impl Into<String>,
        modified_files: Vec<ModifiedFile>,
    ) -> Self {
        Self {
            revision: revision.into(),
            timestamp,
            comment: comment.as_ref().trim().to_string(),
            user: user.into(),
            email_id: email_id.into(),
            modified_files,
            merge_commit: false,
        }
    }

    pub fn with_merge_commit(mut self, merge_commit: bool) -> Self {
        self.merge_commit = merge_commit;
        self
    }

    /// Commit hash
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Author timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn email_id(&self) -> &str {
        &self.email_id
    }

    pub fn modified_files(&self) -> &[ModifiedFile] {
        &self.modified_files
    }

    pub fn is_merge_commit(&self) -> bool {
        self.merge_commit
    }
}
