//! Translation of `git` porcelain output into the revision model.
//!
//! Every piece of text the command-line backend reads back from `git` is
//! parsed here, so the parsing can be tested against captured output without
//! spawning a process.

use crate::domain::entities::revision::{FileAction, ModifiedFile, Revision};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

const RECORD_SEPARATOR: char = '\u{1e}';
const FIELD_SEPARATOR: char = '\u{1f}';

/// `--format` for `git log -z --name-status`: one record per commit, header
/// fields separated by 0x1f, the name-status list following the last field
pub const LOG_FORMAT: &str = "--format=%x1e%H%x1f%P%x1f%at%x1f%ct%x1f%an%x1f%ae%x1f%B%x1f";

/// `--format` for `git for-each-ref`
pub const REF_FORMAT: &str = "--format=%(objectname) %(refname)";

#[derive(Debug, Error, PartialEq)]
pub enum LogParseError {
    #[error("malformed log record: {0}")]
    MalformedRecord(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// One commit read from `git log`
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub hash: String,
    pub parents: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Committer time in seconds, the key of `--date-order`
    pub commit_time: i64,
    pub author: String,
    pub email: String,
    pub message: String,
    pub changes: Vec<ModifiedFile>,
}

impl LogEntry {
    /// A commit without parents (also the boundary of a shallow clone)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Replace the recursive root diff with the top-level tree entries
    pub fn with_root_entries(mut self, entries: Vec<String>) -> Self {
        self.changes = entries
            .into_iter()
            .map(|path| ModifiedFile::new(path, FileAction::Added))
            .collect();
        self
    }

    pub fn into_revision(self) -> Revision {
        let merge_commit = self.parents.len() > 1;
        Revision::new(
            self.hash,
            self.timestamp,
            self.message,
            self.author,
            self.email,
            self.changes,
        )
        .with_merge_commit(merge_commit)
    }
}

/// Parse `git log -z --name-status` output produced with [`LOG_FORMAT`]
pub fn parse_log(output: &str) -> Result<Vec<LogEntry>, LogParseError> {
    output
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim_matches(|c| c == '\0' || c == '\n').is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Result<LogEntry, LogParseError> {
    let fields: Vec<&str> = record.splitn(8, FIELD_SEPARATOR).collect();
    if fields.len() != 8 {
        return Err(LogParseError::MalformedRecord(record.chars().take(80).collect()));
    }

    let hash = fields[0].trim();
    if hash.is_empty() {
        return Err(LogParseError::MalformedRecord("missing commit hash".to_string()));
    }

    let seconds: i64 = fields[2]
        .trim()
        .parse()
        .map_err(|_| LogParseError::InvalidTimestamp(fields[2].to_string()))?;
    let timestamp = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| LogParseError::InvalidTimestamp(fields[2].to_string()))?;
    let commit_time: i64 = fields[3]
        .trim()
        .parse()
        .map_err(|_| LogParseError::InvalidTimestamp(fields[3].to_string()))?;

    Ok(LogEntry {
        hash: hash.to_string(),
        parents: fields[1].split_whitespace().map(str::to_string).collect(),
        timestamp,
        commit_time,
        author: fields[4].to_string(),
        email: fields[5].to_string(),
        message: fields[6].to_string(),
        changes: parse_name_status(fields[7])?,
    })
}

/// NUL separated `--name-status` tokens: a status, then one path (two for
/// renames and copies, of which the new path is kept)
fn parse_name_status(section: &str) -> Result<Vec<ModifiedFile>, LogParseError> {
    let mut tokens = section
        .split('\0')
        .map(|token| token.trim_start_matches('\n'))
        .filter(|token| !token.is_empty());

    let mut changes = Vec::new();
    while let Some(status) = tokens.next() {
        let path = if status.starts_with('R') || status.starts_with('C') {
            tokens.next();
            tokens.next()
        } else {
            tokens.next()
        };
        let path = path.ok_or_else(|| LogParseError::MalformedRecord(format!("no path after status '{}'", status)))?;
        changes.push(ModifiedFile::new(path, FileAction::from_change_letter(status)));
    }
    Ok(changes)
}

/// Parse `git ls-tree -z --name-only` output
pub fn parse_name_list(output: &str) -> Vec<String> {
    output
        .split('\0')
        .map(|name| name.trim_start_matches('\n'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `git for-each-ref` output produced with [`REF_FORMAT`] into
/// `(ref name, object id)` pairs
pub fn parse_refs(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| line.trim().split_once(' '))
        .map(|(object, name)| (name.to_string(), object.to_string()))
        .collect()
}

/// One line of `git submodule status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleStatus {
    /// ` ` in sync, `-` not initialized, `+` different commit checked out,
    /// `U` merge conflicts
    pub state: char,
    pub revision: String,
    pub path: String,
}

/// Parse `git submodule status` output
pub fn parse_submodule_status(output: &str) -> Vec<SubmoduleStatus> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut chars = line.chars();
            let state = chars.next()?;
            let mut parts = chars.as_str().split_whitespace();
            let revision = parts.next()?.to_string();
            let path = parts.next()?.to_string();
            Some(SubmoduleStatus { state, revision, path })
        })
        .collect()
}

/// Parse `git config --get-regexp ^submodule\..*\.url$` output into
/// submodule name to URL
pub fn parse_submodule_urls(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.trim().split_once(' '))
        .filter_map(|(key, url)| {
            let name = key.strip_prefix("submodule.")?.strip_suffix(".url")?;
            Some((name.to_string(), url.trim().to_string()))
        })
        .collect()
}

/// First line of `git --version`
pub fn parse_version(output: &str) -> String {
    output.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Captured from `git log -z <LOG_FORMAT> --name-status -M --diff-merges=first-parent`,
    // committer times edited
    const THREE_COMMITS: &str = concat!(
        "\u{1e}6a619b4680e13e0642bd180217ab8289cb0f0587\u{1f}35a8adbb657a907c8feccafd5d4ce0ac29a8936e",
        "\u{1f}1792096828\u{1f}1792096830\u{1f}a\u{1f}a@b\u{1f}third\n\u{1f}\0\nD\0a.txt\0",
        "\u{1e}35a8adbb657a907c8feccafd5d4ce0ac29a8936e\u{1f}d0965c831cfe8e9c59a0e3f6609ed643b024d2ab",
        "\u{1f}1792096828\u{1f}1792096830\u{1f}a\u{1f}a@b\u{1f}second\nmulti\n\u{1f}\0\nM\0a.txt\0R100\0b.txt\0c.txt\0",
        "\u{1e}d0965c831cfe8e9c59a0e3f6609ed643b024d2ab\u{1f}",
        "\u{1f}1792096828\u{1f}1792096830\u{1f}a\u{1f}a@b\u{1f}first\n\u{1f}\0\nA\0a.txt\0A\0b.txt\0",
    );

    const MERGE_AND_EMPTY: &str = concat!(
        "\u{1e}f21f74f6e9de89d78d57d0f90db2806bf628408e\u{1f}0fc28e9e52c795ce1430bdf97e82f5325df1c38e",
        "\u{1f}1792096835\u{1f}1792096835\u{1f}a\u{1f}a@b\u{1f}empty\n\u{1f}\0",
        "\u{1e}0fc28e9e52c795ce1430bdf97e82f5325df1c38e\u{1f}6a619b4680e13e0642bd180217ab8289cb0f0587 ",
        "0caea038c61b084a6dec9bc4103453ec164c7f11\u{1f}1792096835\u{1f}1792096835\u{1f}a\u{1f}a@b",
        "\u{1f}Merge branch 'side'\n\u{1f}\0\nA\0s.txt\0",
    );

    #[test]
    fn test_parse_log_commits() {
        let entries = parse_log(THREE_COMMITS).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].hash, "6a619b4680e13e0642bd180217ab8289cb0f0587");
        assert_eq!(entries[0].changes, vec![ModifiedFile::new("a.txt", FileAction::Deleted)]);
        assert_eq!(entries[0].timestamp.timestamp(), 1792096828);
        assert_eq!(entries[0].commit_time, 1792096830);
        assert_eq!(entries[0].author, "a");
        assert_eq!(entries[0].email, "a@b");
    }

    #[test]
    fn test_parse_log_rename_keeps_new_path() {
        let entries = parse_log(THREE_COMMITS).unwrap();

        assert_eq!(
            entries[1].changes,
            vec![
                ModifiedFile::new("a.txt", FileAction::Modified),
                ModifiedFile::new("c.txt", FileAction::Added),
            ]
        );
        assert_eq!(entries[1].clone().into_revision().comment(), "second\nmulti");
    }

    #[test]
    fn test_parse_log_root_commit() {
        let entries = parse_log(THREE_COMMITS).unwrap();
        let root = entries[2].clone();

        assert!(root.is_root());
        let revision = root
            .with_root_entries(vec!["a.txt".to_string(), "b.txt".to_string()])
            .into_revision();
        assert_eq!(
            revision.modified_files(),
            &[
                ModifiedFile::new("a.txt", FileAction::Added),
                ModifiedFile::new("b.txt", FileAction::Added),
            ]
        );
        assert!(!revision.is_merge_commit());
    }

    #[test]
    fn test_parse_log_merge_and_empty_commit() {
        let entries = parse_log(MERGE_AND_EMPTY).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].changes.is_empty());
        assert!(!entries[0].clone().into_revision().is_merge_commit());

        let merge = entries[1].clone().into_revision();
        assert!(merge.is_merge_commit());
        assert_eq!(merge.modified_files(), &[ModifiedFile::new("s.txt", FileAction::Added)]);
    }

    #[test]
    fn test_parse_log_empty_output() {
        assert!(parse_log("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_log_rejects_garbage() {
        assert!(matches!(
            parse_log("\u{1e}abc\u{1f}def"),
            Err(LogParseError::MalformedRecord(_))
        ));
        assert!(matches!(
            parse_log("\u{1e}abc\u{1f}\u{1f}soon\u{1f}1\u{1f}a\u{1f}b\u{1f}m\u{1f}\0"),
            Err(LogParseError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_name_list() {
        assert_eq!(parse_name_list("a.txt\0b.txt\0dir\0"), vec!["a.txt", "b.txt", "dir"]);
        assert!(parse_name_list("").is_empty());
    }

    #[test]
    fn test_parse_refs() {
        let output = "f21f74f6e9de89d78d57d0f90db2806bf628408e refs/heads/master\n\
                      0caea038c61b084a6dec9bc4103453ec164c7f11 refs/remotes/origin/side\n";
        assert_eq!(
            parse_refs(output),
            vec![
                (
                    "refs/heads/master".to_string(),
                    "f21f74f6e9de89d78d57d0f90db2806bf628408e".to_string()
                ),
                (
                    "refs/remotes/origin/side".to_string(),
                    "0caea038c61b084a6dec9bc4103453ec164c7f11".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_parse_submodule_status() {
        let output = " 0caea038c61b084a6dec9bc4103453ec164c7f11 sub1 (heads/master)\n\
                      -f21f74f6e9de89d78d57d0f90db2806bf628408e sub2\n";
        let statuses = parse_submodule_status(output);

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].state, ' ');
        assert_eq!(statuses[0].path, "sub1");
        assert_eq!(statuses[1].state, '-');
        assert_eq!(statuses[1].revision, "f21f74f6e9de89d78d57d0f90db2806bf628408e");
        assert_eq!(statuses[1].path, "sub2");
    }

    #[test]
    fn test_parse_submodule_urls() {
        let output = "submodule.sub1.url file:///tmp/sub1\nsubmodule.lib/x.url https://host/x.git\n";
        let urls = parse_submodule_urls(output);

        assert_eq!(urls.get("sub1").map(String::as_str), Some("file:///tmp/sub1"));
        assert_eq!(urls.get("lib/x").map(String::as_str), Some("https://host/x.git"));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("git version 2.39.5\n"), "git version 2.39.5");
    }
}
