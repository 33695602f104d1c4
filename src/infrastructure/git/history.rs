use crate::domain::entities::revision::{FileAction, ModifiedFile, Revision};
use crate::infrastructure::scm::scm_interface::{date_order, CommitNode};
use chrono::{TimeZone, Utc};
use git2::{Commit, Delta, DiffFindOptions, DiffOptions, ErrorCode, Repository as Git2Repository, Tree};

/// Change letter of a libgit2 delta, as `git diff --name-status` prints it
pub fn change_letter(delta: Delta) -> &'static str {
    match delta {
        Delta::Added => "A",
        Delta::Deleted => "D",
        Delta::Modified => "M",
        Delta::Renamed => "R",
        Delta::Copied => "C",
        Delta::Typechange => "T",
        Delta::Conflicted => "U",
        _ => "X",
    }
}

/// Reads commits of one repository as [`Revision`]s
pub struct HistoryReader<'repo> {
    repo: &'repo Git2Repository,
}

impl<'repo> HistoryReader<'repo> {
    pub fn new(repo: &'repo Git2Repository) -> Self {
        Self { repo }
    }

    /// HEAD commit, `None` on an unborn branch
    pub fn head_commit(&self) -> Result<Option<Commit<'repo>>, git2::Error> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of commits reachable from HEAD
    pub fn count(&self) -> Result<usize, git2::Error> {
        let head = match self.head_commit()? {
            Some(head) => head,
            None => return Ok(0),
        };
        let mut walk = self.repo.revwalk()?;
        walk.push(head.id())?;
        let mut count = 0;
        for oid in walk {
            oid?;
            count += 1;
        }
        Ok(count)
    }

    /// Commits reachable from HEAD, newest first in the order of
    /// [`date_order`]: no parent before its children, otherwise commit time.
    ///
    /// With `paths`, only commits whose first-parent diff touches one of them
    /// are kept. Stops after `limit` matches.
    pub fn walk_head(&self, paths: &[String], limit: Option<usize>) -> Result<Vec<Revision>, git2::Error> {
        let head = match self.head_commit()? {
            Some(head) => head,
            None => return Ok(Vec::new()),
        };

        let mut walk = self.repo.revwalk()?;
        walk.push(head.id())?;
        let commits = walk
            .map(|oid| self.repo.find_commit(oid?))
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<String> = commits.iter().map(|commit| commit.id().to_string()).collect();
        let parents: Vec<Vec<String>> = commits
            .iter()
            .map(|commit| commit.parent_ids().map(|id| id.to_string()).collect())
            .collect();
        let nodes: Vec<CommitNode<'_>> = commits
            .iter()
            .enumerate()
            .map(|(i, commit)| CommitNode {
                id: &ids[i],
                parents: &parents[i],
                commit_time: commit.time().seconds(),
            })
            .collect();

        let mut revisions = Vec::new();
        for i in date_order(&nodes) {
            if limit.map_or(false, |limit| revisions.len() >= limit) {
                break;
            }
            let commit = &commits[i];
            if !paths.is_empty() && !self.touches(commit, paths)? {
                continue;
            }
            revisions.push(self.to_revision(commit)?);
        }
        Ok(revisions)
    }

    /// Resolve any revspec to a commit, `None` when it does not resolve
    pub fn find(&self, revision: &str) -> Result<Option<Revision>, git2::Error> {
        let object = match self.repo.revparse_single(revision.trim()) {
            Ok(object) => object,
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec) => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        match object.peel_to_commit() {
            Ok(commit) => Ok(Some(self.to_revision(&commit)?)),
            Err(_) => Ok(None),
        }
    }

    pub fn to_revision(&self, commit: &Commit<'_>) -> Result<Revision, git2::Error> {
        let author = commit.author();
        let timestamp = Utc
            .timestamp_opt(author.when().seconds(), 0)
            .single()
            .ok_or_else(|| git2::Error::from_str("commit time out of range"))?;

        Ok(Revision::new(
            commit.id().to_string(),
            timestamp,
            String::from_utf8_lossy(commit.message_bytes()),
            String::from_utf8_lossy(author.name_bytes()).into_owned(),
            String::from_utf8_lossy(author.email_bytes()).into_owned(),
            self.modified_files(commit)?,
        )
        .with_merge_commit(commit.parent_count() > 1))
    }

    /// Root commits list their top-level entries as added; every other
    /// commit is diffed against its first parent with rename detection.
    fn modified_files(&self, commit: &Commit<'_>) -> Result<Vec<ModifiedFile>, git2::Error> {
        let tree = commit.tree()?;
        if commit.parent_count() == 0 {
            return Ok(top_level_entries(&tree));
        }

        let parent_tree = commit.parent(0)?.tree()?;
        let mut diff = self.repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        Ok(diff
            .deltas()
            .filter_map(|delta| {
                let file = match delta.status() {
                    Delta::Deleted => delta.old_file(),
                    _ => delta.new_file(),
                };
                let path = file.path()?.to_string_lossy().into_owned();
                Some(ModifiedFile::new(path, FileAction::from_change_letter(change_letter(delta.status()))))
            })
            .collect())
    }

    fn touches(&self, commit: &Commit<'_>, paths: &[String]) -> Result<bool, git2::Error> {
        let mut options = DiffOptions::new();
        for path in paths {
            options.pathspec(path);
        }

        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() == 0 {
            None
        } else {
            Some(commit.parent(0)?.tree()?)
        };
        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut options))?;
        Ok(diff.deltas().len() > 0)
    }
}

fn top_level_entries(tree: &Tree<'_>) -> Vec<ModifiedFile> {
    tree.iter()
        .filter_map(|entry| entry.name().map(str::to_string))
        .map(|name| ModifiedFile::new(name, FileAction::Added))
        .collect()
}
