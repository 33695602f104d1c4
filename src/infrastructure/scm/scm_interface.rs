use crate::common::result::GitResult;
use crate::domain::entities::branch_map::BranchRevisionMap;
use crate::domain::entities::repository_config::RepositoryConfig;
use crate::domain::entities::revision::Revision;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::path::Path;

/// What a backend can really do, as opposed to what it degrades to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// A `--depth 1` clone is honored
    pub shallow_clone: bool,
    /// A clone can leave the worktree unpopulated
    pub no_checkout: bool,
    /// The poller must hard reset to the branch tip after every fetch
    pub should_reset_after_fetch: bool,
}

/// Contract shared by the command-line and the libgit2 backends.
///
/// Every method is synchronous, operates on the working directory the
/// backend was built with and reopens the repository on each call. Engine
/// failures are rewrapped into the [`GitError`](crate::common::error::GitError)
/// variant of the operation. "Not found" is reported as `Ok(None)` or an
/// empty collection, never as an error.
///
/// Empty `sub_paths` and empty `ref_spec` mean "no filter" and "default
/// refspec".
pub trait GitOperations: Send + Sync {
    /// Identifying string of the underlying engine
    fn version(&self) -> GitResult<String>;

    fn capabilities(&self) -> BackendCapabilities;

    fn config(&self) -> &RepositoryConfig;

    fn working_dir(&self) -> &Path;

    /// Verify the remote is reachable and accepts the credentials
    fn check_connection(&self) -> GitResult<()>;

    fn clone_repository(&self) -> GitResult<()>;

    /// Update refs from `origin`, pruning refs deleted upstream
    fn fetch(&self, ref_spec: &str) -> GitResult<()>;

    fn pull(&self) -> GitResult<()>;

    fn push(&self) -> GitResult<()>;

    /// Force the local effective branch to the remote tip and check it out
    fn checkout_remote_branch_to_local(&self) -> GitResult<()>;

    fn reset_hard(&self, revision: &str) -> GitResult<()>;

    /// Move HEAD to `revision` without touching index or worktree
    fn reset_soft(&self, revision: &str) -> GitResult<()>;

    /// Remove untracked files in the worktree and every submodule
    fn clean_all_unversioned_files(&self) -> GitResult<()>;

    fn gc(&self) -> GitResult<()>;

    /// `remote.origin.url` of the working copy
    fn working_repository_url(&self) -> GitResult<Option<String>>;

    fn current_branch(&self) -> GitResult<String>;

    fn commit_count(&self) -> GitResult<usize>;

    fn current_revision(&self) -> GitResult<Option<String>> {
        Ok(self
            .latest_revision(&[])?
            .map(|revision| revision.revision().to_string()))
    }

    /// Every commit reachable from HEAD, newest first
    fn all_revisions(&self) -> GitResult<Vec<Revision>>;

    fn latest_revision(&self, sub_paths: &[String]) -> GitResult<Option<Revision>>;

    /// Commits newer than `previous_revision`, newest first.
    ///
    /// When `previous_revision` is not part of the traversed history the
    /// whole history is returned.
    fn revisions_since(&self, previous_revision: &str, sub_paths: &[String]) -> GitResult<Vec<Revision>>;

    /// Look up one commit across all refs
    fn details_for_revision(&self, revision: &str) -> GitResult<Option<Revision>>;

    fn branch_to_revision_map(&self, pattern: &str) -> GitResult<BranchRevisionMap>;

    fn submodule_init(&self) -> GitResult<()>;

    fn submodule_sync(&self) -> GitResult<()>;

    fn submodule_update(&self) -> GitResult<()>;

    /// Register the repository at `folder` as a submodule at `relative_path`
    /// named `name`
    fn submodule_add(&self, folder: &str, name: &str, relative_path: &str) -> GitResult<()>;

    /// Remove a submodule; succeeds when it is already gone
    fn submodule_remove(&self, folder_name: &str) -> GitResult<()>;

    fn remove_submodule_sections_from_git_config(&self) -> GitResult<()>;

    fn submodule_folders(&self) -> GitResult<Vec<String>>;

    /// Submodule name to URL, or `None` when the backend cannot tell
    fn submodule_urls(&self) -> GitResult<Option<BTreeMap<String, String>>>;

    fn change_submodule_url(&self, submodule_name: &str, new_url: &str) -> GitResult<()>;

    /// Write the status of every submodule to the stdout sink
    fn print_submodule_status(&self) -> GitResult<()>;

    fn checkout_all_modified_files_in_submodules(&self) -> GitResult<()>;

    fn submodule_commit_count(&self, submodule_folder: &str) -> GitResult<usize>;

    fn init(&self) -> GitResult<()>;

    fn add(&self, path: &Path) -> GitResult<()>;

    fn commit(&self, message: &str) -> GitResult<()>;

    fn commit_on_date(&self, message: &str, date: DateTime<Utc>) -> GitResult<()>;
}

/// Author used for commits made through [`GitOperations::commit`]
pub const COMMIT_AUTHOR: &str = "author";

/// Email of [`COMMIT_AUTHOR`]
pub const COMMIT_EMAIL: &str = "author@nodomain.com";

/// Trim sub-paths and drop empty ones
pub fn normalize_paths(sub_paths: &[String]) -> Vec<String> {
    sub_paths
        .iter()
        .map(|path| path.trim())
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cut a newest-first history at `previous_revision` (exclusive).
///
/// The whole history is kept when `previous_revision` never shows up.
pub fn truncate_at(revisions: Vec<Revision>, previous_revision: &str) -> Vec<Revision> {
    let previous_revision = previous_revision.trim();
    match revisions.iter().position(|r| r.revision() == previous_revision) {
        Some(index) => revisions.into_iter().take(index).collect(),
        None => revisions,
    }
}

/// Whether `file` is one of `paths` or lies below one of them
pub fn matches_any_path(file: &str, paths: &[String]) -> bool {
    paths.iter().any(|path| {
        let path = path.trim_end_matches('/');
        file == path || file.strip_prefix(path).map_or(false, |rest| rest.starts_with('/'))
    })
}

/// Graph position of one commit, the input of [`date_order`]
#[derive(Debug, Clone, Copy)]
pub struct CommitNode<'a> {
    pub id: &'a str,
    pub parents: &'a [String],
    pub commit_time: i64,
}

/// Newest-first order of `nodes` as `git log --date-order` emits it.
///
/// A commit is only emitted once all of its children are. Among the ready
/// commits the latest committer time goes first and equal times keep the
/// order in which the commits became ready, first parents before later
/// ones. Childless nodes are ready from the start, in input order.
/// Returns indices into `nodes`.
pub fn date_order(nodes: &[CommitNode<'_>]) -> Vec<usize> {
    let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, node)| (node.id, i)).collect();

    let mut pending_children = vec![0usize; nodes.len()];
    for node in nodes {
        for parent in node.parents {
            if let Some(&p) = index.get(parent.as_str()) {
                pending_children[p] += 1;
            }
        }
    }

    let mut sequence = 0u64;
    let mut ready = BinaryHeap::new();
    for (i, node) in nodes.iter().enumerate() {
        if pending_children[i] == 0 {
            ready.push((node.commit_time, Reverse(sequence), i));
            sequence += 1;
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    while let Some((_, _, i)) = ready.pop() {
        order.push(i);
        for parent in nodes[i].parents {
            if let Some(&p) = index.get(parent.as_str()) {
                pending_children[p] -= 1;
                if pending_children[p] == 0 {
                    ready.push((nodes[p].commit_time, Reverse(sequence), p));
                    sequence += 1;
                }
            }
        }
    }
    order
}
