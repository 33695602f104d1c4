use crate::common::output::OutputSinks;
use crate::infrastructure::git::remote::RemoteAuth;
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Buf, ErrorCode, IndexAddOption, ObjectType, Repository as Git2Repository, RepositoryInitOptions,
    ResetType, Signature, Status, StatusOptions,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Git repository operations related errors
#[derive(Debug, Error)]
pub enum GitRepositoryError {
    #[error("Repository not found at path: {0}")]
    RepositoryNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Sub-module {name} could not be opened: {source}")]
    SubmoduleNotOpen {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("Sub-module {name} could not be cleaned: {source}")]
    SubmoduleCleanFailed {
        name: String,
        #[source]
        source: Box<GitRepositoryError>,
    },

    #[error("Git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// How far `reset` moves the working copy along with HEAD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Soft,
    Hard,
}

/// Wrapper around git2::Repository scoped to one operation.
///
/// Every repository operation opens its own handle and drops it on return,
/// so nothing stays locked between polls.
pub struct GitRepository {
    repo: Git2Repository,
    path: PathBuf,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.path)
            .field("repo", &"<git2::Repository>")
            .finish()
    }
}

impl GitRepository {
    /// Open an existing working copy
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitRepositoryError> {
        let path_buf = path.as_ref().to_path_buf();

        if !path_buf.exists() {
            return Err(GitRepositoryError::RepositoryNotFound(path_buf.display().to_string()));
        }

        let repo = Git2Repository::open(&path_buf)?;
        Ok(Self { repo, path: path_buf })
    }

    /// Create an empty repository whose unborn HEAD points at `branch`
    pub fn init<P: AsRef<Path>>(path: P, branch: &str) -> Result<Self, GitRepositoryError> {
        let path_buf = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path_buf)?;

        let mut options = RepositoryInitOptions::new();
        options.initial_head(branch);
        let repo = Git2Repository::init_opts(&path_buf, &options)?;

        Ok(Self { repo, path: path_buf })
    }

    /// Clone `url` into `target`, checking out `branch`
    pub fn clone(
        url: &str,
        target: &Path,
        branch: &str,
        auth: &RemoteAuth,
        sinks: &OutputSinks,
    ) -> Result<Self, GitRepositoryError> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut builder = RepoBuilder::new();
        builder.branch(branch);
        builder.fetch_options(auth.fetch_options(sinks));

        let repo = builder.clone(url, target)?;
        Ok(Self {
            repo,
            path: target.to_path_buf(),
        })
    }

    pub fn repo(&self) -> &Git2Repository {
        &self.repo
    }

    /// Working directory, falling back to the opened path for bare repositories
    pub fn workdir(&self) -> &Path {
        self.repo.workdir().unwrap_or(&self.path)
    }

    /// Point `refs/heads/<branch>` at the fetched `origin/<branch>` (or the
    /// existing local branch when nothing was fetched for it), make it HEAD and
    /// force the working copy onto it.
    pub fn checkout_remote_branch(&self, branch: &str) -> Result<(), GitRepositoryError> {
        let remote_ref = format!("refs/remotes/origin/{}", branch);
        let local_ref = format!("refs/heads/{}", branch);

        let target = self
            .repo
            .find_reference(&remote_ref)
            .or_else(|_| self.repo.find_reference(&local_ref))
            .map_err(|_| GitRepositoryError::BranchNotFound(branch.to_string()))?
            .peel_to_commit()?;

        self.repo
            .reference(&local_ref, target.id(), true, &format!("checkout: moving to {}", branch))?;
        self.repo.set_head(&local_ref)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.reset(target.as_object(), ResetType::Hard, Some(&mut checkout))?;
        Ok(())
    }

    /// Move HEAD to whatever `revision` resolves to
    pub fn reset(&self, revision: &str, mode: ResetMode) -> Result<(), GitRepositoryError> {
        let target = self.repo.revparse_single(revision)?.peel(ObjectType::Commit)?;

        match mode {
            ResetMode::Soft => self.repo.reset(&target, ResetType::Soft, None)?,
            ResetMode::Hard => {
                let mut checkout = CheckoutBuilder::new();
                checkout.force();
                self.repo.reset(&target, ResetType::Hard, Some(&mut checkout))?
            }
        }
        Ok(())
    }

    /// Delete untracked files and directories of this working copy only.
    ///
    /// Ignored files stay. Returns the removed paths, relative to the
    /// working directory.
    pub fn remove_untracked(&self) -> Result<Vec<String>, GitRepositoryError> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(false)
            .include_ignored(false)
            .exclude_submodules(true);

        let untracked: Vec<String> = self
            .repo
            .statuses(Some(&mut options))?
            .iter()
            .filter(|entry| entry.status().contains(Status::WT_NEW))
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect();

        let workdir = self.workdir().to_path_buf();
        for relative in &untracked {
            let path = workdir.join(relative.trim_end_matches('/'));
            if relative.ends_with('/') || path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(untracked)
    }

    /// Pack every object reachable from a reference into a single pack.
    ///
    /// Returns false when there is nothing to pack.
    pub fn pack_reachable_objects(&self) -> Result<bool, GitRepositoryError> {
        let mut walk = self.repo.revwalk()?;
        let mut pushed = false;
        for reference in self.repo.references()? {
            let reference = reference?;
            if let Ok(commit) = reference.peel_to_commit() {
                walk.push(commit.id())?;
                pushed = true;
            }
        }
        if !pushed {
            return Ok(false);
        }

        let mut builder = self.repo.packbuilder()?;
        builder.insert_walk(&mut walk)?;
        let mut pack = Buf::new();
        builder.write_buf(&mut pack)?;

        let odb = self.repo.odb()?;
        let mut writer = odb.packwriter()?;
        writer.write_all(&pack)?;
        writer.commit()?;
        Ok(true)
    }

    /// Short name of the branch HEAD points at, `"HEAD"` when detached
    pub fn current_branch(&self) -> Result<String, GitRepositoryError> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
            Ok(_) => Ok("HEAD".to_string()),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                let head = self.repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .map(|target| target.trim_start_matches("refs/heads/").to_string())
                    .unwrap_or_else(|| "HEAD".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage `path` (file or directory), including deletions below it
    pub fn stage(&self, path: &Path) -> Result<(), GitRepositoryError> {
        let workdir = self.workdir();
        let relative = path.strip_prefix(workdir).unwrap_or(path);
        let pathspec = if relative.as_os_str().is_empty() {
            Path::new(".")
        } else {
            relative
        };

        let mut index = self.repo.index()?;
        index.add_all([pathspec], IndexAddOption::DEFAULT, None)?;
        index.update_all([pathspec], None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the index on top of HEAD as `name <email>`
    pub fn commit_index(&self, name: &str, email: &str, message: &str) -> Result<String, GitRepositoryError> {
        let signature = Signature::now(name, email)?;
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    /// `(reference name, commit sha)` for every reference resolving to an object
    pub fn reference_targets(&self) -> Result<Vec<(String, String)>, GitRepositoryError> {
        let mut targets = Vec::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            let name = match reference.name() {
                Some(name) => name.to_string(),
                None => continue,
            };
            let resolved = match reference.resolve() {
                Ok(resolved) => resolved,
                Err(_) => continue,
            };
            if let Some(target) = resolved.target() {
                targets.push((name, target.to_string()));
            }
        }
        Ok(targets)
    }
}

impl From<Git2Repository> for GitRepository {
    fn from(repo: Git2Repository) -> Self {
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        Self { repo, path }
    }
}

/// True when `path` does not exist or is an empty directory
pub fn is_pristine(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !path.exists(),
    }
}
