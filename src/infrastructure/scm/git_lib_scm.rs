use super::scm_interface::{
    normalize_paths, truncate_at, BackendCapabilities, GitOperations, COMMIT_AUTHOR, COMMIT_EMAIL,
};
use crate::common::error::ErrorKind;
use crate::common::output::OutputSinks;
use crate::common::result::{GitResult, ResultExt};
use crate::domain::entities::branch_map::{build_branch_map, BranchRevisionMap};
use crate::domain::entities::repository_config::RepositoryConfig;
use crate::domain::entities::revision::Revision;
use crate::infrastructure::git::remote::{self, RemoteAuth};
use crate::infrastructure::git::repository::{is_pristine, GitRepository, GitRepositoryError, ResetMode};
use crate::infrastructure::git::{HistoryReader, SubmoduleManager};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SHALLOW_CLONE_UNSUPPORTED: &str =
    "libgit2 implementation does not support shallow clones; cloning full...";
pub const NO_CHECKOUT_UNSUPPORTED: &str =
    "libgit2 implementation does not support noCheckout; cloning full...";

/// Backend driving libgit2 in-process.
///
/// Each operation opens the working copy, does its work and drops the handle
/// before returning.
pub struct GitLibScm {
    config: RepositoryConfig,
    working_dir: PathBuf,
    sinks: OutputSinks,
    auth: RemoteAuth,
}

impl GitLibScm {
    pub fn new(config: RepositoryConfig, working_dir: impl Into<PathBuf>, sinks: OutputSinks) -> Self {
        let auth = RemoteAuth::from_config(&config);
        Self {
            config,
            working_dir: working_dir.into(),
            sinks,
            auth,
        }
    }

    fn open(&self, kind: ErrorKind) -> GitResult<GitRepository> {
        GitRepository::open(&self.working_dir)
            .or_git_err(kind, format!("could not open the repository at {}", self.working_dir.display()))
    }

    fn history(&self, sub_paths: &[String], limit: Option<usize>) -> GitResult<Vec<Revision>> {
        let repository = self.open(ErrorKind::Query)?;
        let paths = normalize_paths(sub_paths);
        HistoryReader::new(repository.repo())
            .walk_head(&paths, limit)
            .or_git_err(ErrorKind::Query, "could not walk the commit history")
    }

    fn clone_into_working_dir(&self) -> Result<(), GitRepositoryError> {
        let repository = GitRepository::clone(
            self.config.url(),
            &self.working_dir,
            self.config.effective_branch(),
            &self.auth,
            &self.sinks,
        )?;
        if self.config.recursive_submodule_update() {
            SubmoduleManager::new(repository.repo()).update(&self.auth, &self.sinks)?;
        }
        Ok(())
    }
}

/// Remove untracked content of `repository` and of every checked-out
/// sub-module below it
fn clean_tree(repository: &GitRepository) -> Result<(), GitRepositoryError> {
    for path in repository.remove_untracked()? {
        tracing::debug!("Removed {}", path);
    }
    for (name, nested) in SubmoduleManager::new(repository.repo()).opened()? {
        tracing::debug!("Cleaning sub-module {}", name);
        clean_tree(&GitRepository::from(nested)).map_err(|source| GitRepositoryError::SubmoduleCleanFailed {
            name,
            source: Box::new(source),
        })?;
    }
    Ok(())
}

impl GitOperations for GitLibScm {
    fn version(&self) -> GitResult<String> {
        let (major, minor, patch) = git2::Version::get().libgit2_version();
        Ok(format!("libgit2 {}.{}.{}", major, minor, patch))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            shallow_clone: false,
            no_checkout: false,
            should_reset_after_fetch: true,
        }
    }

    fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn check_connection(&self) -> GitResult<()> {
        tracing::debug!("Checking connection to {}", self.config.redacted_url());
        let heads = remote::list_remote_heads(self.config.url(), &self.auth, &self.sinks)
            .or_git_err(ErrorKind::Connection, format!("{} is not reachable", self.config.redacted_url()))?;
        tracing::debug!("{} advertises {} refs", self.config.redacted_url(), heads);
        Ok(())
    }

    fn clone_repository(&self) -> GitResult<()> {
        if self.config.shallow_clone() {
            self.sinks.out(SHALLOW_CLONE_UNSUPPORTED);
        }
        if self.config.no_checkout() {
            self.sinks.out(NO_CHECKOUT_UNSUPPORTED);
        }

        tracing::info!(
            "Cloning {} ({}) into {}",
            self.config.redacted_url(),
            self.config.effective_branch(),
            self.working_dir.display()
        );

        let pristine = is_pristine(&self.working_dir);
        if let Err(e) = self.clone_into_working_dir() {
            if pristine && self.working_dir.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&self.working_dir) {
                    tracing::warn!("Could not remove {}: {}", self.working_dir.display(), cleanup);
                }
            }
            return Err(ErrorKind::Clone.error_with_source(
                format!("could not clone {}", self.config.redacted_url()),
                e,
            ));
        }
        Ok(())
    }

    fn fetch(&self, ref_spec: &str) -> GitResult<()> {
        let repository = self.open(ErrorKind::Fetch)?;
        tracing::info!("Fetching origin in {}", self.working_dir.display());
        remote::fetch_origin(repository.repo(), ref_spec, &self.auth, &self.sinks)
            .or_git_err(ErrorKind::Fetch, "could not fetch from origin")
    }

    fn pull(&self) -> GitResult<()> {
        tracing::debug!("pull is not supported by the libgit2 backend");
        Ok(())
    }

    fn push(&self) -> GitResult<()> {
        tracing::debug!("push is not supported by the libgit2 backend");
        Ok(())
    }

    fn checkout_remote_branch_to_local(&self) -> GitResult<()> {
        let branch = self.config.effective_branch();
        self.open(ErrorKind::Checkout)?
            .checkout_remote_branch(branch)
            .or_git_err(ErrorKind::Checkout, format!("could not check out {}", branch))
    }

    fn reset_hard(&self, revision: &str) -> GitResult<()> {
        self.open(ErrorKind::Reset)?
            .reset(revision, ResetMode::Hard)
            .or_git_err(ErrorKind::Reset, format!("could not reset to {}", revision))
    }

    fn reset_soft(&self, revision: &str) -> GitResult<()> {
        self.open(ErrorKind::Reset)?
            .reset(revision, ResetMode::Soft)
            .or_git_err(ErrorKind::Reset, format!("could not move HEAD to {}", revision))
    }

    fn clean_all_unversioned_files(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Clean)?;
        clean_tree(&repository).map_err(|e| {
            let message = match &e {
                GitRepositoryError::SubmoduleCleanFailed { name, .. } => format!("could not clean sub-module {}", name),
                GitRepositoryError::SubmoduleNotOpen { name, .. } => format!("could not open sub-module {}", name),
                _ => "could not clean the working directory".to_string(),
            };
            ErrorKind::Clean.error_with_source(message, e)
        })
    }

    fn gc(&self) -> GitResult<()> {
        let packed = self
            .open(ErrorKind::Gc)?
            .pack_reachable_objects()
            .or_git_err(ErrorKind::Gc, "could not pack objects")?;
        if !packed {
            tracing::debug!("Nothing to pack in {}", self.working_dir.display());
        }
        Ok(())
    }

    fn working_repository_url(&self) -> GitResult<Option<String>> {
        let repository = self.open(ErrorKind::Query)?;
        remote::origin_url(repository.repo()).or_git_err(ErrorKind::Query, "could not read remote.origin.url")
    }

    fn current_branch(&self) -> GitResult<String> {
        self.open(ErrorKind::Query)?
            .current_branch()
            .or_git_err(ErrorKind::Query, "could not read the current branch")
    }

    fn commit_count(&self) -> GitResult<usize> {
        let repository = self.open(ErrorKind::Query)?;
        HistoryReader::new(repository.repo())
            .count()
            .or_git_err(ErrorKind::Query, "could not count commits")
    }

    fn all_revisions(&self) -> GitResult<Vec<Revision>> {
        self.history(&[], None)
    }

    fn latest_revision(&self, sub_paths: &[String]) -> GitResult<Option<Revision>> {
        Ok(self.history(sub_paths, Some(1))?.into_iter().next())
    }

    fn revisions_since(&self, previous_revision: &str, sub_paths: &[String]) -> GitResult<Vec<Revision>> {
        Ok(truncate_at(self.history(sub_paths, None)?, previous_revision))
    }

    fn details_for_revision(&self, revision: &str) -> GitResult<Option<Revision>> {
        let repository = self.open(ErrorKind::Query)?;
        HistoryReader::new(repository.repo())
            .find(revision)
            .or_git_err(ErrorKind::Query, format!("could not read {}", revision))
    }

    fn branch_to_revision_map(&self, pattern: &str) -> GitResult<BranchRevisionMap> {
        let targets = self
            .open(ErrorKind::Query)?
            .reference_targets()
            .or_git_err(ErrorKind::Query, "could not list refs")?;
        Ok(build_branch_map(targets, pattern))
    }

    fn submodule_init(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .init()
            .or_git_err(ErrorKind::Submodule, "could not initialize submodules")
    }

    fn submodule_sync(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .sync()
            .or_git_err(ErrorKind::Submodule, "could not sync submodules")
    }

    fn submodule_update(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .update(&self.auth, &self.sinks)
            .or_git_err(ErrorKind::Submodule, "could not update submodules")
    }

    fn submodule_add(&self, folder: &str, name: &str, relative_path: &str) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .add(folder, name, relative_path)
            .or_git_err(ErrorKind::Submodule, format!("could not add submodule {}", relative_path))
    }

    fn submodule_remove(&self, folder_name: &str) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .remove(folder_name)
            .or_git_err(ErrorKind::Submodule, format!("could not remove submodule {}", folder_name))
    }

    fn remove_submodule_sections_from_git_config(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .remove_sections_from_local_config()
            .or_git_err(ErrorKind::Submodule, "could not remove submodule sections")
    }

    fn submodule_folders(&self) -> GitResult<Vec<String>> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .folders()
            .or_git_err(ErrorKind::Submodule, "could not list submodules")
    }

    fn submodule_urls(&self) -> GitResult<Option<BTreeMap<String, String>>> {
        Ok(None)
    }

    fn change_submodule_url(&self, submodule_name: &str, _new_url: &str) -> GitResult<()> {
        tracing::debug!(
            "changing the url of {} is not supported by the libgit2 backend",
            submodule_name
        );
        Ok(())
    }

    fn print_submodule_status(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        let lines = SubmoduleManager::new(repository.repo())
            .status_lines()
            .or_git_err(ErrorKind::Submodule, "could not read submodule status")?;
        for line in lines {
            self.sinks.out(&line);
        }
        Ok(())
    }

    fn checkout_all_modified_files_in_submodules(&self) -> GitResult<()> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .checkout_head()
            .or_git_err(ErrorKind::Submodule, "could not check out modified files in submodules")
    }

    fn submodule_commit_count(&self, submodule_folder: &str) -> GitResult<usize> {
        let repository = self.open(ErrorKind::Submodule)?;
        SubmoduleManager::new(repository.repo())
            .commit_count(submodule_folder)
            .or_git_err(ErrorKind::Submodule, format!("could not count commits in {}", submodule_folder))
    }

    fn init(&self) -> GitResult<()> {
        GitRepository::init(&self.working_dir, self.config.effective_branch())
            .or_git_err(ErrorKind::Local, "could not initialize the repository")?;
        Ok(())
    }

    fn add(&self, path: &Path) -> GitResult<()> {
        self.open(ErrorKind::Local)?
            .stage(path)
            .or_git_err(ErrorKind::Local, format!("could not add {}", path.display()))
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        let oid = self
            .open(ErrorKind::Local)?
            .commit_index(COMMIT_AUTHOR, COMMIT_EMAIL, message)
            .or_git_err(ErrorKind::Local, "could not commit")?;
        tracing::debug!("Committed {}", oid);
        Ok(())
    }

    fn commit_on_date(&self, _message: &str, date: DateTime<Utc>) -> GitResult<()> {
        tracing::debug!("commit on {} is not supported by the libgit2 backend", date);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capabilities_are_reduced() {
        let scm = GitLibScm::new(RepositoryConfig::new("file:///tmp/repo"), "/tmp/never", OutputSinks::default());
        let capabilities = scm.capabilities();
        assert!(!capabilities.shallow_clone);
        assert!(!capabilities.no_checkout);
        assert!(capabilities.should_reset_after_fetch);
    }

    #[test]
    fn test_version_names_libgit2() {
        let scm = GitLibScm::new(RepositoryConfig::new("file:///tmp/repo"), "/tmp/never", OutputSinks::default());
        assert!(scm.version().unwrap().starts_with("libgit2 "));
    }

    #[test]
    fn test_unsupported_operations_do_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let scm = GitLibScm::new(RepositoryConfig::new("file:///tmp/repo"), temp_dir.path(), OutputSinks::default());

        scm.pull().unwrap();
        scm.push().unwrap();
        scm.change_submodule_url("sub", "file:///elsewhere").unwrap();
        scm.commit_on_date("message", Utc::now()).unwrap();
        assert_eq!(scm.submodule_urls().unwrap(), None);
        assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_failed_clone_removes_created_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("clone");
        let missing = temp_dir.path().join("missing-upstream");
        let (sinks, out, _) = OutputSinks::in_memory();
        let config = RepositoryConfig::new(missing.to_string_lossy()).with_shallow_clone(true);
        let scm = GitLibScm::new(config, &target, sinks);

        let result = scm.clone_repository();

        assert!(matches!(result, Err(crate::common::error::GitError::CloneError { .. })));
        assert!(!target.exists());
        assert_eq!(out.lines(), vec![SHALLOW_CLONE_UNSUPPORTED.to_string()]);
    }

    #[test]
    fn test_local_authoring_round() {
        let temp_dir = TempDir::new().unwrap();
        let scm = GitLibScm::new(
            RepositoryConfig::new("file:///tmp/repo").with_branch("main"),
            temp_dir.path().join("local"),
            OutputSinks::default(),
        );

        scm.init().unwrap();
        assert_eq!(scm.commit_count().unwrap(), 0);
        assert!(scm.latest_revision(&[]).unwrap().is_none());

        std::fs::write(temp_dir.path().join("local/a.txt"), "a\n").unwrap();
        scm.add(Path::new("a.txt")).unwrap();
        scm.commit("first").unwrap();

        assert_eq!(scm.commit_count().unwrap(), 1);
        assert_eq!(scm.current_branch().unwrap(), "main");
        let latest = scm.latest_revision(&[]).unwrap().unwrap();
        assert_eq!(latest.user(), COMMIT_AUTHOR);
        assert_eq!(latest.email_id(), COMMIT_EMAIL);
        assert_eq!(scm.current_revision().unwrap().as_deref(), Some(latest.revision()));
    }

    #[test]
    fn test_clean_failure_inside_submodule_names_it() {
        let temp_dir = TempDir::new().unwrap();
        let upstream = GitLibScm::new(
            RepositoryConfig::new("file:///tmp/repo"),
            temp_dir.path().join("upstream"),
            OutputSinks::default(),
        );
        upstream.init().unwrap();
        std::fs::write(temp_dir.path().join("upstream/a.txt"), "a\n").unwrap();
        upstream.add(Path::new("a.txt")).unwrap();
        upstream.commit("first").unwrap();

        let scm = GitLibScm::new(
            RepositoryConfig::new("file:///tmp/repo"),
            temp_dir.path().join("main"),
            OutputSinks::default(),
        );
        scm.init().unwrap();
        std::fs::write(temp_dir.path().join("main/main.txt"), "main\n").unwrap();
        scm.add(Path::new("main.txt")).unwrap();
        scm.commit("initial").unwrap();
        let folder = temp_dir.path().join("upstream").to_string_lossy().into_owned();
        scm.submodule_add(&folder, "sub", "sub").unwrap();
        std::fs::write(temp_dir.path().join("main/.git/modules/sub/index"), "not an index").unwrap();

        let err = scm.clean_all_unversioned_files().unwrap_err();

        assert!(matches!(err, crate::common::error::GitError::CleanError { .. }));
        assert!(err.to_string().contains("sub-module sub"), "{}", err);
    }
}
