use super::git_cmd_scm::GitCmdScm;
use super::git_lib_scm::GitLibScm;
use super::scm_interface::{BackendCapabilities, GitOperations};
use crate::common::output::OutputSinks;
use crate::common::result::GitResult;
use crate::domain::entities::branch_map::BranchRevisionMap;
use crate::domain::entities::repository_config::RepositoryConfig;
use crate::domain::entities::revision::Revision;
use crate::domain::value_objects::backend_kind::BackendKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One of the two backends, chosen at runtime
pub enum GitBackend {
    CommandLine(GitCmdScm),
    Library(GitLibScm),
}

impl GitBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            GitBackend::CommandLine(_) => BackendKind::CommandLine,
            GitBackend::Library(_) => BackendKind::Library,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            GitBackend::CommandLine($backend) => $call,
            GitBackend::Library($backend) => $call,
        }
    };
}

impl GitOperations for GitBackend {
    fn version(&self) -> GitResult<String> {
        dispatch!(self, b => b.version())
    }

    fn capabilities(&self) -> BackendCapabilities {
        dispatch!(self, b => b.capabilities())
    }

    fn config(&self) -> &RepositoryConfig {
        dispatch!(self, b => b.config())
    }

    fn working_dir(&self) -> &Path {
        dispatch!(self, b => b.working_dir())
    }

    fn check_connection(&self) -> GitResult<()> {
        dispatch!(self, b => b.check_connection())
    }

    fn clone_repository(&self) -> GitResult<()> {
        dispatch!(self, b => b.clone_repository())
    }

    fn fetch(&self, ref_spec: &str) -> GitResult<()> {
        dispatch!(self, b => b.fetch(ref_spec))
    }

    fn pull(&self) -> GitResult<()> {
        dispatch!(self, b => b.pull())
    }

    fn push(&self) -> GitResult<()> {
        dispatch!(self, b => b.push())
    }

    fn checkout_remote_branch_to_local(&self) -> GitResult<()> {
        dispatch!(self, b => b.checkout_remote_branch_to_local())
    }

    fn reset_hard(&self, revision: &str) -> GitResult<()> {
        dispatch!(self, b => b.reset_hard(revision))
    }

    fn reset_soft(&self, revision: &str) -> GitResult<()> {
        dispatch!(self, b => b.reset_soft(revision))
    }

    fn clean_all_unversioned_files(&self) -> GitResult<()> {
        dispatch!(self, b => b.clean_all_unversioned_files())
    }

    fn gc(&self) -> GitResult<()> {
        dispatch!(self, b => b.gc())
    }

    fn working_repository_url(&self) -> GitResult<Option<String>> {
        dispatch!(self, b => b.working_repository_url())
    }

    fn current_branch(&self) -> GitResult<String> {
        dispatch!(self, b => b.current_branch())
    }

    fn commit_count(&self) -> GitResult<usize> {
        dispatch!(self, b => b.commit_count())
    }

    fn all_revisions(&self) -> GitResult<Vec<Revision>> {
        dispatch!(self, b => b.all_revisions())
    }

    fn latest_revision(&self, sub_paths: &[String]) -> GitResult<Option<Revision>> {
        dispatch!(self, b => b.latest_revision(sub_paths))
    }

    fn revisions_since(&self, previous_revision: &str, sub_paths: &[String]) -> GitResult<Vec<Revision>> {
        dispatch!(self, b => b.revisions_since(previous_revision, sub_paths))
    }

    fn details_for_revision(&self, revision: &str) -> GitResult<Option<Revision>> {
        dispatch!(self, b => b.details_for_revision(revision))
    }

    fn branch_to_revision_map(&self, pattern: &str) -> GitResult<BranchRevisionMap> {
        dispatch!(self, b => b.branch_to_revision_map(pattern))
    }

    fn submodule_init(&self) -> GitResult<()> {
        dispatch!(self, b => b.submodule_init())
    }

    fn submodule_sync(&self) -> GitResult<()> {
        dispatch!(self, b => b.submodule_sync())
    }

    fn submodule_update(&self) -> GitResult<()> {
        dispatch!(self, b => b.submodule_update())
    }

    fn submodule_add(&self, folder: &str, name: &str, relative_path: &str) -> GitResult<()> {
        dispatch!(self, b => b.submodule_add(folder, name, relative_path))
    }

    fn submodule_remove(&self, folder_name: &str) -> GitResult<()> {
        dispatch!(self, b => b.submodule_remove(folder_name))
    }

    fn remove_submodule_sections_from_git_config(&self) -> GitResult<()> {
        dispatch!(self, b => b.remove_submodule_sections_from_git_config())
    }

    fn submodule_folders(&self) -> GitResult<Vec<String>> {
        dispatch!(self, b => b.submodule_folders())
    }

    fn submodule_urls(&self) -> GitResult<Option<BTreeMap<String, String>>> {
        dispatch!(self, b => b.submodule_urls())
    }

    fn change_submodule_url(&self, submodule_name: &str, new_url: &str) -> GitResult<()> {
        dispatch!(self, b => b.change_submodule_url(submodule_name, new_url))
    }

    fn print_submodule_status(&self) -> GitResult<()> {
        dispatch!(self, b => b.print_submodule_status())
    }

    fn checkout_all_modified_files_in_submodules(&self) -> GitResult<()> {
        dispatch!(self, b => b.checkout_all_modified_files_in_submodules())
    }

    fn submodule_commit_count(&self, submodule_folder: &str) -> GitResult<usize> {
        dispatch!(self, b => b.submodule_commit_count(submodule_folder))
    }

    fn init(&self) -> GitResult<()> {
        dispatch!(self, b => b.init())
    }

    fn add(&self, path: &Path) -> GitResult<()> {
        dispatch!(self, b => b.add(path))
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        dispatch!(self, b => b.commit(message))
    }

    fn commit_on_date(&self, message: &str, date: DateTime<Utc>) -> GitResult<()> {
        dispatch!(self, b => b.commit_on_date(message, date))
    }
}

/// Factory for backend instances
pub struct ScmFactory;

impl ScmFactory {
    /// Create the backend of `kind` for `config`, working in `working_dir`
    pub fn create(
        kind: BackendKind,
        config: RepositoryConfig,
        working_dir: impl Into<PathBuf>,
        sinks: OutputSinks,
    ) -> GitBackend {
        match kind {
            BackendKind::CommandLine => GitBackend::CommandLine(GitCmdScm::new(config, working_dir, sinks)),
            BackendKind::Library => GitBackend::Library(GitLibScm::new(config, working_dir, sinks)),
        }
    }

    /// Command-line backend using a specific `git` binary
    pub fn create_with_executable(
        executable: impl Into<PathBuf>,
        config: RepositoryConfig,
        working_dir: impl Into<PathBuf>,
        sinks: OutputSinks,
    ) -> GitBackend {
        GitBackend::CommandLine(GitCmdScm::new(config, working_dir, sinks).with_executable(executable))
    }

    /// True when `path` holds a working copy
    pub fn is_working_copy(path: &Path) -> bool {
        path.join(".git").exists()
    }
}
