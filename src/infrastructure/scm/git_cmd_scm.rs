use super::log_parser::{self, LOG_FORMAT, REF_FORMAT};
use super::scm_interface::{
    date_order, matches_any_path, normalize_paths, truncate_at, BackendCapabilities, CommitNode, GitOperations,
    COMMIT_AUTHOR, COMMIT_EMAIL,
};
use crate::common::error::ErrorKind;
use crate::common::output::OutputSinks;
use crate::common::result::{GitResult, ResultExt};
use crate::domain::entities::branch_map::{build_branch_map, BranchRevisionMap};
use crate::domain::entities::repository_config::RepositoryConfig;
use crate::domain::entities::revision::Revision;
use crate::infrastructure::process::{CommandExecutor, CommandExecutorError, ExecutionConfig, ExecutionResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Allows local (`file://` and path) submodule URLs, refused by default since git 2.38.1
const ALLOW_FILE_PROTOCOL: [&str; 2] = ["-c", "protocol.file.allow=always"];

/// Backend driving the `git` executable
pub struct GitCmdScm {
    git_executable: PathBuf,
    config: RepositoryConfig,
    working_dir: PathBuf,
    sinks: OutputSinks,
}

impl GitCmdScm {
    pub fn new(config: RepositoryConfig, working_dir: impl Into<PathBuf>, sinks: OutputSinks) -> Self {
        Self {
            git_executable: PathBuf::from("git"),
            config,
            working_dir: working_dir.into(),
            sinks,
        }
    }

    /// Use a specific `git` binary instead of the one on `PATH`
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.git_executable = executable.into();
        self
    }

    fn execution_config(&self, dir: Option<&Path>) -> ExecutionConfig {
        let mut config = ExecutionConfig::new().with_environment_variable("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = dir {
            config = config.with_working_directory(dir);
        }
        if let Some(password) = self.config.password() {
            config = config.with_secret(password);
        }
        config
    }

    /// Run git in the working directory, forwarding output to the sinks
    fn run(&self, args: &[&str]) -> Result<ExecutionResult, CommandExecutorError> {
        self.run_in(Some(&self.working_dir), args)
    }

    fn run_in(&self, dir: Option<&Path>, args: &[&str]) -> Result<ExecutionResult, CommandExecutorError> {
        CommandExecutor::execute_checked(&self.git_executable, args, &self.execution_config(dir), &self.sinks)
    }

    /// Run git in `dir` and return its stdout without forwarding it
    fn query_in(&self, dir: &Path, args: &[&str]) -> Result<String, CommandExecutorError> {
        let config = self.execution_config(Some(dir)).quiet();
        CommandExecutor::execute_checked(&self.git_executable, args, &config, &self.sinks).map(|result| result.stdout)
    }

    fn query(&self, args: &[&str]) -> Result<String, CommandExecutorError> {
        self.query_in(&self.working_dir, args)
    }

    /// Exit status of a query; stdout is `Some` only on success
    fn probe(&self, args: &[&str]) -> Result<Option<String>, CommandExecutorError> {
        let config = self.execution_config(Some(&self.working_dir)).quiet();
        let result = CommandExecutor::execute(&self.git_executable, args, &config, &self.sinks)?;
        Ok(result.success.then_some(result.stdout))
    }

    fn has_head(&self) -> GitResult<bool> {
        Ok(self
            .probe(&["rev-parse", "--verify", "-q", "HEAD"])
            .or_git_err(ErrorKind::Query, "could not resolve HEAD")?
            .is_some())
    }

    /// `git log` over `revisions`, optionally limited to commits whose
    /// first-parent diff touches `sub_paths`
    fn log(&self, revisions: &[&str], sub_paths: &[String], limit: Option<usize>) -> GitResult<Vec<Revision>> {
        let paths = normalize_paths(sub_paths);
        let limit_arg = limit.filter(|_| paths.is_empty()).map(|n| format!("-n{}", n));

        let mut args = vec![
            "log",
            "-z",
            "--date-order",
            LOG_FORMAT,
            "--name-status",
            "-M",
            "--diff-merges=first-parent",
        ];
        if let Some(limit_arg) = &limit_arg {
            args.push(limit_arg);
        }
        args.extend_from_slice(revisions);

        let output = self.query(&args).or_git_err(ErrorKind::Query, "could not read the commit log")?;
        let entries = log_parser::parse_log(&output).or_git_err(ErrorKind::Query, "could not parse the commit log")?;
        let mut entries = in_date_order(entries);

        if !paths.is_empty() {
            let touching = self.commits_touching(revisions, &paths)?;
            entries.retain(|entry| touching.contains(&entry.hash));
        }
        if let Some(limit) = limit {
            entries.truncate(limit);
        }

        entries
            .into_iter()
            .map(|entry| {
                if entry.is_root() {
                    let tree = self
                        .query(&["ls-tree", "-z", "--name-only", &entry.hash])
                        .or_git_err(ErrorKind::Query, format!("could not list the tree of {}", entry.hash))?;
                    Ok(entry.with_root_entries(log_parser::parse_name_list(&tree)).into_revision())
                } else {
                    Ok(entry.into_revision())
                }
            })
            .collect()
    }

    /// Hashes of the commits whose diff against their first parent (the
    /// empty tree for roots) touches `paths`. Renames count for both sides.
    fn commits_touching(&self, revisions: &[&str], paths: &[String]) -> GitResult<HashSet<String>> {
        let mut args = vec![
            "log",
            "-z",
            LOG_FORMAT,
            "--name-status",
            "--no-renames",
            "--root",
            "--diff-merges=first-parent",
        ];
        args.extend_from_slice(revisions);

        let output = self.query(&args).or_git_err(ErrorKind::Query, "could not read the commit log")?;
        let entries = log_parser::parse_log(&output).or_git_err(ErrorKind::Query, "could not parse the commit log")?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.changes.iter().any(|change| matches_any_path(&change.path, paths)))
            .map(|entry| entry.hash)
            .collect())
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).map(|mut entries| entries.next().is_none()).unwrap_or(true)
    }

    /// Name of the submodule checked out at `folder`, from `.gitmodules`
    fn submodule_name_for(&self, folder: &str) -> GitResult<String> {
        let output = self
            .probe(&["config", "--file", ".gitmodules", "--get-regexp", r"^submodule\..*\.path$"])
            .or_git_err(ErrorKind::Submodule, "could not read .gitmodules")?
            .unwrap_or_default();

        let name = output.lines().find_map(|line| {
            let (key, path) = line.trim().split_once(' ')?;
            if path.trim() != folder {
                return None;
            }
            key.strip_prefix("submodule.")?.strip_suffix(".path").map(str::to_string)
        });
        Ok(name.unwrap_or_else(|| folder.to_string()))
    }

    /// Remove `submodule.<name>` from the repository config or from `file`,
    /// if present
    fn remove_config_section(&self, file: Option<&str>, name: &str) -> GitResult<()> {
        let section = format!("submodule.{}", name);
        let pattern = format!("^{}\\.", regex::escape(&section));

        let mut probe_args = vec!["config"];
        let mut remove_args = vec!["config"];
        if let Some(file) = file {
            probe_args.extend(["--file", file]);
            remove_args.extend(["--file", file]);
        }
        probe_args.extend(["--get-regexp", pattern.as_str()]);
        remove_args.extend(["--remove-section", section.as_str()]);

        let exists = self
            .probe(&probe_args)
            .or_git_err(ErrorKind::Submodule, format!("could not read section {}", section))?
            .is_some();
        if exists {
            self.run(&remove_args)
                .or_git_err(ErrorKind::Submodule, format!("could not remove section {}", section))?;
        }
        Ok(())
    }
}

impl GitOperations for GitCmdScm {
    fn version(&self) -> GitResult<String> {
        let config = self.execution_config(None).quiet();
        let result = CommandExecutor::execute_checked(&self.git_executable, &["--version"], &config, &self.sinks)
            .or_git_err(ErrorKind::Query, "could not determine the git version")?;
        Ok(log_parser::parse_version(&result.stdout))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            shallow_clone: true,
            no_checkout: true,
            should_reset_after_fetch: !self.config.no_checkout(),
        }
    }

    fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn check_connection(&self) -> GitResult<()> {
        let url = self.config.effective_url();
        tracing::debug!("Checking connection to {}", self.config.redacted_url());
        self.run_in(None, &["ls-remote", "--heads", &url])
            .or_git_err(ErrorKind::Connection, format!("{} is not reachable", self.config.redacted_url()))?;
        Ok(())
    }

    fn clone_repository(&self) -> GitResult<()> {
        let pristine = Self::is_empty_dir(&self.working_dir);
        let url = self.config.effective_url();
        let target = self.working_dir.to_string_lossy().into_owned();

        let mut args: Vec<&str> = Vec::new();
        if self.config.recursive_submodule_update() {
            args.extend(ALLOW_FILE_PROTOCOL);
        }
        args.push("clone");
        args.extend(["--branch", self.config.effective_branch()]);
        if self.config.shallow_clone() {
            args.extend(["--depth", "1"]);
        }
        if self.config.no_checkout() {
            args.push("--no-checkout");
        }
        if self.config.recursive_submodule_update() {
            args.push("--recurse-submodules");
        }
        args.extend([url.as_str(), target.as_str()]);

        tracing::info!(
            "Cloning {} ({}) into {}",
            self.config.redacted_url(),
            self.config.effective_branch(),
            self.working_dir.display()
        );

        if let Err(e) = self.run_in(None, &args) {
            if pristine && self.working_dir.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&self.working_dir) {
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
        let mut args = vec!["fetch", "origin", "--prune", "--recurse-submodules=no"];
        let ref_spec = ref_spec.trim();
        if !ref_spec.is_empty() {
            args.push(ref_spec);
        }
        tracing::info!("Fetching origin in {}", self.working_dir.display());
        self.run(&args).or_git_err(ErrorKind::Fetch, "could not fetch from origin")?;
        Ok(())
    }

    fn pull(&self) -> GitResult<()> {
        self.run(&["pull"]).or_git_err(ErrorKind::Local, "could not pull")?;
        Ok(())
    }

    fn push(&self) -> GitResult<()> {
        self.run(&["push"]).or_git_err(ErrorKind::Local, "could not push")?;
        Ok(())
    }

    fn checkout_remote_branch_to_local(&self) -> GitResult<()> {
        let branch = self.config.effective_branch();
        let remote_branch = format!("origin/{}", branch);
        let remote_ref = format!("refs/remotes/{}", remote_branch);

        let has_remote = self
            .probe(&["rev-parse", "--verify", "-q", &remote_ref])
            .or_git_err(ErrorKind::Checkout, format!("could not resolve {}", remote_branch))?
            .is_some();

        let result = if has_remote {
            self.run(&["checkout", "-f", "-B", branch, &remote_branch])
        } else {
            self.run(&["checkout", "-f", branch])
        };
        result.or_git_err(ErrorKind::Checkout, format!("could not check out {}", branch))?;
        Ok(())
    }

    fn reset_hard(&self, revision: &str) -> GitResult<()> {
        self.run(&["reset", "--hard", revision])
            .or_git_err(ErrorKind::Reset, format!("could not reset to {}", revision))?;
        Ok(())
    }

    fn reset_soft(&self, revision: &str) -> GitResult<()> {
        self.run(&["reset", "--soft", revision])
            .or_git_err(ErrorKind::Reset, format!("could not move HEAD to {}", revision))?;
        Ok(())
    }

    fn clean_all_unversioned_files(&self) -> GitResult<()> {
        self.run(&["clean", "-dff"])
            .or_git_err(ErrorKind::Clean, "could not clean the working directory")?;
        self.run(&["submodule", "foreach", "--recursive", "git", "clean", "-dff"])
            .or_git_err(ErrorKind::Clean, "could not clean submodules")?;
        Ok(())
    }

    fn gc(&self) -> GitResult<()> {
        self.run(&["gc", "--auto"]).or_git_err(ErrorKind::Gc, "git gc failed")?;
        Ok(())
    }

    fn working_repository_url(&self) -> GitResult<Option<String>> {
        let url = self
            .probe(&["config", "remote.origin.url"])
            .or_git_err(ErrorKind::Query, "could not read remote.origin.url")?;
        Ok(url.map(|url| url.trim().to_string()).filter(|url| !url.is_empty()))
    }

    fn current_branch(&self) -> GitResult<String> {
        let branch = self
            .query(&["rev-parse", "--abbrev-ref", "HEAD"])
            .or_git_err(ErrorKind::Query, "could not read the current branch")?;
        Ok(branch.trim().to_string())
    }

    fn commit_count(&self) -> GitResult<usize> {
        if !self.has_head()? {
            return Ok(0);
        }
        let count = self
            .query(&["rev-list", "--count", "HEAD"])
            .or_git_err(ErrorKind::Query, "could not count commits")?;
        count
            .trim()
            .parse()
            .or_git_err(ErrorKind::Query, format!("unexpected commit count '{}'", count.trim()))
    }

    fn all_revisions(&self) -> GitResult<Vec<Revision>> {
        if !self.has_head()? {
            return Ok(Vec::new());
        }
        self.log(&["HEAD"], &[], None)
    }

    fn latest_revision(&self, sub_paths: &[String]) -> GitResult<Option<Revision>> {
        if !self.has_head()? {
            return Ok(None);
        }
        Ok(self.log(&["HEAD"], sub_paths, Some(1))?.into_iter().next())
    }

    fn revisions_since(&self, previous_revision: &str, sub_paths: &[String]) -> GitResult<Vec<Revision>> {
        if !self.has_head()? {
            return Ok(Vec::new());
        }
        let history = self.log(&["HEAD"], sub_paths, None)?;
        Ok(truncate_at(history, previous_revision))
    }

    fn details_for_revision(&self, revision: &str) -> GitResult<Option<Revision>> {
        let commit = format!("{}^{{commit}}", revision.trim());
        let exists = self
            .probe(&["rev-parse", "--verify", "-q", &commit])
            .or_git_err(ErrorKind::Query, format!("could not resolve {}", revision))?
            .is_some();
        if !exists {
            return Ok(None);
        }
        Ok(self.log(&[revision.trim()], &[], Some(1))?.into_iter().next())
    }

    fn branch_to_revision_map(&self, pattern: &str) -> GitResult<BranchRevisionMap> {
        let output = self
            .query(&["for-each-ref", REF_FORMAT])
            .or_git_err(ErrorKind::Query, "could not list refs")?;
        Ok(build_branch_map(log_parser::parse_refs(&output), pattern))
    }

    fn submodule_init(&self) -> GitResult<()> {
        self.run(&["submodule", "init"])
            .or_git_err(ErrorKind::Submodule, "could not initialize submodules")?;
        Ok(())
    }

    fn submodule_sync(&self) -> GitResult<()> {
        self.run(&["submodule", "sync", "--recursive"])
            .or_git_err(ErrorKind::Submodule, "could not sync submodules")?;
        Ok(())
    }

    fn submodule_update(&self) -> GitResult<()> {
        let mut args = ALLOW_FILE_PROTOCOL.to_vec();
        args.extend(["submodule", "update", "--init", "--recursive"]);
        self.run(&args).or_git_err(ErrorKind::Submodule, "could not update submodules")?;
        Ok(())
    }

    fn submodule_add(&self, folder: &str, name: &str, relative_path: &str) -> GitResult<()> {
        let mut args = ALLOW_FILE_PROTOCOL.to_vec();
        args.extend(["submodule", "add", folder, relative_path]);
        self.run(&args)
            .or_git_err(ErrorKind::Submodule, format!("could not add submodule {}", relative_path))?;

        if name != relative_path {
            let from = format!("submodule.{}", relative_path);
            let to = format!("submodule.{}", name);
            self.run(&["config", "--file", ".gitmodules", "--rename-section", &from, &to])
                .or_git_err(ErrorKind::Submodule, format!("could not rename submodule {} to {}", relative_path, name))?;
        }

        self.run(&["add", ".gitmodules"])
            .or_git_err(ErrorKind::Submodule, "could not stage .gitmodules")?;
        Ok(())
    }

    fn submodule_remove(&self, folder_name: &str) -> GitResult<()> {
        let name = self.submodule_name_for(folder_name)?;

        // git refuses to unstage a submodule while .gitmodules has unstaged edits
        self.run(&["rm", "--cached", "--ignore-unmatch", "-q", folder_name])
            .or_git_err(ErrorKind::Submodule, format!("could not unstage {}", folder_name))?;

        self.remove_config_section(None, &name)?;
        self.remove_config_section(Some(".gitmodules"), &name)?;
        if self.working_dir.join(".gitmodules").exists() {
            self.run(&["add", ".gitmodules"])
                .or_git_err(ErrorKind::Submodule, "could not stage .gitmodules")?;
        }

        for dir in [self.working_dir.join(folder_name), self.working_dir.join(".git").join("modules").join(&name)] {
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .or_git_err(ErrorKind::Submodule, format!("could not delete {}", dir.display()))?;
            }
        }
        Ok(())
    }

    fn remove_submodule_sections_from_git_config(&self) -> GitResult<()> {
        let output = self
            .probe(&["config", "--local", "--get-regexp", r"^submodule\."])
            .or_git_err(ErrorKind::Submodule, "could not read submodule config")?
            .unwrap_or_default();

        let mut names: Vec<String> = output
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter_map(|key| key.strip_prefix("submodule."))
            .filter_map(|rest| rest.rsplit_once('.').map(|(name, _)| name.to_string()))
            .collect();
        names.dedup();

        for name in names {
            self.remove_config_section(None, &name)?;
        }
        Ok(())
    }

    fn submodule_folders(&self) -> GitResult<Vec<String>> {
        let output = self
            .query(&["submodule", "status"])
            .or_git_err(ErrorKind::Submodule, "could not read submodule status")?;
        let mut folders: Vec<String> = log_parser::parse_submodule_status(&output)
            .into_iter()
            .map(|status| status.path)
            .collect();
        folders.sort();
        Ok(folders)
    }

    fn submodule_urls(&self) -> GitResult<Option<BTreeMap<String, String>>> {
        let output = self
            .probe(&["config", "--get-regexp", r"^submodule\..*\.url$"])
            .or_git_err(ErrorKind::Submodule, "could not read submodule urls")?
            .unwrap_or_default();
        Ok(Some(log_parser::parse_submodule_urls(&output)))
    }

    fn change_submodule_url(&self, submodule_name: &str, new_url: &str) -> GitResult<()> {
        let key = format!("submodule.{}.url", submodule_name);
        self.run(&["config", "--file", ".gitmodules", &key, new_url])
            .or_git_err(ErrorKind::Submodule, format!("could not change the url of {}", submodule_name))?;
        Ok(())
    }

    fn print_submodule_status(&self) -> GitResult<()> {
        self.run(&["submodule", "status"])
            .or_git_err(ErrorKind::Submodule, "could not print submodule status")?;
        Ok(())
    }

    fn checkout_all_modified_files_in_submodules(&self) -> GitResult<()> {
        self.run(&["submodule", "foreach", "--recursive", "git", "checkout", "--", "."])
            .or_git_err(ErrorKind::Submodule, "could not check out modified files in submodules")?;
        Ok(())
    }

    fn submodule_commit_count(&self, submodule_folder: &str) -> GitResult<usize> {
        let dir = self.working_dir.join(submodule_folder);
        let count = self
            .query_in(&dir, &["rev-list", "--count", "HEAD"])
            .or_git_err(ErrorKind::Submodule, format!("could not count commits in {}", submodule_folder))?;
        count
            .trim()
            .parse()
            .or_git_err(ErrorKind::Submodule, format!("unexpected commit count '{}'", count.trim()))
    }

    fn init(&self) -> GitResult<()> {
        fs::create_dir_all(&self.working_dir)
            .or_git_err(ErrorKind::Local, format!("could not create {}", self.working_dir.display()))?;
        let initial_branch = format!("--initial-branch={}", self.config.effective_branch());
        self.run(&["init", &initial_branch])
            .or_git_err(ErrorKind::Local, "could not initialize the repository")?;
        Ok(())
    }

    fn add(&self, path: &Path) -> GitResult<()> {
        let path = path.to_string_lossy();
        self.run(&["add", "--", &path])
            .or_git_err(ErrorKind::Local, format!("could not add {}", path))?;
        Ok(())
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        let name = format!("user.name={}", COMMIT_AUTHOR);
        let email = format!("user.email={}", COMMIT_EMAIL);
        self.run(&["-c", &name, "-c", &email, "commit", "-m", message])
            .or_git_err(ErrorKind::Local, "could not commit")?;
        Ok(())
    }

    fn commit_on_date(&self, message: &str, date: DateTime<Utc>) -> GitResult<()> {
        let name = format!("user.name={}", COMMIT_AUTHOR);
        let email = format!("user.email={}", COMMIT_EMAIL);
        let date = date.to_rfc3339_opts(SecondsFormat::Secs, false);
        let date_arg = format!("--date={}", date);

        let config = self
            .execution_config(Some(&self.working_dir))
            .with_environment_variable("GIT_COMMITTER_DATE", date.as_str());
        CommandExecutor::execute_checked(
            &self.git_executable,
            &["-c", &name, "-c", &email, "commit", &date_arg, "-m", message],
            &config,
            &self.sinks,
        )
        .or_git_err(ErrorKind::Local, "could not commit")?;
        Ok(())
    }
}

/// Reorder `git log` entries into the shared newest-first history order
fn in_date_order(entries: Vec<log_parser::LogEntry>) -> Vec<log_parser::LogEntry> {
    let order = {
        let nodes: Vec<CommitNode<'_>> = entries
            .iter()
            .map(|entry| CommitNode {
                id: &entry.hash,
                parents: &entry.parents,
                commit_time: entry.commit_time,
            })
            .collect();
        date_order(&nodes)
    };

    let mut slots: Vec<Option<log_parser::LogEntry>> = entries.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
