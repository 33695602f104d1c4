use crate::common::output::OutputSinks;
use crate::infrastructure::git::history::HistoryReader;
use crate::infrastructure::git::remote::RemoteAuth;
use crate::infrastructure::git::repository::GitRepositoryError;
use git2::{
    build::CheckoutBuilder, Config, ConfigLevel, ErrorCode, Repository as Git2Repository, Submodule,
    SubmoduleUpdateOptions,
};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Keys git writes below a `submodule.<name>` section
const SUBMODULE_KEYS: [&str; 8] = [
    "url",
    "path",
    "branch",
    "update",
    "active",
    "ignore",
    "shallow",
    "fetchRecurseSubmodules",
];

/// Sub-module operations on one working copy
pub struct SubmoduleManager<'repo> {
    repo: &'repo Git2Repository,
}

impl<'repo> SubmoduleManager<'repo> {
    pub fn new(repo: &'repo Git2Repository) -> Self {
        Self { repo }
    }

    fn workdir(&self) -> Result<&Path, GitRepositoryError> {
        self.repo
            .workdir()
            .ok_or_else(|| GitRepositoryError::RepositoryNotFound(self.repo.path().display().to_string()))
    }

    /// Copy the URL of every declared sub-module into the local config
    pub fn init(&self) -> Result<(), GitRepositoryError> {
        for mut submodule in self.repo.submodules()? {
            submodule.init(false)?;
        }
        Ok(())
    }

    /// Re-apply `.gitmodules` URLs to the local config, recursively
    pub fn sync(&self) -> Result<(), GitRepositoryError> {
        for mut submodule in self.repo.submodules()? {
            submodule.sync()?;
            if let Ok(nested) = submodule.open() {
                SubmoduleManager::new(&nested).sync()?;
            }
        }
        Ok(())
    }

    /// Clone missing sub-modules and check out the recorded commits, recursively
    pub fn update(&self, auth: &RemoteAuth, sinks: &OutputSinks) -> Result<(), GitRepositoryError> {
        for mut submodule in self.repo.submodules()? {
            let name = submodule_name(&submodule);
            tracing::debug!("updating sub-module {}", name);

            let mut options = SubmoduleUpdateOptions::new();
            options.fetch(auth.fetch_options(sinks));
            submodule.update(true, Some(&mut options))?;

            let nested = submodule
                .open()
                .map_err(|source| GitRepositoryError::SubmoduleNotOpen { name, source })?;
            SubmoduleManager::new(&nested).update(auth, sinks)?;
        }
        Ok(())
    }

    /// Register `folder_url` as a sub-module at `relative_path`, clone it and
    /// stage the result. The `.gitmodules` section is renamed to `name` when
    /// it differs from the path.
    pub fn add(&self, folder_url: &str, name: &str, relative_path: &str) -> Result<(), GitRepositoryError> {
        let mut submodule = self.repo.submodule(folder_url, Path::new(relative_path), true)?;
        submodule.clone(None)?;
        submodule.add_finalize()?;

        if name != relative_path {
            let gitmodules = self.workdir()?.join(".gitmodules");
            let mut config = Config::open(&gitmodules)?;
            move_section(&mut config, relative_path, name)?;

            if let Ok(mut local) = self.local_config() {
                if has_section(&local, relative_path) {
                    move_section(&mut local, relative_path, name)?;
                }
            }

            let mut index = self.repo.index()?;
            index.add_path(Path::new(".gitmodules"))?;
            index.write()?;
        }
        Ok(())
    }

    /// Unregister the sub-module at `folder` and delete its files.
    ///
    /// Missing pieces are skipped, so removing twice is harmless.
    pub fn remove(&self, folder: &str) -> Result<(), GitRepositoryError> {
        let name = self.name_for(folder);

        if let Ok(mut local) = self.local_config() {
            remove_section(&mut local, &name)?;
        }
        if let Some(mut gitmodules) = self.gitmodules_config()? {
            remove_section(&mut gitmodules, &name)?;
        }

        let mut index = self.repo.index()?;
        if index.get_path(Path::new(folder), 0).is_some() {
            index.remove_path(Path::new(folder))?;
        }
        if self.workdir()?.join(".gitmodules").exists() {
            index.add_path(Path::new(".gitmodules"))?;
        }
        index.write()?;

        let checkout = self.workdir()?.join(folder);
        if checkout.exists() {
            std::fs::remove_dir_all(&checkout)?;
        }
        let module_dir = self.repo.path().join("modules").join(&name);
        if module_dir.exists() {
            std::fs::remove_dir_all(&module_dir)?;
        }
        Ok(())
    }

    /// Drop every `submodule.*` section from `.git/config`
    pub fn remove_sections_from_local_config(&self) -> Result<(), GitRepositoryError> {
        let config_file = self.repo.path().join("config");
        let names = section_names(&config_file)?;
        if names.is_empty() {
            return Ok(());
        }

        let mut local = self.local_config()?;
        for name in names {
            remove_section(&mut local, &name)?;
        }
        Ok(())
    }

    /// Paths of the declared sub-modules, sorted
    pub fn folders(&self) -> Result<Vec<String>, GitRepositoryError> {
        let mut folders: Vec<String> = self
            .repo
            .submodules()?
            .iter()
            .map(|submodule| submodule.path().to_string_lossy().into_owned())
            .collect();
        folders.sort();
        Ok(folders)
    }

    /// One `<state><sha> <path>` line per sub-module; the state is `-` when
    /// not checked out and `+` when the checkout differs from the index.
    pub fn status_lines(&self) -> Result<Vec<String>, GitRepositoryError> {
        let mut lines = Vec::new();
        for submodule in self.repo.submodules()? {
            let state = match (submodule.index_id(), submodule.workdir_id()) {
                (_, None) => '-',
                (Some(index), Some(workdir)) if index != workdir => '+',
                _ => ' ',
            };
            let sha = submodule
                .workdir_id()
                .or_else(|| submodule.index_id())
                .or_else(|| submodule.head_id())
                .map(|oid| oid.to_string())
                .unwrap_or_default();
            lines.push(format!("{}{} {}", state, sha, submodule.path().display()));
        }
        Ok(lines)
    }

    /// Force every checked-out sub-module back to its own HEAD, recursively
    pub fn checkout_head(&self) -> Result<(), GitRepositoryError> {
        for submodule in self.repo.submodules()? {
            if let Ok(nested) = submodule.open() {
                let mut checkout = CheckoutBuilder::new();
                checkout.force();
                nested.checkout_head(Some(&mut checkout))?;
                SubmoduleManager::new(&nested).checkout_head()?;
            }
        }
        Ok(())
    }

    /// Working copies of the checked-out sub-modules
    pub fn opened(&self) -> Result<Vec<(String, Git2Repository)>, GitRepositoryError> {
        let workdir = self.workdir()?.to_path_buf();
        let mut opened = Vec::new();
        for submodule in self.repo.submodules()? {
            if !workdir.join(submodule.path()).join(".git").exists() {
                continue;
            }
            let name = submodule_name(&submodule);
            let nested = submodule
                .open()
                .map_err(|source| GitRepositoryError::SubmoduleNotOpen { name: name.clone(), source })?;
            opened.push((name, nested));
        }
        Ok(opened)
    }

    /// Commits reachable from the HEAD of the sub-module checked out at `folder`
    pub fn commit_count(&self, folder: &str) -> Result<usize, GitRepositoryError> {
        let path = self.workdir()?.join(folder);
        let nested = Git2Repository::open(&path)
            .map_err(|source| GitRepositoryError::SubmoduleNotOpen { name: folder.to_string(), source })?;
        let count = HistoryReader::new(&nested).count()?;
        Ok(count)
    }

    fn name_for(&self, folder: &str) -> String {
        self.repo
            .submodules()
            .unwrap_or_default()
            .iter()
            .find(|submodule| submodule.path() == Path::new(folder))
            .and_then(|submodule| submodule.name().map(str::to_string))
            .unwrap_or_else(|| folder.to_string())
    }

    fn local_config(&self) -> Result<Config, git2::Error> {
        self.repo.config()?.open_level(ConfigLevel::Local)
    }

    fn gitmodules_config(&self) -> Result<Option<Config>, GitRepositoryError> {
        let path: PathBuf = self.workdir()?.join(".gitmodules");
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Config::open(&path)?))
    }
}

fn submodule_name(submodule: &Submodule<'_>) -> String {
    submodule
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| submodule.path().to_string_lossy().into_owned())
}

fn has_section(config: &Config, name: &str) -> bool {
    SUBMODULE_KEYS
        .iter()
        .any(|key| config.get_string(&format!("submodule.{}.{}", name, key)).is_ok())
}

fn move_section(config: &mut Config, from: &str, to: &str) -> Result<(), git2::Error> {
    for key in SUBMODULE_KEYS {
        let old_key = format!("submodule.{}.{}", from, key);
        match config.get_string(&old_key) {
            Ok(value) => {
                config.set_str(&format!("submodule.{}.{}", to, key), &value)?;
                config.remove(&old_key)?;
            }
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn remove_section(config: &mut Config, name: &str) -> Result<(), git2::Error> {
    for key in SUBMODULE_KEYS {
        match config.remove(&format!("submodule.{}.{}", name, key)) {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Names of the `[submodule "<name>"]` sections of a config file
fn section_names(config_file: &Path) -> Result<Vec<String>, std::io::Error> {
    if !config_file.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(config_file)?;
    let section = Regex::new(r#"(?m)^\s*\[submodule\s+"([^"]+)"\s*\]"#)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let mut names: Vec<String> = section
        .captures_iter(&content)
        .map(|captures| captures[1].to_string())
        .collect();
    names.dedup();
    Ok(names)
}
