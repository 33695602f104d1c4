//! Backend construction and working directory helpers

use gitpoller::common::output::{InMemoryConsumer, OutputSinks};
use gitpoller::domain::entities::repository_config::RepositoryConfig;
use gitpoller::domain::value_objects::backend_kind::BackendKind;
use gitpoller::infrastructure::scm::{GitBackend, ScmFactory};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const ALL_BACKENDS: [BackendKind; 2] = [BackendKind::CommandLine, BackendKind::Library];

/// A backend working in its own temporary directory, with captured output
pub struct BackendUnderTest {
    _temp_dir: TempDir,
    pub backend: GitBackend,
    pub working_dir: PathBuf,
    pub stdout: Arc<InMemoryConsumer>,
    pub stderr: Arc<InMemoryConsumer>,
}

impl BackendUnderTest {
    /// Backend of `kind` for `config`; the working directory does not exist yet
    pub fn new(kind: BackendKind, config: RepositoryConfig) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let working_dir = temp_dir.path().join("working-copy");
        let (sinks, stdout, stderr) = OutputSinks::in_memory();
        let backend = ScmFactory::create(kind, config, &working_dir, sinks);
        Self {
            _temp_dir: temp_dir,
            backend,
            working_dir,
            stdout,
            stderr,
        }
    }

    /// Backend for `url` on `master`, without submodule recursion
    pub fn for_url(kind: BackendKind, url: &str) -> Self {
        Self::new(
            kind,
            RepositoryConfig::new(url).with_recursive_submodule_update(false),
        )
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.working_dir.join(relative)
    }
}

/// Names of the entries directly under `dir`, sorted
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
