/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - Repository backends (`git` executable and libgit2)
/// - libgit2 building blocks (history walk, remotes, sub-modules)
/// - Process execution with concurrent pipe draining
/// - Settings files
pub mod filesystem;
pub mod git;
pub mod process;
pub mod scm;

// Re-export commonly used types
pub use filesystem::{PollerSettings, SettingsError, SettingsStore};
pub use process::CommandExecutor;
pub use scm::{BackendCapabilities, GitBackend, GitCmdScm, GitLibScm, GitOperations, ScmFactory};
