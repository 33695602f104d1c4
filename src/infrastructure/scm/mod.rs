//! Repository backends
//!
//! Both backends implement [`GitOperations`]: [`GitCmdScm`] drives the `git`
//! executable, [`GitLibScm`] drives libgit2 in-process.
pub mod git_cmd_scm;
pub mod git_lib_scm;
pub mod log_parser;
pub mod scm_factory;
pub mod scm_interface;

pub use git_cmd_scm::GitCmdScm;
pub use git_lib_scm::GitLibScm;
pub use scm_factory::{GitBackend, ScmFactory};
pub use scm_interface::{BackendCapabilities, GitOperations, COMMIT_AUTHOR, COMMIT_EMAIL};
