//! # gitpoller - Git repository poller
//!
//! `gitpoller` keeps a local working copy of a Git repository up to date and
//! reports the revisions that appeared since the last poll, for use by a
//! continuous-integration scheduler.
//!
//! ## Features
//!
//! - **Two backends**: the `git` executable or libgit2 in-process, behind one
//!   [`GitOperations`](infrastructure::scm::GitOperations) trait
//! - **Revision model**: commits with their file-level changes, rename aware
//! - **Incremental polling**: clone on first use, fetch and reset afterwards
//! - **Sub-modules**: init, sync, update, add and remove on both backends
//!
//! ## Architecture
//!
//! - [`domain`]: revisions, repository configuration, value objects
//! - [`application`]: the backend-agnostic poller
//! - [`infrastructure`]: backends, process execution, settings files
//! - [`presentation`]: the `gitpoller` CLI
//! - [`common`]: errors, results and output sinks
//!
//! ## Example
//!
//! ```rust,no_run
//! use gitpoller::application::use_cases::poll_repository::GitPoller;
//! use gitpoller::common::output::OutputSinks;
//! use gitpoller::domain::entities::repository_config::RepositoryConfig;
//! use gitpoller::domain::value_objects::backend_kind::BackendKind;
//! use gitpoller::infrastructure::scm::ScmFactory;
//!
//! # fn example() -> gitpoller::Result<()> {
//! let config = RepositoryConfig::new("https://github.com/gocd/gocd").with_branch("master");
//! let backend = ScmFactory::create(BackendKind::Library, config, "/tmp/gocd", OutputSinks::tracing());
//!
//! let poller = GitPoller::new(backend);
//! let result = poller.poll(None, &[])?;
//! for revision in &result.revisions {
//!     println!("{} {}", revision.revision(), revision.comment());
//! }
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::GitError;
pub use crate::common::result::GitResult as Result;
