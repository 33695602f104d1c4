//! libgit2 building blocks used by the library backend
pub mod history;
pub mod remote;
pub mod repository;
pub mod submodule;

pub use history::HistoryReader;
pub use remote::RemoteAuth;
pub use repository::{GitRepository, GitRepositoryError, ResetMode};
pub use submodule::SubmoduleManager;
