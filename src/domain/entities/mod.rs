pub mod branch_map;
pub mod repository_config;
pub mod revision;

pub use branch_map::{build_branch_map, BranchRevisionMap};
pub use repository_config::RepositoryConfig;
pub use revision::{FileAction, ModifiedFile, Revision};
