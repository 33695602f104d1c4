pub mod backend_kind;
pub mod git_url;

pub use backend_kind::{BackendKind, BackendKindError};
pub use git_url::{GitUrl, GitUrlError};
