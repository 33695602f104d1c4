/// Application layer: backend-agnostic workflows over [`GitOperations`](crate::infrastructure::scm::GitOperations)
pub mod use_cases;
