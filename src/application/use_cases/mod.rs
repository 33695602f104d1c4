pub mod poll_repository;

pub use poll_repository::{GitPoller, PollOutcome, PollResult, WorkingCopyState};
