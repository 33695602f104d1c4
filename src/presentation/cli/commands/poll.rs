use anyhow::{Context, Result};

use crate::application::use_cases::poll_repository::GitPoller;
use crate::presentation::cli::commands::print_json;
use crate::presentation::cli::ResolvedSettings;

/// Handler for the poll command
pub struct PollCommand {
    pub settings: ResolvedSettings,
    pub since: Option<String>,
    pub paths: Vec<String>,
}

impl PollCommand {
    pub fn new(settings: ResolvedSettings, since: Option<String>, paths: Vec<String>) -> Self {
        Self { settings, since, paths }
    }

    /// Paths given on the command line win over those of the settings file
    fn effective_paths(&self) -> &[String] {
        if self.paths.is_empty() {
            &self.settings.paths
        } else {
            &self.paths
        }
    }

    pub fn execute(&self) -> Result<()> {
        let poller = GitPoller::new(self.settings.backend());
        let result = poller
            .poll(self.since.as_deref(), self.effective_paths())
            .with_context(|| format!("Failed to poll {}", self.settings.config.redacted_url()))?;

        print_json(&result)
    }
}
