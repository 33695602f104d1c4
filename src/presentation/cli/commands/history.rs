use anyhow::{Context, Result};

use crate::infrastructure::scm::scm_interface::GitOperations;
use crate::presentation::cli::commands::print_json;
use crate::presentation::cli::ResolvedSettings;

/// Handler for `latest`: reads the existing working copy, no fetch
pub fn print_latest(settings: &ResolvedSettings, paths: &[String]) -> Result<()> {
    let paths = if paths.is_empty() { &settings.paths[..] } else { paths };
    let latest = settings
        .backend()
        .latest_revision(paths)
        .context("Failed to read the latest revision")?;
    print_json(&latest)
}

/// Handler for `revisions`
pub fn print_revisions(settings: &ResolvedSettings, since: Option<&str>) -> Result<()> {
    let backend = settings.backend();
    let revisions = match since {
        Some(previous) => backend
            .revisions_since(previous, &settings.paths)
            .with_context(|| format!("Failed to read revisions since {}", previous))?,
        None => backend.all_revisions().context("Failed to read the history")?,
    };
    print_json(&revisions)
}

/// Handler for `show`; prints `null` for an unknown revision
pub fn print_revision(settings: &ResolvedSettings, revision: &str) -> Result<()> {
    let details = settings
        .backend()
        .details_for_revision(revision)
        .with_context(|| format!("Failed to read revision {}", revision))?;
    print_json(&details)
}

/// Handler for `branches`
pub fn print_branches(settings: &ResolvedSettings, pattern: &str) -> Result<()> {
    let branches = settings
        .backend()
        .branch_to_revision_map(pattern)
        .context("Failed to list branches")?;
    print_json(&branches)
}
