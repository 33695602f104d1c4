use anyhow::{Context, Result};

use crate::common::output::OutputSinks;
use crate::domain::entities::repository_config::RepositoryConfig;
use crate::infrastructure::scm::scm_factory::ScmFactory;
use crate::infrastructure::scm::scm_interface::GitOperations;
use crate::presentation::cli::{Cli, ResolvedSettings};

/// Handler for `check-connection`
pub fn check_connection(settings: &ResolvedSettings) -> Result<()> {
    let backend = settings.backend();
    backend
        .check_connection()
        .with_context(|| format!("Connection check failed for {}", settings.config.redacted_url()))?;

    println!("Connection to {} OK", settings.config.redacted_url());
    Ok(())
}

/// Handler for `version`; works without a repository URL
pub fn print_version(cli: &Cli) -> Result<()> {
    let kind = match &cli.config {
        Some(_) => cli.resolve()?.backend,
        None => cli.backend.unwrap_or_default(),
    };
    let backend = ScmFactory::create(
        kind,
        RepositoryConfig::new("."),
        ".",
        OutputSinks::tracing(),
    );
    let version = backend.version().context("Could not determine the engine version")?;

    println!("{} ({})", version, kind);
    Ok(())
}
