// src/commands/mirror.rs
//! Mirror and platform commands

use super::{check_problems, print_status};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tpexport::{
    CancellationToken, CliProgress, InstallableUnit, MirrorOperation, MirrorOptions,
    MirrorRequest, PlatformConfig, ProvisioningContext, RepositoryLocation,
};
use tracing::info;

/// Mirror units and artifacts from sources into a destination
pub fn cmd_mirror(
    sources: &[String],
    units: Option<&Path>,
    dest: &str,
    options: Option<&Path>,
    no_append: bool,
    validate: bool,
    verbose: bool,
) -> Result<()> {
    let mut mirror_options = match options {
        Some(path) => MirrorOptions::from_toml_file(path)?,
        None => MirrorOptions::default(),
    };
    if no_append {
        mirror_options.append = false;
    }
    if validate {
        mirror_options.validate = true;
    }

    let mut request = MirrorRequest::new(dest);
    for source in sources {
        let location = RepositoryLocation::parse(source)
            .with_context(|| format!("Invalid source repository: {source}"))?;
        request.sources.insert(location);
    }
    if let Some(path) = units {
        request.units = read_units(path)?;
    }

    info!(
        "Mirroring {} units from {} sources into {}",
        request.units.len(),
        request.sources.len(),
        dest
    );

    let context = ProvisioningContext::with_default_provider();
    let progress = CliProgress::new("Creating p2 repository", 0);
    let status = MirrorOperation::new(&context, mirror_options).mirror(
        &request,
        &progress,
        &CancellationToken::new(),
    )?;

    print_status(&status, verbose);
    let problems: Vec<String> = status.problems().into_iter().map(str::to_string).collect();
    check_problems(&problems)?;
    println!("Mirrored into {}", dest);
    Ok(())
}

fn read_units(path: &Path) -> Result<BTreeSet<InstallableUnit>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read units file {}", path.display()))?;
    let units: Vec<InstallableUnit> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid units file {}", path.display()))?;
    Ok(units.into_iter().collect())
}

/// Print the configuration of the running platform
pub fn cmd_platform() -> Result<()> {
    let config = PlatformConfig::current();
    println!("{}", config);
    Ok(())
}
