use anyhow::{Context, Result};
use std::io::{self, Write};

use dbt::contexts::{OracleClient, OracleSettings};
use dbt::registries::{FilePropertiesRegistry, ModelSource, resolve_model};

use super::Config;

/// Resolves the model for this run and returns a client bound to it.
///
/// `--model` skips resolution and persists nothing. Otherwise the persisted
/// configuration is checked against the oracle's listing, the operator picks a
/// model when none is usable, and any change is saved unless this is a dry run.
pub async fn connect(config: &Config) -> Result<OracleClient> {
    let settings = OracleSettings::from_env();

    if let Some(model) = &config.model_override {
        println!("Using model: {} (command line)", model);
        return OracleClient::new(settings, model.clone());
    }

    let registry = FilePropertiesRegistry::new(Some(settings.properties_path.clone()));
    let properties = registry.load_or_default();

    if config.verbose {
        println!("Looking for models served at {}", settings.base_url);
    }
    let listing = OracleClient::list_models(&settings).await;

    let resolution = resolve_model(
        &properties,
        &listing,
        &settings.default_model,
        prompt_for_model,
    );

    for warning in &resolution.warnings {
        tracing::warn!("{}", warning);
    }

    if let Some(updated) = &resolution.persist {
        if config.dry_run {
            println!("⊚ Dry run: not updating {}", registry.path().display());
        } else if let Err(e) = registry.save(updated) {
            tracing::warn!("Could not update {}: {:#}", registry.path().display(), e);
        }
    }

    let source = match resolution.source {
        ModelSource::Configured => "configured",
        ModelSource::Selected => "selected",
        ModelSource::Default => "default",
    };
    println!("Using model: {} ({})", resolution.model, source);

    OracleClient::new(settings, resolution.model).context("Failed to create oracle client")
}

fn prompt_for_model(models: &[String]) -> Option<String> {
    println!("Available models:");
    for (i, name) in models.iter().enumerate() {
        println!("{}. {}", i + 1, name);
    }
    print!("Select the model number: ");
    io::stdout().flush().ok()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer).ok()?;
    Some(answer)
}
