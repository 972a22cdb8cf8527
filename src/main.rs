use std::{fs, process::ExitCode};

use file_ingest::{
    adapters::dto::{
        upload_tree_dto::upload_tree_from_json,
        value_dto::{property_value_from_json, stored_value_to_json},
    },
    application::ingest::FileProperty,
    domain::{
        config::{
            policy::{PlatformLimits, ValidationPolicy},
            storage::StorageConfig,
        },
        models::attribute::AttributeConfig,
    },
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

fn read_json(path: &str) -> Result<Value, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    serde_json::from_str(&raw).map_err(|e| format!("Failed to parse {}: {}", path, e))
}

fn list_from_env(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn attribute_from_env() -> AttributeConfig {
    let ident = std::env::var("ATTRIBUTE_IDENT").unwrap_or_else(|_| "file".to_string());
    let label = std::env::var("ATTRIBUTE_LABEL").unwrap_or_else(|_| ident.clone());
    let multiple = std::env::var("ATTRIBUTE_MULTIPLE")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let attribute = AttributeConfig::new(ident, label).multiple(multiple);
    let locales = list_from_env("ATTRIBUTE_LOCALES");
    if locales.is_empty() {
        attribute
    } else {
        attribute.localized(locales)
    }
}

fn policy_from_env() -> Result<ValidationPolicy, String> {
    let policy = ValidationPolicy::new().with_accepted_mimetypes(list_from_env("ACCEPTED_MIMETYPES"));
    match std::env::var("MAX_FILESIZE") {
        Ok(size) => policy
            .with_max_filesize_str(&size)
            .map_err(|e| format!("MAX_FILESIZE is invalid: {}", e)),
        Err(_) => Ok(policy),
    }
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let uploads_path = args
        .next()
        .ok_or_else(|| "Usage: file-ingest <uploads.json> [value.json]".to_string())?;
    let value_path = args.next();

    let config = StorageConfig::from_env()?;
    let attribute = attribute_from_env();
    let policy = policy_from_env()?;

    tracing::info!(
        "Ingesting {} into {} (upload path {:?})",
        attribute.ident,
        config.base_root().display(),
        config.upload_path
    );

    let uploads = upload_tree_from_json(&read_json(&uploads_path)?).map_err(|e| e.to_string())?;
    let value = match value_path {
        Some(path) => property_value_from_json(&read_json(&path)?, &attribute)
            .map_err(|e| e.to_string())?,
        None => Default::default(),
    };

    let mut property = FileProperty::new(attribute, config, policy).with_limits(PlatformLimits::from_env());
    let stored = property.save(value, &uploads).map_err(|e| e.to_string())?;

    for failure in property.validator().failures() {
        tracing::warn!("Validation failed ({}): {}", failure.ident, failure.message);
    }

    tracing::info!("Stored {} path(s)", stored.paths().len());
    let json = stored_value_to_json(&stored).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
