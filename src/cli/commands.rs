use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::actuator::bridge::BridgeActuator;
use crate::channel::server::{Services, serve};
use crate::cli::config::{AppConfig, fill_settings};
use crate::form::form_model::FormSnapshot;
use crate::mapping::llm_backend::LlmMapper;
use crate::mapping::mapper::{MappingBackend, MockMapper, analyze_snapshot};
use crate::profile::profile_model::UserProfile;

// ============================================================================
// serve subcommand
// ============================================================================

pub async fn cmd_serve(
    config: &AppConfig,
    bind: Option<&str>,
    driver_endpoint: Option<&str>,
    mapper_name: &str,
    profile_path: Option<&str>,
) -> anyhow::Result<()> {
    let profile_path = profile_path.unwrap_or(&config.server.profile_path);
    let profile = UserProfile::load(std::path::Path::new(profile_path))
        .with_context(|| format!("loading profile from {}", profile_path))?;
    info!(profile = %profile.full_name(), "profile loaded");

    let driver = driver_endpoint.unwrap_or(&config.server.driver_endpoint);
    let actuator = Arc::new(BridgeActuator::new(
        driver,
        config.fill.combobox_open_timeout_ms,
    ));
    let mapper = build_mapper(mapper_name, config, &profile)?;

    let services = Arc::new(Services {
        actuator,
        mapper,
        profile: Arc::new(profile),
        fill_settings: fill_settings(&config.fill),
    });

    let bind = bind.unwrap_or(&config.server.bind);
    serve(bind, services).await
}

// ============================================================================
// analyze subcommand
// ============================================================================

/// Offline analysis of a captured snapshot file: load, validate, map, print.
pub async fn cmd_analyze(
    config: &AppConfig,
    snapshot_path: &str,
    mapper_name: &str,
    profile_path: Option<&str>,
) -> anyhow::Result<()> {
    let profile_path = profile_path.unwrap_or(&config.server.profile_path);
    let profile = UserProfile::load(std::path::Path::new(profile_path))
        .with_context(|| format!("loading profile from {}", profile_path))?;

    let content = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("reading snapshot {}", snapshot_path))?;
    let snapshot: FormSnapshot =
        serde_json::from_str(&content).with_context(|| "parsing snapshot JSON")?;
    snapshot.validate()?;

    let mapper = build_mapper(mapper_name, config, &profile)?;
    let mapping = analyze_snapshot(mapper.as_ref(), &snapshot, &profile).await?;

    println!(
        "{} fields, {} mapped, {} sections",
        mapping.fields.len(),
        mapping.fields.iter().filter(|f| f.is_mapped()).count(),
        mapping.sections.len()
    );
    for field in &mapping.fields {
        if field.is_mapped() {
            println!(
                "  {} ({}) = {:?}  [{} @ {:.2}]",
                field.label, field.field_type, field.mapped_value,
                field.source_attribute, field.confidence
            );
        }
    }
    if !mapping.unmapped_labels.is_empty() {
        println!("Unmapped: {}", mapping.unmapped_labels.join(", "));
    }
    for section in &mapping.sections {
        println!(
            "  section '{}': {} existing entries, profile key {:?}",
            section.name,
            section.existing_entry_count(),
            section.resolved_profile_key
        );
    }
    Ok(())
}

fn build_mapper(
    name: &str,
    config: &AppConfig,
    profile: &UserProfile,
) -> anyhow::Result<Arc<dyn MappingBackend>> {
    match name {
        "mock" => Ok(Arc::new(MockMapper {
            profile: profile.clone(),
        })),
        "llm" => Ok(Arc::new(LlmMapper::new(
            &config.llm.endpoint,
            &config.llm.model,
        ))),
        other => anyhow::bail!("unknown mapper '{}', expected mock or llm", other),
    }
}
