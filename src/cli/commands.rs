//! Command implementations

use super::{GapsArgs, MappingsArgs, OutputFormat, ResolveArgs, RunArgs};
use crate::config::EngineConfig;
use crate::drift::HttpProber;
use crate::model::{Gap, GapSeverity, GapStatus, Mapping};
use crate::pipeline::{
    CancelToken, EngineError, Orchestrator, ProjectInputs, RunMode, RunSummary,
};
use crate::storage::Database;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Run the pipeline over a project inputs file
pub async fn run(db_path: &Path, config_path: &Path, args: &RunArgs, format: OutputFormat) -> Result<()> {
    let mut config = EngineConfig::load_or_default(config_path)?;
    if args.probe_links {
        config.link.probe_external = true;
    }

    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read inputs file: {}", args.input))?;
    let inputs: ProjectInputs = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse inputs file: {}", args.input))?;

    let mut db = Database::open(db_path)?;
    let previous = db.load_snapshot(&inputs.project_id)?;

    let mode = if args.delta {
        RunMode::Delta {
            watermark: args.watermark,
        }
    } else {
        RunMode::Full
    };

    let mut orchestrator = Orchestrator::new(config.clone());
    if config.link.probe_external {
        let prober = HttpProber::new(Duration::from_secs(config.link.timeout_secs))?;
        orchestrator = orchestrator.with_prober(Arc::new(prober));
    }

    let output = match orchestrator
        .run(&inputs, &previous, mode, Utc::now(), &CancelToken::new())
        .await
    {
        Ok(output) => output,
        Err(EngineError::NoInput(project)) => {
            // An incomplete scan must not look like a clean project
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "project_id": project,
                        "status": "no_input",
                        "error": "project has no entities and no documentation pages",
                    })
                ),
                OutputFormat::Text => {
                    println!("✗ No input for project '{}': nothing was scanned", project);
                }
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if args.dry_run {
        println!("(dry run: results not persisted)");
    } else {
        db.commit_run(&output)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output.summary)?),
        OutputFormat::Text => print_summary_text(&output.summary),
    }

    Ok(())
}

/// List gaps for a project
pub fn gaps(db_path: &Path, args: &GapsArgs, format: OutputFormat) -> Result<()> {
    let db = Database::open(db_path)?;
    let mut gaps = db.gaps_for_project(&args.project)?;

    if !args.all {
        gaps.retain(|g| matches!(g.status, GapStatus::Open | GapStatus::Investigating));
    }
    if let Some(ref severity) = args.severity {
        let severity = severity.to_lowercase();
        gaps.retain(|g| g.severity.to_string() == severity);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&gaps)?),
        OutputFormat::Text => print_gaps_text(&gaps),
    }

    Ok(())
}

/// List mappings for a project
pub fn mappings(db_path: &Path, args: &MappingsArgs, format: OutputFormat) -> Result<()> {
    let db = Database::open(db_path)?;
    let mut mappings = db.mappings_for_project(&args.project)?;

    if let Some(ref relation) = args.relation {
        let relation = relation.to_lowercase();
        mappings.retain(|m| m.relation.to_string() == relation);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&mappings)?),
        OutputFormat::Text => print_mappings_text(&mappings),
    }

    Ok(())
}

/// Record a human decision on a gap
pub fn resolve(db_path: &Path, args: &ResolveArgs) -> Result<()> {
    let db = Database::open(db_path)?;

    let status = if args.wont_fix {
        GapStatus::WontFix
    } else {
        GapStatus::Resolved
    };

    let updated = db.set_gap_status(&args.gap_id, status, args.reason.as_deref())?;
    if !updated {
        anyhow::bail!("Gap not found: {}", args.gap_id);
    }

    println!("✓ Gap {} marked {}", args.gap_id, status);
    if let Some(ref reason) = args.reason {
        println!("  Reason: {}", reason);
    }

    Ok(())
}

/// Show or reset engine configuration
pub fn config(config_path: &Path, reset: bool) -> Result<()> {
    if reset {
        EngineConfig::default().save(config_path)?;
        println!("✓ Configuration reset to defaults: {:?}", config_path);
        return Ok(());
    }

    let config = EngineConfig::load_or_default(config_path)?;

    println!("DocAlign Configuration");
    println!("======================\n");
    println!("Staleness threshold: {} days", config.staleness_threshold_days);
    println!("Max mappings per entity: {}", config.max_mappings_per_entity);
    println!("Link probing: {}", config.link.probe_external);
    println!("Link concurrency: {}", config.link.concurrency);
    println!("Link timeout: {}s", config.link.timeout_secs);
    println!("Priority half-life: {} days", config.priority.half_life_days);

    Ok(())
}

/// Print a run summary in text format
pub fn print_summary_text(summary: &RunSummary) {
    println!("\n✓ Run complete ({} mode)", summary.mode);
    println!("  Project: {}", summary.project_id);
    println!("  Mappings: {}", summary.mapping_count);

    if summary.gaps_by_kind.is_empty() {
        println!("  Open gaps: none");
    } else {
        println!("  Open gaps:");
        for (kind, count) in &summary.gaps_by_kind {
            println!("    {}: {}", kind, count);
        }
    }

    if !summary.errors.is_empty() {
        println!("  Errors ({} recovered):", summary.errors.len());
        for error in &summary.errors {
            println!("    [{}] {}: {}", error.stage, error.subject, error.message);
        }
    }
}

/// Print gaps in text format
pub fn print_gaps_text(gaps: &[Gap]) {
    if gaps.is_empty() {
        println!("No gaps.");
        return;
    }

    for gap in gaps {
        let severity_icon = match gap.severity {
            GapSeverity::Critical => "🔴",
            GapSeverity::High => "🟠",
            GapSeverity::Medium => "🟡",
            GapSeverity::Low => "🟢",
        };

        println!(
            "{} [{}] {} (priority {:.2}, {})",
            severity_icon, gap.severity, gap.kind, gap.priority, gap.status
        );
        println!("   ID: {}", gap.id);
        if let Some(ref entity_id) = gap.entity_id {
            println!("   Entity: {}", entity_id);
        }
        if let Some(ref doc_id) = gap.doc_id {
            println!("   Doc: {}", doc_id);
        }
        println!("   Reason: {}", gap.reason.lines().next().unwrap_or(""));
        println!();
    }
}

/// Print mappings in text format
pub fn print_mappings_text(mappings: &[Mapping]) {
    if mappings.is_empty() {
        println!("No mappings.");
        return;
    }

    for mapping in mappings {
        let anchor = if mapping.anchor.is_empty() {
            "(whole page)"
        } else {
            &mapping.anchor
        };
        println!(
            "{} -> {}#{} [{}] score {:.2}",
            mapping.entity_id, mapping.doc_id, anchor, mapping.relation, mapping.score
        );
    }
}
