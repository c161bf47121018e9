//! Candidate listing for a task type.

use std::path::Path;

use anyhow::Context;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use switchboard_core::{ProviderRegistry, QuotaTracker};
use switchboard_infra::config::load_config;
use switchboard_types::provider::{Provider, TaskType};

#[derive(Debug, Serialize)]
struct CandidateRow {
    rank: usize,
    id: String,
    tier: u32,
    affinity: bool,
    effective_rpm: u64,
    effective_tpm: u64,
}

fn rows(candidates: &[Provider], task_type: TaskType) -> Vec<CandidateRow> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, p)| CandidateRow {
            rank: i + 1,
            id: p.id.clone(),
            tier: p.tier,
            affinity: p.has_affinity(task_type),
            effective_rpm: p.effective_rpm(),
            effective_tpm: p.effective_tpm(),
        })
        .collect()
}

/// Print the order a fresh router would try providers for `task_type`.
pub async fn list(path: &Path, task_type: TaskType, json: bool) -> anyhow::Result<()> {
    let config = load_config(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    let registry = ProviderRegistry::new(config.providers, QuotaTracker::new())
        .context("invalid provider configuration")?;

    let candidates = registry.get_candidates(task_type);
    let rows = rows(&candidates, task_type);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!();
        println!("  {} No routable providers for {task_type}.", style("!").yellow());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Provider").fg(Color::Cyan),
            Cell::new("Tier").fg(Color::Cyan),
            Cell::new("Affinity").fg(Color::Cyan),
            Cell::new("RPM").fg(Color::Cyan),
            Cell::new("TPM").fg(Color::Cyan),
        ]);

    for row in &rows {
        let affinity = if row.affinity {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(row.rank),
            Cell::new(&row.id),
            Cell::new(row.tier),
            affinity,
            Cell::new(row.effective_rpm),
            Cell::new(row.effective_tpm),
        ]);
    }

    println!();
    println!("  Candidates for {}", style(task_type).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}
