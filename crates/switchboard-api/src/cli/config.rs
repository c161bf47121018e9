//! Config commands: check and path.

use std::path::Path;

use anyhow::Context;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use switchboard_infra::config::load_config;
use switchboard_types::config::SwitchboardConfig;

/// Load, validate and summarize the config file.
pub async fn check(path: &Path, json: bool, quiet: bool) -> anyhow::Result<()> {
    let config = load_config(path)
        .await
        .with_context(|| format!("config check failed for {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Config OK:").green().bold(),
        style(path.display()).dim()
    );
    print_settings(&config);
    println!();
    println!("{}", providers_table(&config));
    println!();
    Ok(())
}

/// Print the config path that would be loaded.
pub fn path(path: &Path, json: bool) -> anyhow::Result<()> {
    if json {
        let exists = path.exists();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "path": path.display().to_string(),
                "exists": exists,
            }))?
        );
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn print_settings(config: &SwitchboardConfig) {
    let router = &config.router;
    println!();
    println!("  Strategy:      {}", style(router.strategy).cyan());
    println!("  Max retries:   {}", router.max_retries_per_provider);
    println!(
        "  Backoff:       {}ms .. {}ms{}",
        router.backoff_base_ms,
        router.backoff_max_ms,
        if router.jitter { " (jitter)" } else { "" }
    );
    println!("  Cool-down:     {}s", router.cool_down_secs);
    println!("  Deadline:      {}ms", router.default_deadline_ms);
}

fn providers_table(config: &SwitchboardConfig) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Provider").fg(Color::Cyan),
            Cell::new("Tier").fg(Color::Cyan),
            Cell::new("RPM (eff)").fg(Color::Cyan),
            Cell::new("TPM (eff)").fg(Color::Cyan),
            Cell::new("Model").fg(Color::Cyan),
            Cell::new("Affinities").fg(Color::Cyan),
        ]);

    for provider in &config.providers {
        let affinities = if provider.task_affinities.is_empty() {
            "-".to_string()
        } else {
            provider
                .task_affinities
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        table.add_row(vec![
            Cell::new(&provider.id),
            Cell::new(provider.tier),
            Cell::new(format!("{} ({})", provider.rpm_limit, provider.effective_rpm())),
            Cell::new(format!("{} ({})", provider.tpm_limit, provider.effective_tpm())),
            Cell::new(&provider.model),
            Cell::new(affinities),
        ]);
    }

    table
}
