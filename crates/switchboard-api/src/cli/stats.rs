//! Usage statistics from the persisted log.

use anyhow::Context;
use chrono::Duration;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use switchboard_core::UsageStore;
use switchboard_infra::sqlite::pool::{DatabasePool, default_database_url};
use switchboard_infra::sqlite::usage::SqliteUsageStore;
use switchboard_types::usage::{TimeRange, UsageStats};

/// Parse a lookback such as `45s`, `30m`, `1h` or `2d`.
pub fn parse_since(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in '{input}' (use s, m, h or d)"))?;
    let (digits, unit) = input.split_at(split);
    let amount: i64 = digits
        .parse()
        .map_err(|_| format!("invalid amount in '{input}'"))?;
    if amount == 0 {
        return Err("lookback must be greater than zero".to_string());
    }

    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        other => return Err(format!("unknown unit '{other}' (use s, m, h or d)")),
    };
    duration.ok_or_else(|| format!("lookback '{input}' is too large"))
}

/// Aggregate the usage log over the last `since`.
pub async fn show(since: Duration, database: Option<String>, json: bool) -> anyhow::Result<()> {
    let url = database.unwrap_or_else(default_database_url);
    let pool = DatabasePool::new(&url)
        .await
        .with_context(|| format!("failed to open usage database {url}"))?;
    let store = SqliteUsageStore::new(pool);

    let stats = store
        .query(TimeRange::last(since))
        .await
        .context("failed to query usage")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    if stats.total_requests == 0 {
        println!("  {}", style("No usage recorded in this range.").dim());
        println!();
        return Ok(());
    }

    println!(
        "  {} requests, {} tokens",
        style(stats.total_requests).bold(),
        style(stats.total_tokens).bold()
    );
    println!();
    println!("{}", stats_table(&stats));
    println!();
    Ok(())
}

fn stats_table(stats: &UsageStats) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Provider").fg(Color::Cyan),
            Cell::new("Requests").fg(Color::Cyan),
            Cell::new("OK").fg(Color::Cyan),
            Cell::new("Failed").fg(Color::Cyan),
            Cell::new("Tokens").fg(Color::Cyan),
            Cell::new("p50").fg(Color::Cyan),
            Cell::new("p95").fg(Color::Cyan),
            Cell::new("p99").fg(Color::Cyan),
            Cell::new("Errors").fg(Color::Cyan),
        ]);

    for (id, usage) in &stats.providers {
        let failed = if usage.failures > 0 {
            Cell::new(usage.failures).fg(Color::Red)
        } else {
            Cell::new(usage.failures)
        };
        let errors = usage
            .error_kinds
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            Cell::new(id),
            Cell::new(usage.requests),
            Cell::new(usage.successes).fg(Color::Green),
            failed,
            Cell::new(usage.tokens_used),
            Cell::new(format!("{}ms", usage.latency_p50_ms)),
            Cell::new(format!("{}ms", usage.latency_p95_ms)),
            Cell::new(format!("{}ms", usage.latency_p99_ms)),
            Cell::new(if errors.is_empty() { "-".to_string() } else { errors }),
        ]);
    }

    table
}
