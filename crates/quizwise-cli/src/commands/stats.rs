//! The `quizwise stats` command.

use std::path::Path;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use quizwise_core::config::load_config_from;
use quizwise_core::selector::classify;
use quizwise_core::statistics::StatisticsStore;

pub fn execute(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = load_config_from(config_path)?;
    let store = StatisticsStore::open_json(&config.stats_path);

    let summary = store.tier_summary()?;
    println!(
        "Recorded questions: {} difficult, {} normal, {} mastered",
        summary.difficult, summary.normal, summary.mastered
    );

    let rows = store.weakest(limit)?;
    if rows.is_empty() {
        println!("No answers recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Question", "Attempts", "Correct", "Success", "Recent", "Tier"]);

    for (id, record) in &rows {
        let recent: String = record
            .recent_outcomes
            .iter()
            .map(|&ok| if ok { '✓' } else { '✗' })
            .collect();
        table.add_row(vec![
            id.clone(),
            record.total_attempts.to_string(),
            record.correct_attempts.to_string(),
            format!("{:.0}%", record.success_rate * 100.0),
            recent,
            classify(Some(record)).to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}
