//! Download summary: the ledger grouped by source

use crate::ledger::{Ledger, LedgerEntry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const DESCRIPTION_WIDTH: usize = 60;

/// Renders the per-source download summary of `ledger`
///
/// Sources are listed alphabetically by name; documents keep ledger order.
pub fn render_download_summary(
    ledger: &Ledger,
    config_hash: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut by_source: BTreeMap<&str, Vec<&LedgerEntry>> = BTreeMap::new();
    for entry in ledger.entries() {
        by_source
            .entry(entry.display_source())
            .or_default()
            .push(entry);
    }

    let mut out = String::new();
    out.push_str("DOWNLOAD SUMMARY\n");
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format!(
        "Generated: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Config hash: {}\n", config_hash));
    out.push_str(&format!("Total documents: {}\n", ledger.len()));

    for (source, entries) in by_source {
        out.push_str(&format!("\n{} ({} documents)\n", source, entries.len()));
        out.push_str(&"-".repeat(40));
        out.push('\n');

        for entry in entries {
            let description: String = entry.description.chars().take(DESCRIPTION_WIDTH).collect();
            out.push_str(&format!(
                "Entry #{}: {}\n  {} (retrieved {})\n",
                entry.entry_number,
                description,
                entry.output_filename,
                entry.retrieved_at.format("%Y-%m-%d %H:%M:%S")
            ));
        }
    }

    out
}
