//! Final fetch summary table.

use super::theme::format_size;
use crate::ops::fetch::FetchReport;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};

/// Render the outcome of a fetch, one row per release.
pub fn render(report: &FetchReport, dry_run: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Release", "Version", "Stemcell", "Source", "Status"]);

    for present in &report.present {
        table.add_row(vec![
            present.id.name.clone(),
            present.id.version.clone(),
            present
                .stemcell
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "local".to_string(),
            "present".to_string(),
        ]);
    }

    for planned in &report.planned {
        let id = planned.artifact.id();
        let status = match report.retrieved.iter().find(|r| &r.id == id) {
            Some(retrieved) => format!("downloaded ({})", format_size(retrieved.bytes)),
            None if dry_run => "would download".to_string(),
            None => "pending".to_string(),
        };
        table.add_row(vec![
            id.name.clone(),
            id.version.clone(),
            planned
                .artifact
                .stemcell()
                .map(ToString::to_string)
                .unwrap_or_default(),
            planned.source.clone(),
            status,
        ]);
    }

    for extra in &report.extras {
        table.add_row(vec![
            extra.id.name.clone(),
            extra.id.version.clone(),
            extra
                .stemcell
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "local".to_string(),
            if dry_run { "would remove" } else { "removed" }.to_string(),
        ]);
    }

    for damaged in &report.damaged {
        let file = damaged
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        table.add_row(vec![
            file,
            String::new(),
            String::new(),
            "local".to_string(),
            if dry_run {
                "damaged, would remove"
            } else {
                "damaged, removed"
            }
            .to_string(),
        ]);
    }

    table
}
