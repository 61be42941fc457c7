//! Plain-text analysis reports.
//!
//! A report combines dataset metadata with the computed summary statistics
//! into a fixed-width document suitable for download or printing.

use time::OffsetDateTime;

use crate::dataset_store::DatasetMeta;
use crate::models::SummaryStatistics;

const RULE_HEAVY: &str = "========================================================";
const RULE_LIGHT: &str = "--------------------------------------------------------";

/// Render a report for one dataset.
pub fn render(meta: &DatasetMeta, summary: &SummaryStatistics) -> String {
    let mut out = String::new();
    out.push_str(RULE_HEAVY);
    out.push('\n');
    out.push_str(&format!("{:^56}\n", "Chemical Equipment Analysis Report"));
    out.push_str(RULE_HEAVY);
    out.push_str("\n\n");

    out.push_str(&format!("Dataset:     {} ({})\n", meta.filename, meta.id));
    out.push_str(&format!(
        "Uploaded:    {} by {}\n",
        meta.uploaded_at.date(),
        meta.owner_username
    ));
    out.push_str(&format!("Generated:   {}\n\n", OffsetDateTime::now_utc().date()));

    section(&mut out, "Summary");
    out.push_str(&format!("{:<21}{}\n", "Total equipment:", summary.total_equipment));
    out.push_str(&format!("{:<21}{:.2}\n", "Average flowrate:", summary.average_flowrate));
    out.push_str(&format!("{:<21}{:.2}\n", "Average pressure:", summary.average_pressure));
    out.push_str(&format!(
        "{:<21}{:.2}\n\n",
        "Average temperature:", summary.average_temperature
    ));

    section(&mut out, "Equipment type distribution");
    let mut rows: Vec<(&str, i64)> = summary
        .equipment_type_distribution
        .iter()
        .map(|(equipment_type, count)| (equipment_type.as_str(), *count))
        .collect();
    // Largest groups first, ties broken alphabetically.
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let width = rows
        .iter()
        .map(|(equipment_type, _)| equipment_type.len())
        .max()
        .unwrap_or(0)
        .max("Type".len());
    out.push_str(&format!("{:<width$}  {:>7}  {:>7}\n", "Type", "Count", "Share"));
    for (equipment_type, count) in rows {
        let share = 100.0 * count as f64 / summary.total_equipment as f64;
        out.push_str(&format!(
            "{:<width$}  {:>7}  {:>6.1}%\n",
            equipment_type, count, share
        ));
    }

    out.push_str(&format!("\nGenerated by equistat {}\n", env!("CARGO_PKG_VERSION")));
    out
}

fn section(out: &mut String, title: &str) {
    out.push_str(RULE_LIGHT);
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(RULE_LIGHT);
    out.push('\n');
}
