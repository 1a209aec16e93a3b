use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tracing::instrument;

use crate::fvr::tools::check::CheckReport;
use crate::fvr::tools::error::Result;

/// Converts the report into the JSON document written by [`write_report`].
pub fn report_to_json(report: &CheckReport) -> Result<Value> {
    let failures: Vec<Value> = report
        .discrepancies
        .failures
        .iter()
        .map(|failure| {
            json!({
                "metric": failure.metric,
                "compared_sheet": failure.compared_sheet,
                "error": failure.error.to_string(),
            })
        })
        .collect();

    let series_failures: Vec<Value> = report
        .series_failures
        .iter()
        .map(|failure| {
            json!({
                "value_column": failure.value_column,
                "error": failure.error.to_string(),
            })
        })
        .collect();

    Ok(json!({
        "baseline": report.baseline,
        "selected_sheets": report.selected,
        "discrepancies": serde_json::to_value(&report.discrepancies.rows)?,
        "failures": failures,
        "series": serde_json::to_value(&report.series)?,
        "series_failures": series_failures,
    }))
}

/// Writes the report as pretty-printed JSON.
#[instrument(level = "info", skip_all, fields(output = %path.display()))]
pub fn write_report(path: &Path, report: &CheckReport) -> Result<()> {
    let json = report_to_json(report)?;
    let json_string = serde_json::to_string_pretty(&json)?;
    fs::write(path, json_string)?;
    Ok(())
}
