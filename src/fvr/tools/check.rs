use std::fmt;
use std::path::Path;

use tracing::{info, instrument, warn};

use crate::fvr::tools::discrepancy::{DiscrepancyReport, compute_discrepancies};
use crate::fvr::tools::error::{Result, ToolError};
use crate::fvr::tools::io::excel_read;
use crate::fvr::tools::model::{
    DEFAULT_METRICS, OCCUPANCY_DATE_COLUMN, SelectedSheets, SheetTable, SheetTables,
    format_datetime,
};
use crate::fvr::tools::series::{AlignedSeries, align_series};

/// What to compare and which column dates the metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    pub metrics: Vec<String>,
    pub date_column: String,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            metrics: DEFAULT_METRICS.iter().map(|metric| metric.to_string()).collect(),
            date_column: OCCUPANCY_DATE_COLUMN.to_string(),
        }
    }
}

/// A metric whose series could not be aligned.
#[derive(Debug)]
pub struct SeriesFailure {
    pub value_column: String,
    pub error: ToolError,
}

/// Everything the front end displays after a check.
#[derive(Debug)]
pub struct CheckReport {
    pub baseline: String,
    pub selected: Vec<String>,
    pub discrepancies: DiscrepancyReport,
    /// One series per metric that aligned, in metric order.
    pub series: Vec<AlignedSeries>,
    pub series_failures: Vec<SeriesFailure>,
}

/// Loads the selected sheets of `input` and compares them.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), sheets = selected.len())
)]
pub fn run_check(
    input: &Path,
    selected: &SelectedSheets,
    options: &CheckOptions,
) -> Result<CheckReport> {
    let tables = excel_read::read_sheets(input, selected)?;
    compare_tables(&tables, selected, options)
}

/// Runs the discrepancy calculator once and the series aligner once per
/// metric over tables that are already loaded.
#[instrument(level = "debug", skip_all, fields(metrics = options.metrics.len()))]
pub fn compare_tables(
    tables: &SheetTables,
    selected: &SelectedSheets,
    options: &CheckOptions,
) -> Result<CheckReport> {
    let discrepancies = compute_discrepancies(tables, selected, &options.metrics)?;
    info!(
        rows = discrepancies.rows.len(),
        failures = discrepancies.failures.len(),
        "discrepancy summary computed"
    );

    let mut series = Vec::with_capacity(options.metrics.len());
    let mut series_failures = Vec::new();
    for metric in &options.metrics {
        match align_series(tables, selected, &options.date_column, metric) {
            Ok(aligned) => {
                info!(
                    metric = %metric,
                    sheets = aligned.categories.len(),
                    dates = aligned.rows.len(),
                    "series aligned"
                );
                series.push(aligned);
            }
            Err(error) => {
                warn!(metric = %metric, %error, "series not aligned");
                series_failures.push(SeriesFailure {
                    value_column: metric.clone(),
                    error,
                });
            }
        }
    }

    Ok(CheckReport {
        baseline: selected.baseline().unwrap_or_default().to_string(),
        selected: selected.iter().map(str::to_string).collect(),
        discrepancies,
        series,
        series_failures,
    })
}

/// Loads a single sheet for display.
pub fn view_sheet(input: &Path, sheet: &str) -> Result<SheetTable> {
    let selected = SelectedSheets::new([sheet]);
    let mut tables = excel_read::read_sheets(input, &selected)?;
    tables
        .remove(sheet)
        .ok_or_else(|| ToolError::MissingSheet(sheet.to_string()))
}

/// Renders up to `limit` rows of a sheet as a text grid.
pub fn render_sheet(table: &SheetTable, limit: Option<usize>) -> String {
    let shown = limit.unwrap_or(table.rows.len()).min(table.rows.len());
    let rows = table.rows[..shown]
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    let mut out = render_grid(&table.columns, rows);
    if shown < table.rows.len() {
        out.push_str(&format!("... {} more rows\n", table.rows.len() - shown));
    }
    out
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Overall percentage discrepancy against '{}'",
            self.baseline
        )?;
        if self.discrepancies.rows.is_empty() {
            writeln!(f, "(no sheets compared)")?;
        } else {
            let headers = ["Metric", "Compared Sheet", "Discrepancy (%)"].map(String::from);
            let rows = self
                .discrepancies
                .rows
                .iter()
                .map(|row| {
                    vec![
                        row.metric.clone(),
                        row.compared_sheet.clone(),
                        format!("{:.2}", row.discrepancy_percent),
                    ]
                })
                .collect();
            write!(f, "{}", render_grid(&headers, rows))?;
        }
        for failure in &self.discrepancies.failures {
            writeln!(
                f,
                "! {} / {}: {}",
                failure.metric, failure.compared_sheet, failure.error
            )?;
        }

        for series in &self.series {
            writeln!(f)?;
            writeln!(f, "{} vs {}", series.value_column, series.date_column)?;
            if series.is_empty() {
                writeln!(f, "(no data)")?;
                continue;
            }
            let mut headers = vec![series.date_column.clone()];
            headers.extend(series.categories.iter().cloned());
            let rows = series
                .rows
                .iter()
                .map(|row| {
                    let mut cells = vec![format_datetime(&row.date)];
                    cells.extend(
                        row.values
                            .iter()
                            .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
                    );
                    cells
                })
                .collect();
            write!(f, "{}", render_grid(&headers, rows))?;
        }
        for failure in &self.series_failures {
            writeln!(f)?;
            writeln!(f, "! {}: {}", failure.value_column, failure.error)?;
        }
        Ok(())
    }
}

fn render_grid(headers: &[String], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(headers);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    out.push_str(&format!("{}\n", rule.join("-+-")));
    for row in &rows {
        out.push_str(&line(&row[..]));
    }
    out
}
