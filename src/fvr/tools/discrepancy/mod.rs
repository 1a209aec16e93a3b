//! Percentage discrepancy of each selected sheet against the baseline sheet.

use serde::Serialize;
use tracing::{debug, warn};

use crate::fvr::tools::error::{Result, ToolError};
use crate::fvr::tools::model::{CellValue, SelectedSheets, SheetTables};

/// Discrepancy of one compared sheet for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscrepancyRow {
    pub metric: String,
    pub compared_sheet: String,
    /// Signed percentage, rounded to two decimals.
    pub discrepancy_percent: f64,
}

/// A (metric, compared sheet) pair that could not be computed.
#[derive(Debug)]
pub struct DiscrepancyFailure {
    pub metric: String,
    pub compared_sheet: String,
    pub error: ToolError,
}

/// Outcome of a discrepancy run: computed rows and per-pair failures, both
/// grouped by metric in the requested order, then by selection order.
#[derive(Debug, Default)]
pub struct DiscrepancyReport {
    pub rows: Vec<DiscrepancyRow>,
    pub failures: Vec<DiscrepancyFailure>,
}

impl DiscrepancyReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compares every non-baseline sheet of `selected` against the baseline for
/// each metric.
///
/// Only an empty selection aborts the whole run. Missing sheets or columns
/// and zero baselines are recorded against the affected pairs while the
/// remaining pairs are still computed.
pub fn compute_discrepancies<M: AsRef<str>>(
    tables: &SheetTables,
    selected: &SelectedSheets,
    metrics: &[M],
) -> Result<DiscrepancyReport> {
    let baseline = selected.baseline().ok_or(ToolError::EmptySelection)?;

    let report = metrics
        .iter()
        .map(|metric| metric.as_ref())
        .fold(DiscrepancyReport::default(), |mut report, metric| {
            let base_total = baseline_total(tables, baseline, metric);

            for sheet in selected.compared() {
                let outcome = match &base_total {
                    Ok(base_total) => metric_total(tables, sheet, metric)
                        .map(|comp_total| percent_difference(*base_total, comp_total)),
                    Err(issue) => Err(issue.to_error(baseline, metric)),
                };

                match outcome {
                    Ok(discrepancy_percent) => report.rows.push(DiscrepancyRow {
                        metric: metric.to_string(),
                        compared_sheet: sheet.clone(),
                        discrepancy_percent,
                    }),
                    Err(error) => {
                        warn!(metric, sheet = %sheet, %error, "discrepancy not computed");
                        report.failures.push(DiscrepancyFailure {
                            metric: metric.to_string(),
                            compared_sheet: sheet.clone(),
                            error,
                        });
                    }
                }
            }
            report
        });

    debug!(
        rows = report.rows.len(),
        failures = report.failures.len(),
        "discrepancies computed"
    );
    Ok(report)
}

/// Left-to-right sum of a sheet's metric column.
///
/// Blank cells count as zero, as do cells that hold neither a number nor
/// numeric text.
pub fn metric_total(tables: &SheetTables, sheet: &str, metric: &str) -> Result<f64> {
    let table = tables
        .get(sheet)
        .ok_or_else(|| ToolError::MissingSheet(sheet.to_string()))?;
    let cells = table.column(metric).ok_or_else(|| ToolError::MissingColumn {
        sheet: sheet.to_string(),
        column: metric.to_string(),
    })?;

    Ok(sum_cells(cells, sheet, metric))
}

fn sum_cells<'a>(cells: impl Iterator<Item = &'a CellValue>, sheet: &str, metric: &str) -> f64 {
    cells.fold(0.0, |total, cell| match cell.as_number() {
        Some(value) => total + value,
        None => {
            if !matches!(cell, CellValue::Empty) {
                debug!(sheet, metric, %cell, "non-numeric cell counted as zero");
            }
            total
        }
    })
}

/// `((comparison - baseline) / baseline) * 100`, rounded to two decimals.
pub fn percent_difference(baseline: f64, comparison: f64) -> f64 {
    round_percent(((comparison - baseline) / baseline) * 100.0)
}

/// Rounds half away from zero at two decimals; never yields `-0.0`.
pub fn round_percent(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Why a metric has no usable baseline total. Every compared sheet of the
/// metric fails with the same error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaselineIssue {
    MissingSheet,
    MissingColumn,
    Zero,
}

impl BaselineIssue {
    fn to_error(self, baseline: &str, metric: &str) -> ToolError {
        match self {
            BaselineIssue::MissingSheet => ToolError::MissingSheet(baseline.to_string()),
            BaselineIssue::MissingColumn => ToolError::MissingColumn {
                sheet: baseline.to_string(),
                column: metric.to_string(),
            },
            BaselineIssue::Zero => ToolError::ZeroBaseline {
                metric: metric.to_string(),
                sheet: baseline.to_string(),
            },
        }
    }
}

fn baseline_total(
    tables: &SheetTables,
    baseline: &str,
    metric: &str,
) -> std::result::Result<f64, BaselineIssue> {
    let table = tables.get(baseline).ok_or(BaselineIssue::MissingSheet)?;
    let cells = table.column(metric).ok_or(BaselineIssue::MissingColumn)?;
    let total = sum_cells(cells, baseline, metric);
    if total == 0.0 { Err(BaselineIssue::Zero) } else { Ok(total) }
}
