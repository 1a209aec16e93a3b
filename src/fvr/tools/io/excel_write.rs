use std::collections::HashSet;
use std::path::Path;

use rust_xlsxwriter::{Format, Table, Workbook, Worksheet};
use tracing::{info, instrument};

use crate::fvr::tools::check::CheckReport;
use crate::fvr::tools::error::Result;
use crate::fvr::tools::model::datetime_to_excel_serial;
use crate::fvr::tools::series::AlignedSeries;

/// Sheet holding the discrepancy rows.
pub const DISCREPANCY_SHEET: &str = "Discrepancy";
/// Sheet listing the pairs that could not be computed.
pub const FAILURES_SHEET: &str = "Failures";

const MAX_SHEET_NAME: usize = 31;

/// Writes the report to an `.xlsx` workbook: the discrepancy table, the
/// failed computations when there are any, and one sheet per non-empty
/// series.
#[instrument(level = "info", skip_all, fields(output = %path.display()))]
pub fn write_report(path: &Path, report: &CheckReport) -> Result<()> {
    let mut workbook = Workbook::new();
    let mut sheet_names = SheetNames::new([DISCREPANCY_SHEET, FAILURES_SHEET]);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(DISCREPANCY_SHEET)?;
    write_header(worksheet, &["Metric", "Compared Sheet", "Discrepancy (%)"])?;
    for (row_idx, row) in report.discrepancies.rows.iter().enumerate() {
        let row_idx = (row_idx + 1) as u32;
        worksheet.write_string(row_idx, 0, &row.metric)?;
        worksheet.write_string(row_idx, 1, &row.compared_sheet)?;
        worksheet.write_number(row_idx, 2, row.discrepancy_percent)?;
    }
    add_table(worksheet, 3, report.discrepancies.rows.len())?;

    let failures: Vec<(&str, &str, String)> = report
        .discrepancies
        .failures
        .iter()
        .map(|failure| {
            (
                failure.metric.as_str(),
                failure.compared_sheet.as_str(),
                failure.error.to_string(),
            )
        })
        .chain(report.series_failures.iter().map(|failure| {
            (failure.value_column.as_str(), "", failure.error.to_string())
        }))
        .collect();

    if !failures.is_empty() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(FAILURES_SHEET)?;
        write_header(worksheet, &["Metric", "Compared Sheet", "Error"])?;
        for (row_idx, (metric, sheet, error)) in failures.iter().enumerate() {
            let row_idx = (row_idx + 1) as u32;
            worksheet.write_string(row_idx, 0, *metric)?;
            worksheet.write_string(row_idx, 1, *sheet)?;
            worksheet.write_string(row_idx, 2, error)?;
        }
        add_table(worksheet, 3, failures.len())?;
    }

    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    for series in report.series.iter().filter(|series| !series.is_empty()) {
        let sheet_name = sheet_names.unique(&series.value_column);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;
        write_series(worksheet, series, &date_format)?;
    }

    workbook.save(path)?;
    info!(
        rows = report.discrepancies.rows.len(),
        series = report.series.len(),
        "report workbook written"
    );
    Ok(())
}

fn write_series(worksheet: &mut Worksheet, series: &AlignedSeries, date_format: &Format) -> Result<()> {
    worksheet.write_string(0, 0, &series.date_column)?;
    for (col_idx, category) in series.categories.iter().enumerate() {
        worksheet.write_string(0, (col_idx + 1) as u16, category)?;
    }

    for (row_idx, row) in series.rows.iter().enumerate() {
        let row_idx = (row_idx + 1) as u32;
        worksheet.write_number_with_format(
            row_idx,
            0,
            datetime_to_excel_serial(&row.date),
            date_format,
        )?;
        for (col_idx, value) in row.values.iter().enumerate() {
            if let Some(value) = value {
                worksheet.write_number(row_idx, (col_idx + 1) as u16, *value)?;
            }
        }
    }

    add_table(worksheet, series.categories.len() + 1, series.rows.len())
}

fn write_header(worksheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    for (col_idx, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, *header)?;
    }
    Ok(())
}

fn add_table(worksheet: &mut Worksheet, columns: usize, rows: usize) -> Result<()> {
    if rows == 0 || columns == 0 {
        return Ok(());
    }
    let mut table = Table::new();
    table.set_autofilter(true);
    worksheet.add_table(0, 0, rows as u32, (columns as u16) - 1, &table)?;
    Ok(())
}

/// Sheet names taken so far. Excel compares sheet names without regard to
/// case, so the set holds lowercased names.
#[derive(Debug)]
struct SheetNames {
    taken: HashSet<String>,
}

impl SheetNames {
    fn new<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names = Self {
            taken: HashSet::new(),
        };
        // Excel keeps "History" for its change tracking.
        for name in reserved.into_iter().chain(["History"]) {
            names.take(name);
        }
        names
    }

    /// Records `name`; false when a sheet already uses it in any case.
    fn take(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_lowercase())
    }

    /// A legal sheet name derived from `label` that no earlier sheet uses.
    /// Clashes get a numeric suffix, shortening the label to fit.
    fn unique(&mut self, label: &str) -> String {
        let base = legal_sheet_name(label);
        let mut candidate = base.clone();
        let mut attempt = 0;
        while !self.take(&candidate) {
            attempt += 1;
            let suffix = format!("_{attempt}");
            candidate = base
                .chars()
                .take(MAX_SHEET_NAME - suffix.chars().count())
                .chain(suffix.chars())
                .collect();
        }
        candidate
    }
}

const FORBIDDEN_IN_SHEET_NAME: [char; 9] = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];

fn legal_sheet_name(label: &str) -> String {
    let replaced: String = label
        .chars()
        .map(|ch| match ch {
            ch if FORBIDDEN_IN_SHEET_NAME.contains(&ch) || ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    match replaced.trim() {
        "" => "Series".to_string(),
        trimmed => trimmed.chars().take(MAX_SHEET_NAME).collect(),
    }
}
