use std::collections::HashMap;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::{debug, info, instrument};

use crate::fvr::tools::error::{Result, ToolError};
use crate::fvr::tools::model::{
    CellValue, SelectedSheets, SheetTable, SheetTables, excel_serial_to_datetime,
};

/// Checks that `path` names an existing `.xlsx` workbook.
pub fn ensure_workbook_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(ToolError::UnsupportedInput(path.to_path_buf()));
    }
    Ok(())
}

/// Lists the sheet names of a workbook in workbook order.
pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    ensure_workbook_path(path)?;
    let workbook: Xlsx<_> = open_workbook(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Loads every selected sheet of the workbook into a [`SheetTable`].
///
/// The first row of a sheet is its header. Blank header cells are named
/// `Unnamed: <index>` and repeated names get a `.<n>` suffix.
#[instrument(level = "info", skip_all, fields(input = %path.display(), sheets = selected.len()))]
pub fn read_sheets(path: &Path, selected: &SelectedSheets) -> Result<SheetTables> {
    ensure_workbook_path(path)?;
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    selected.validate_against(&workbook.sheet_names().to_vec())?;

    let mut tables = SheetTables::new();
    for name in selected.iter() {
        let range = read_required_sheet(&mut workbook, name)?;
        let table = range_to_table(name, &range);
        debug!(
            sheet = name,
            columns = table.columns.len(),
            rows = table.row_count(),
            "sheet loaded"
        );
        tables.insert(name.to_string(), table);
    }

    info!(sheet_count = tables.len(), "selected sheets loaded");
    Ok(tables)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::MissingSheet(name.to_string()))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn range_to_table(name: &str, range: &calamine::Range<DataType>) -> SheetTable {
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(first_row) => header_names(first_row),
        None => Vec::new(),
    };

    let mut table = SheetTable::new(name, headers);
    for row in rows {
        let cells: Vec<CellValue> = row.iter().map(cell_value).collect();
        if cells.iter().all(CellValue::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    table
}

fn header_names(row: &[DataType]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    row.iter()
        .enumerate()
        .map(|(index, cell)| {
            let raw = cell_to_string(Some(cell));
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {index}")
            } else {
                raw
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Bool(value) => CellValue::Number(if *value { 1.0 } else { 0.0 }),
        DataType::DateTime(serial) => excel_serial_to_datetime(*serial)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(*serial)),
        DataType::String(value) if value.trim().is_empty() => CellValue::Empty,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Empty | DataType::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.trim().to_string(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
