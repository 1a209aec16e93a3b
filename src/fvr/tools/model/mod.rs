use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::fvr::tools::error::{Result, ToolError};

/// Occupancy count column of an FVR sheet.
pub const OCCUPANCY_METRIC: &str = "Occupancy On Books This Year";
/// Room revenue column of an FVR sheet.
pub const REVENUE_METRIC: &str = "Booked Room Revenue This Year";
/// Date column the FVR metrics are reported against.
pub const OCCUPANCY_DATE_COLUMN: &str = "Occupancy Date";
/// Metrics compared when the caller does not ask for others.
pub const DEFAULT_METRICS: [&str; 2] = [OCCUPANCY_METRIC, REVENUE_METRIC];

const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// First serial past 9999-12-31, the last date Excel can display.
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

static BLANK: CellValue = CellValue::Empty;

/// Name of a sheet in the uploaded workbook.
pub type SheetName = String;

/// Loaded tables keyed by sheet name.
pub type SheetTables = BTreeMap<SheetName, SheetTable>;

/// A single cell of a loaded sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Numeric cell.
    Number(f64),
    /// Calendar date or date/time cell.
    Date(NaiveDateTime),
    /// Free text cell.
    Text(String),
    /// Blank cell.
    Empty,
}

impl CellValue {
    /// Returns the numeric reading of the cell. Text is accepted when it holds
    /// a finite number once trimmed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) if value.is_finite() => Some(*value),
            CellValue::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Number(value) => write!(f, "{value}"),
            CellValue::Date(value) => write!(f, "{}", format_datetime(value)),
            CellValue::Text(value) => write!(f, "{value}"),
            CellValue::Empty => Ok(()),
        }
    }
}

/// One sheet's data after it has been loaded: named columns and rows of
/// cells. Rows added through [`SheetTable::push_row`] hold one cell per
/// column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetTable {
    pub name: SheetName,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    /// Creates an empty table with the given header.
    pub fn new(name: impl Into<SheetName>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from a header and rows in one go.
    pub fn from_rows<I, C>(name: impl Into<SheetName>, columns: &[&str], rows: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoIterator<Item = CellValue>,
    {
        let mut table = Self::new(name, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.into_iter().collect());
        }
        table
    }

    /// Appends a row, padding short rows with blanks and dropping cells past
    /// the last column.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(cells);
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// True when every named column is present.
    pub fn has_columns(&self, columns: &[&str]) -> bool {
        columns.iter().all(|column| self.has_column(column))
    }

    /// Iterates the cells of a column from top to bottom.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &CellValue> + '_> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| cell_at(row, index)))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Sheets picked by the user, in selection order. The first entry is the
/// baseline every other sheet is compared against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSheets {
    names: Vec<SheetName>,
}

impl SelectedSheets {
    /// Keeps the selection order and drops names already selected.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SheetName>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &SheetName| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    pub fn baseline(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Sheets compared against the baseline.
    pub fn compared(&self) -> &[SheetName] {
        self.names.get(1..).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ensures every selected sheet exists in the workbook.
    pub fn validate_against(&self, available: &[String]) -> Result<()> {
        if self.is_empty() {
            return Err(ToolError::EmptySelection);
        }
        match self
            .names
            .iter()
            .find(|name| !available.contains(name))
        {
            Some(missing) => Err(ToolError::MissingSheet(missing.clone())),
            None => Ok(()),
        }
    }
}

/// Cell `index` of `row`; rows built without [`SheetTable::push_row`] may be
/// short, and their missing cells read as blank.
pub fn cell_at(row: &[CellValue], index: usize) -> &CellValue {
    row.get(index).unwrap_or(&BLANK)
}

/// Converts an Excel serial number (1900 date system) into a date/time.
///
/// Serials below 60 are shifted by a day to undo the phantom 1900-02-29
/// inherited from Lotus 1-2-3.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !(0.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let millis = ((serial - serial.trunc()) * MILLIS_PER_DAY).round() as i64;
    let offset = if days < 60 { days + 1 } else { days };
    excel_epoch()?
        .checked_add_signed(Duration::try_days(offset)?)?
        .checked_add_signed(Duration::try_milliseconds(millis)?)
}

/// Inverse of [`excel_serial_to_datetime`].
pub fn datetime_to_excel_serial(value: &NaiveDateTime) -> f64 {
    let Some(epoch) = excel_epoch() else {
        return 0.0;
    };
    let serial = (*value - epoch).num_milliseconds() as f64 / MILLIS_PER_DAY;
    if serial < 61.0 { serial - 1.0 } else { serial }
}

/// Renders a date/time as `YYYY-MM-DD`, keeping the time only when set.
pub fn format_datetime(value: &NaiveDateTime) -> String {
    if value.time() == chrono::NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn serial_maps_to_calendar_dates() {
        assert_eq!(excel_serial_to_datetime(45292.0), Some(date(2024, 1, 1)));
        assert_eq!(excel_serial_to_datetime(1.0), Some(date(1900, 1, 1)));
        assert_eq!(excel_serial_to_datetime(61.0), Some(date(1900, 3, 1)));
        assert_eq!(excel_serial_to_datetime(-1.0), None);
    }

    #[test]
    fn serials_past_year_9999_are_rejected() {
        assert_eq!(
            excel_serial_to_datetime(2_958_465.0),
            Some(date(9999, 12, 31))
        );
        assert_eq!(excel_serial_to_datetime(2_958_466.0), None);
        assert_eq!(excel_serial_to_datetime(1e15), None);
        assert_eq!(excel_serial_to_datetime(f64::MAX), None);
    }

    #[test]
    fn serial_keeps_time_of_day() {
        let value = excel_serial_to_datetime(45292.5).expect("valid serial");
        assert_eq!(format_datetime(&value), "2024-01-01 12:00:00");
    }

    #[test]
    fn serial_conversion_is_reversible() {
        for day in [date(1900, 1, 1), date(1900, 3, 1), date(2024, 2, 29)] {
            let serial = datetime_to_excel_serial(&day);
            assert_eq!(excel_serial_to_datetime(serial), Some(day));
        }
    }

    #[test]
    fn text_cells_parse_as_numbers_when_numeric() {
        assert_eq!(CellValue::Text(" 12.5 ".into()).as_number(), Some(12.5));
        assert_eq!(CellValue::Text("n/a".into()).as_number(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn selection_drops_repeated_names() {
        let selection = SelectedSheets::new(["Base", "Other", "Base"]);
        assert_eq!(selection.baseline(), Some("Base"));
        assert_eq!(selection.compared(), &["Other".to_string()]);
    }

    #[test]
    fn selection_must_exist_in_workbook() {
        let available = vec!["Base".to_string()];
        let selection = SelectedSheets::new(["Base", "Ghost"]);
        assert!(matches!(
            selection.validate_against(&available),
            Err(ToolError::MissingSheet(name)) if name == "Ghost"
        ));
        assert!(matches!(
            SelectedSheets::default().validate_against(&available),
            Err(ToolError::EmptySelection)
        ));
    }

    #[test]
    fn short_rows_are_padded() {
        let mut table = SheetTable::new("S", vec!["a".into(), "b".into()]);
        table.push_row(vec![CellValue::Number(1.0)]);
        assert_eq!(table.rows[0], vec![CellValue::Number(1.0), CellValue::Empty]);
        assert!(table.has_columns(&["a", "b"]));
        assert!(!table.has_columns(&["a", "c"]));
    }

    #[test]
    fn ragged_rows_read_missing_cells_as_blank() {
        let table = SheetTable {
            name: "S".into(),
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![], vec![CellValue::Number(2.0)]],
        };
        let cells: Vec<&CellValue> = table.column("b").expect("column present").collect();
        assert_eq!(cells, vec![&CellValue::Empty, &CellValue::Empty]);
        assert_eq!(cell_at(&table.rows[1], 0), &CellValue::Number(2.0));
    }
}
