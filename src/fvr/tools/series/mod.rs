//! Date-indexed overlay of one metric across the selected sheets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::fvr::tools::error::{Result, ToolError};
use crate::fvr::tools::model::{
    CellValue, SelectedSheets, SheetTables, cell_at, excel_serial_to_datetime,
};

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%d %b %Y"];

/// One date of an aligned series. `values` follows the order of
/// [`AlignedSeries::categories`]; `None` marks a sheet without data that day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub date: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

/// Per-sheet sums of a metric, pivoted on the date column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    pub date_column: String,
    pub value_column: String,
    /// Contributing sheet names, sorted.
    pub categories: Vec<String>,
    /// Distinct dates in ascending order.
    pub rows: Vec<SeriesRow>,
}

impl AlignedSeries {
    pub fn empty(date_column: &str, value_column: &str) -> Self {
        Self {
            date_column: date_column.to_string(),
            value_column: value_column.to_string(),
            categories: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// True when no sheet contributed any observation; there is nothing to plot.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Summed value of `category` on `date`, if that sheet had data that day.
    pub fn value(&self, date: &NaiveDateTime, category: &str) -> Option<f64> {
        let column = self.categories.iter().position(|name| name == category)?;
        self.rows
            .iter()
            .find(|row| &row.date == date)
            .and_then(|row| row.values[column])
    }
}

struct Observation<'a> {
    date: NaiveDateTime,
    category: &'a str,
    value: f64,
}

/// Builds the date × sheet pivot of `value_column`.
///
/// Only sheets carrying both `date_column` and `value_column` take part;
/// the others are left out silently. Values sharing a date and a sheet are
/// summed. A date cell that cannot be read as a date fails the whole
/// alignment.
pub fn align_series(
    tables: &SheetTables,
    selected: &SelectedSheets,
    date_column: &str,
    value_column: &str,
) -> Result<AlignedSeries> {
    let qualifying: Vec<_> = selected
        .iter()
        .filter_map(|name| tables.get(name).map(|table| (name, table)))
        .filter(|(name, table)| {
            let keep = table.has_columns(&[date_column, value_column]);
            if !keep {
                debug!(sheet = %name, date_column, value_column, "sheet excluded from series");
            }
            keep
        })
        .collect();

    if qualifying.is_empty() {
        return Ok(AlignedSeries::empty(date_column, value_column));
    }

    let mut observations = Vec::new();
    for (name, table) in &qualifying {
        let (Some(date_index), Some(value_index)) =
            (table.column_index(date_column), table.column_index(value_column))
        else {
            continue;
        };

        for (row_index, row) in table.rows.iter().enumerate() {
            let date_cell = cell_at(row, date_index);
            if date_cell.is_empty() {
                continue;
            }
            let date = parse_date_cell(date_cell).ok_or_else(|| ToolError::DateParse {
                sheet: name.to_string(),
                column: date_column.to_string(),
                data_row: row_index + 1,
                value: date_cell.to_string(),
            })?;
            if let Some(value) = cell_at(row, value_index).as_number() {
                observations.push(Observation {
                    date,
                    category: *name,
                    value,
                });
            }
        }
    }

    Ok(pivot(observations, date_column, value_column))
}

fn pivot(observations: Vec<Observation<'_>>, date_column: &str, value_column: &str) -> AlignedSeries {
    let mut categories = BTreeSet::new();
    let mut sums: BTreeMap<NaiveDateTime, BTreeMap<&str, f64>> = BTreeMap::new();

    for observation in observations {
        categories.insert(observation.category);
        *sums
            .entry(observation.date)
            .or_default()
            .entry(observation.category)
            .or_insert(0.0) += observation.value;
    }

    let rows = sums
        .into_iter()
        .map(|(date, by_category)| SeriesRow {
            date,
            values: categories
                .iter()
                .map(|category| by_category.get(category).copied())
                .collect(),
        })
        .collect::<Vec<_>>();

    debug!(
        value_column,
        categories = categories.len(),
        dates = rows.len(),
        "series aligned"
    );

    AlignedSeries {
        date_column: date_column.to_string(),
        value_column: value_column.to_string(),
        categories: categories.into_iter().map(str::to_string).collect(),
        rows,
    }
}

/// Reads a date cell. Numbers are taken as Excel serials; text must match
/// RFC 3339 or one of the month-first layouts listed above.
pub fn parse_date_cell(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Date(value) => Some(*value),
        CellValue::Number(serial) => excel_serial_to_datetime(*serial),
        CellValue::Text(text) => parse_date_text(text.trim()),
        CellValue::Empty => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn text_dates_accept_common_layouts() {
        for text in ["2024-01-05", "2024/01/05", "01/05/2024", "05-Jan-2024", "5 Jan 2024"] {
            assert_eq!(
                parse_date_cell(&CellValue::Text(text.into())),
                Some(midnight(2024, 1, 5)),
                "{text}"
            );
        }
    }

    #[test]
    fn text_dates_keep_time() {
        let parsed = parse_date_cell(&CellValue::Text("2024-01-05T06:30:00".into()))
            .expect("datetime parsed");
        assert_eq!(parsed.format("%H:%M").to_string(), "06:30");
    }

    #[test]
    fn garbage_is_not_a_date() {
        assert_eq!(parse_date_cell(&CellValue::Text("next tuesday".into())), None);
        assert_eq!(parse_date_cell(&CellValue::Empty), None);
    }
}
