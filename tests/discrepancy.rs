use fvr_tools::ToolError;
use fvr_tools::discrepancy::{compute_discrepancies, metric_total, percent_difference};
use fvr_tools::model::{
    CellValue, OCCUPANCY_METRIC, REVENUE_METRIC, SelectedSheets, SheetTable, SheetTables,
};
use proptest::prelude::*;

fn totals_sheet(name: &str, occupancy: &[f64], revenue: &[f64]) -> SheetTable {
    let rows = occupancy.iter().zip(revenue).map(|(occ, rev)| {
        vec![CellValue::Number(*occ), CellValue::Number(*rev)]
    });
    SheetTable::from_rows(name, &[OCCUPANCY_METRIC, REVENUE_METRIC], rows)
}

fn tables(sheets: Vec<SheetTable>) -> SheetTables {
    sheets
        .into_iter()
        .map(|table| (table.name.clone(), table))
        .collect()
}

const METRICS: [&str; 2] = [OCCUPANCY_METRIC, REVENUE_METRIC];

#[test]
fn compares_each_metric_against_the_baseline() {
    let tables = tables(vec![
        totals_sheet("Base", &[400.0, 600.0], &[20000.0, 30000.0]),
        totals_sheet("Forecast", &[500.0, 600.0], &[27500.0, 20000.0]),
    ]);
    let selected = SelectedSheets::new(["Base", "Forecast"]);

    let report = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");

    assert!(report.is_complete());
    let summary: Vec<(&str, &str, f64)> = report
        .rows
        .iter()
        .map(|row| {
            (
                row.metric.as_str(),
                row.compared_sheet.as_str(),
                row.discrepancy_percent,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (OCCUPANCY_METRIC, "Forecast", 10.0),
            (REVENUE_METRIC, "Forecast", -5.0),
        ]
    );
}

#[test]
fn rows_are_grouped_by_metric_then_selection_order() {
    let tables = tables(vec![
        totals_sheet("A", &[100.0], &[100.0]),
        totals_sheet("B", &[110.0], &[90.0]),
        totals_sheet("C", &[120.0], &[80.0]),
    ]);
    let selected = SelectedSheets::new(["A", "C", "B"]);

    let report = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");

    let order: Vec<(&str, &str)> = report
        .rows
        .iter()
        .map(|row| (row.metric.as_str(), row.compared_sheet.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (OCCUPANCY_METRIC, "C"),
            (OCCUPANCY_METRIC, "B"),
            (REVENUE_METRIC, "C"),
            (REVENUE_METRIC, "B"),
        ]
    );
    assert!(report.rows.iter().all(|row| row.compared_sheet != "A"));
}

#[test]
fn zero_baseline_fails_only_that_metric() {
    let tables = tables(vec![
        totals_sheet("Base", &[0.0, 0.0], &[50000.0]),
        totals_sheet("One", &[10.0], &[47500.0]),
        totals_sheet("Two", &[5.0], &[55000.0]),
    ]);
    let selected = SelectedSheets::new(["Base", "One", "Two"]);

    let report = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");

    assert_eq!(report.failures.len(), 2);
    for (failure, sheet) in report.failures.iter().zip(["One", "Two"]) {
        assert_eq!(failure.metric, OCCUPANCY_METRIC);
        assert_eq!(failure.compared_sheet, sheet);
        assert!(matches!(
            &failure.error,
            ToolError::ZeroBaseline { metric, sheet } if metric == OCCUPANCY_METRIC && sheet == "Base"
        ));
    }

    let revenue: Vec<f64> = report
        .rows
        .iter()
        .filter(|row| row.metric == REVENUE_METRIC)
        .map(|row| row.discrepancy_percent)
        .collect();
    assert_eq!(revenue, vec![-5.0, 10.0]);
}

#[test]
fn missing_column_on_compared_sheet_spares_other_pairs() {
    let partial = SheetTable::from_rows(
        "Partial",
        &[OCCUPANCY_METRIC],
        [[CellValue::Number(90.0)]],
    );
    let tables = tables(vec![
        totals_sheet("Base", &[100.0], &[1000.0]),
        partial,
        totals_sheet("Full", &[100.0], &[1100.0]),
    ]);
    let selected = SelectedSheets::new(["Base", "Partial", "Full"]);

    let report = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");

    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.metric, REVENUE_METRIC);
    assert_eq!(failure.compared_sheet, "Partial");
    assert!(matches!(
        &failure.error,
        ToolError::MissingColumn { sheet, column } if sheet == "Partial" && column == REVENUE_METRIC
    ));
}

#[test]
fn missing_baseline_column_fails_every_pair_of_that_metric() {
    let base = SheetTable::from_rows("Base", &[OCCUPANCY_METRIC], [[CellValue::Number(50.0)]]);
    let tables = tables(vec![
        base,
        totals_sheet("One", &[55.0], &[10.0]),
        totals_sheet("Two", &[45.0], &[10.0]),
    ]);
    let selected = SelectedSheets::new(["Base", "One", "Two"]);

    let report = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");

    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|failure| matches!(
        &failure.error,
        ToolError::MissingColumn { sheet, .. } if sheet == "Base"
    )));
}

#[test]
fn empty_selection_is_rejected() {
    let tables = tables(vec![totals_sheet("Base", &[1.0], &[1.0])]);
    let result = compute_discrepancies(&tables, &SelectedSheets::default(), &METRICS);
    assert!(matches!(result, Err(ToolError::EmptySelection)));
}

#[test]
fn baseline_alone_yields_no_rows() {
    let tables = tables(vec![totals_sheet("Base", &[1.0], &[1.0])]);
    let report = compute_discrepancies(&tables, &SelectedSheets::new(["Base"]), &METRICS)
        .expect("report computed");
    assert!(report.rows.is_empty());
    assert!(report.failures.is_empty());
}

#[test]
fn unknown_sheet_is_reported_per_pair() {
    let tables = tables(vec![totals_sheet("Base", &[1.0], &[1.0])]);
    let selected = SelectedSheets::new(["Base", "Ghost"]);

    let report = compute_discrepancies(&tables, &selected, &[OCCUPANCY_METRIC])
        .expect("report computed");

    assert!(matches!(
        &report.failures[0].error,
        ToolError::MissingSheet(name) if name == "Ghost"
    ));
}

#[test]
fn short_rows_built_by_hand_total_as_blank() {
    let empty_row = |name: &str| SheetTable {
        name: name.to_string(),
        columns: vec![OCCUPANCY_METRIC.to_string()],
        rows: vec![vec![]],
    };
    let tables = tables(vec![empty_row("S"), empty_row("T")]);
    let selected = SelectedSheets::new(["S", "T"]);

    let report = compute_discrepancies(&tables, &selected, &[OCCUPANCY_METRIC])
        .expect("report computed");

    assert!(report.rows.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0].error,
        ToolError::ZeroBaseline { sheet, .. } if sheet == "S"
    ));
    assert_eq!(metric_total(&tables, "T", OCCUPANCY_METRIC).expect("total"), 0.0);
}

#[test]
fn missing_baseline_sheet_fails_every_pair() {
    let tables = tables(vec![
        totals_sheet("One", &[1.0], &[1.0]),
        totals_sheet("Two", &[2.0], &[2.0]),
    ]);
    let selected = SelectedSheets::new(["Gone", "One", "Two"]);

    let report = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");

    assert!(report.rows.is_empty());
    assert_eq!(report.failures.len(), 4);
    assert!(report.failures.iter().all(|failure| matches!(
        &failure.error,
        ToolError::MissingSheet(name) if name == "Gone"
    )));
}

#[test]
fn totals_skip_blanks_and_read_numeric_text() {
    let table = SheetTable::from_rows(
        "Mixed",
        &[OCCUPANCY_METRIC],
        [
            [CellValue::Number(10.0)],
            [CellValue::Empty],
            [CellValue::Text(" 5 ".into())],
            [CellValue::Text("Total".into())],
        ],
    );
    let tables = tables(vec![table]);
    assert_eq!(metric_total(&tables, "Mixed", OCCUPANCY_METRIC).expect("total"), 15.0);
}

#[test]
fn rounding_is_half_away_from_zero() {
    assert_eq!(percent_difference(100.0, 110.0), 10.0);
    // 99.995 is stored just above itself, so the raw value sits above -0.005.
    assert_eq!(percent_difference(100.0, 99.995), 0.0);
    assert_eq!(percent_difference(800.0, 801.0), 0.13);
    assert_eq!(percent_difference(800.0, 799.0), -0.13);
    assert_eq!(percent_difference(3.0, 4.0), 33.33);
    assert_eq!(percent_difference(100.0, 100.001), 0.0);
    assert!(percent_difference(100.0, 99.999).is_sign_positive());
}

proptest! {
    #[test]
    fn discrepancy_matches_direct_recomputation(
        base in proptest::collection::vec(1.0..1000.0f64, 1..20),
        other in proptest::collection::vec(0.0..1000.0f64, 1..20),
    ) {
        let tables = tables(vec![
            totals_sheet("Base", &base, &base),
            totals_sheet("Other", &other, &other),
        ]);
        let selected = SelectedSheets::new(["Base", "Other"]);

        let first = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");
        let second = compute_discrepancies(&tables, &selected, &METRICS).expect("report computed");
        prop_assert_eq!(&first.rows, &second.rows);

        let base_total: f64 = base.iter().sum();
        let other_total: f64 = other.iter().sum();
        let expected = (((other_total - base_total) / base_total) * 100.0 * 100.0).round() / 100.0;
        for row in &first.rows {
            prop_assert!((row.discrepancy_percent - expected).abs() < 1e-9);
            prop_assert_ne!(row.compared_sheet.as_str(), "Base");
        }
    }
}
