//! Core library for the fvr-tools command line application.
//!
//! The library compares the metrics of several sheets of an FVR workbook.
//! Spreadsheet adapters live under [`fvr::tools::io`], the tabular
//! representation inside [`fvr::tools::model`], the baseline comparison in
//! [`fvr::tools::discrepancy`], the date-indexed pivot in
//! [`fvr::tools::series`], and the end-to-end workflow under
//! [`fvr::tools::check`].

pub mod fvr;

pub use fvr::tools::{Result, ToolError, check, discrepancy, error, io, model, series};
