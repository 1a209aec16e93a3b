pub mod check;
pub mod discrepancy;
pub mod error;
pub mod io;
pub mod model;
pub mod series;

pub use error::{Result, ToolError};
