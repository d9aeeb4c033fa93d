//! Per-feed transformation routines
//!
//! Each supplier feed implements [`Script`]: one sub-unit in, one
//! [`Dataset`] out. Built-in feeds are registered with
//! [`register_builtin`].

mod horizon;
mod retaillink;
mod waitroseconnect;

pub use horizon::DailyPerformanceSales;
pub use retaillink::{CurrentStoreStock, DailySales};
pub use waitroseconnect::DailyLineSales;

use chrono::NaiveDate;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

use crate::dataset::{Cell, Dataset, DatasetError};
use crate::handlers::SubUnit;
use crate::registry::ScriptRegistry;

/// Placeholder for source metadata a sub-unit does not carry
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("expected text input, got binary data")]
    BinaryInput,

    #[error("invalid number in column {column}: {value:?}")]
    InvalidNumber { column: String, value: String },

    #[error("invalid date in column {column}: {value:?}")]
    InvalidDate { column: String, value: String },

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Run parameters visible to a transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContext {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Archive member name, or [`NOT_AVAILABLE`]
    pub filename: String,
    pub processed: String,
}

impl ScriptContext {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            filename: NOT_AVAILABLE.to_string(),
            processed: NOT_AVAILABLE.to_string(),
        }
    }

    /// Context for one sub-unit, picking up its member name when it has one
    pub fn for_unit(&self, unit: &SubUnit) -> Self {
        Self {
            filename: unit.name().unwrap_or(NOT_AVAILABLE).to_string(),
            ..self.clone()
        }
    }
}

/// Transformation capability: one sub-unit to one dataset
pub trait Script: Send + Sync {
    fn run(&self, ctx: &ScriptContext, unit: &SubUnit) -> Result<Dataset, ScriptError>;
}

/// Register every built-in supplier feed
pub fn register_builtin(registry: &mut ScriptRegistry) {
    registry.register(
        DailySales::FEED,
        1,
        Arc::new(DailySales),
        DailySales::handler(),
    );
    registry.register(
        CurrentStoreStock::FEED,
        1,
        Arc::new(CurrentStoreStock),
        CurrentStoreStock::handler(),
    );
    registry.register(
        DailyLineSales::FEED,
        1,
        Arc::new(DailyLineSales),
        DailyLineSales::handler(),
    );
    registry.register(
        DailyPerformanceSales::FEED,
        1,
        Arc::new(DailyPerformanceSales),
        DailyPerformanceSales::handler(),
    );
}

pub(crate) fn text(unit: &SubUnit) -> Result<&str, ScriptError> {
    unit.as_text().ok_or(ScriptError::BinaryInput)
}

/// Parse a numeric cell and render it the way floats are written to CSV
/// (`12` becomes `12.0`, `1.50` becomes `1.5`)
pub(crate) fn to_float(column: &str, cell: Cell) -> Result<Cell, ScriptError> {
    let Some(value) = cell else {
        return Ok(None);
    };

    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| ScriptError::InvalidNumber {
            column: column.to_string(),
            value: value.clone(),
        })?;

    Ok(format_float(parsed))
}

pub(crate) fn format_float(value: f64) -> Cell {
    if value.is_nan() {
        None
    } else if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        Some(format!("{value:.1}"))
    } else {
        Some(value.to_string())
    }
}

pub(crate) fn float_columns(dataset: &mut Dataset, columns: &[&str]) -> Result<(), ScriptError> {
    for column in columns {
        dataset.try_map_column(column, |cell| to_float(column, cell))?;
    }
    Ok(())
}

static STORE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.\d*").expect("store number pattern"));

/// `"0012.0"` becomes `"0012"`; values without a decimal part are missing
pub(crate) fn store_number(cell: Cell) -> Cell {
    let value = cell?;
    STORE_NUMBER
        .captures(&value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub(crate) fn strip_leading_zeros(cell: Cell) -> Cell {
    cell.map(|v| v.trim_start_matches('0').to_string())
}

/// Sequential row ids starting at zero
pub(crate) fn row_ids(len: usize) -> Vec<Cell> {
    (0..len).map(|i| Some(i.to_string())).collect()
}
