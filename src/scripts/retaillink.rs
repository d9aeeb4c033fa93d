use chrono::{NaiveDate, NaiveDateTime};

use super::{
    Script, ScriptContext, ScriptError, float_columns, row_ids, store_number,
    strip_leading_zeros, text, to_float,
};
use crate::dataset::{Cell, Dataset, ReadOptions};
use crate::handlers::{FileHandler, SubUnit};

/// Output layout shared by the Retail Link feeds
const OUTPUT_COLUMNS: [&str; 12] = [
    "ID",
    "SOURCEFILENAME",
    "PROCESSED",
    "PRIMEITEMNBR",
    "STORENBR",
    "DAILY",
    "CURRSTRONHANDQTY",
    "CURRTRAITED",
    "EPOSSALES",
    "EPOSQTY",
    "MAXSHELFQTY",
    "SUPPLIERNUMBER",
];

/// Tab-separated daily EPOS sales, one row per item and store
#[derive(Debug, Clone, Copy, Default)]
pub struct DailySales;

impl DailySales {
    pub const FEED: &'static str = "retaillink_daily_sales";

    const SOURCE_COLUMNS: [&'static str; 7] = [
        "SUPPLIERNUMBER",
        "PRIMEITEMNBR",
        "STORENBR",
        "DAILY",
        "EPOSSALES",
        "EPOSQTY",
        "MAXSHELFQTY",
    ];

    pub fn handler() -> FileHandler {
        FileHandler::basic()
    }
}

impl Script for DailySales {
    fn run(&self, _ctx: &ScriptContext, unit: &SubUnit) -> Result<Dataset, ScriptError> {
        let mut data = Dataset::read_delimited(
            text(unit)?,
            &ReadOptions::tsv_with_names(&Self::SOURCE_COLUMNS),
        )?;

        float_columns(&mut data, &["EPOSSALES", "EPOSQTY", "MAXSHELFQTY"])?;
        data.try_map_column("DAILY", |cell| normalize_date("DAILY", cell))?;
        data.map_column("SUPPLIERNUMBER", strip_leading_zeros)?;
        data.map_column("STORENBR", store_number)?;
        data.set_column("ID", row_ids(data.len()))?;

        Ok(data.reindex(&OUTPUT_COLUMNS))
    }
}

/// Tab-separated on-hand stock snapshot; the snapshot day is the run's start date
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentStoreStock;

impl CurrentStoreStock {
    pub const FEED: &'static str = "retaillink_current_store_stock";

    const SOURCE_COLUMNS: [&'static str; 5] = [
        "SUPPLIERNUMBER",
        "PRIMEITEMNBR",
        "STORENBR",
        "CURRSTRONHANDQTY",
        "CURRTRAITED",
    ];

    const OUTPUT_COLUMNS: [&'static str; 9] = [
        "ID",
        "SOURCEFILENAME",
        "PROCESSED",
        "PRIMEITEMNBR",
        "STORENBR",
        "DAILY",
        "CURRSTRONHANDQTY",
        "CURRTRAITED",
        "SUPPLIERNUMBER",
    ];

    pub fn handler() -> FileHandler {
        FileHandler::basic()
    }
}

impl Script for CurrentStoreStock {
    fn run(&self, ctx: &ScriptContext, unit: &SubUnit) -> Result<Dataset, ScriptError> {
        let mut data = Dataset::read_delimited(
            text(unit)?,
            &ReadOptions::tsv_with_names(&Self::SOURCE_COLUMNS),
        )?;

        float_columns(&mut data, &["CURRSTRONHANDQTY"])?;
        data.try_map_column("CURRTRAITED", traited_flag)?;
        data.map_column("STORENBR", store_number)?;
        data.map_column("SUPPLIERNUMBER", strip_leading_zeros)?;
        data.fill_column("DAILY", Some(ctx.start_date.to_string()))?;
        data.set_column("ID", row_ids(data.len()))?;

        Ok(data.reindex(&Self::OUTPUT_COLUMNS))
    }
}

/// Numeric traited flag as `True`/`False`; only zero is false, so a missing
/// flag reads as traited
fn traited_flag(cell: Cell) -> Result<Cell, ScriptError> {
    let traited = match to_float("CURRTRAITED", cell)? {
        Some(value) => value.parse::<f64>().map(|v| v != 0.0).unwrap_or(true),
        None => true,
    };
    Ok(Some(if traited { "True" } else { "False" }.to_string()))
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d", "%d-%b-%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Normalise a date cell to `YYYY-MM-DD`
fn normalize_date(column: &str, cell: Cell) -> Result<Cell, ScriptError> {
    let Some(value) = cell else {
        return Ok(None);
    };
    let trimmed = value.trim();

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|dt| dt.date())
        })
        .ok_or_else(|| ScriptError::InvalidDate {
            column: column.to_string(),
            value: value.clone(),
        })?;

    Ok(Some(date.format("%Y-%m-%d").to_string()))
}
