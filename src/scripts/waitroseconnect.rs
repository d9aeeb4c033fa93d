use super::{Script, ScriptContext, ScriptError, text};
use crate::dataset::{Dataset, DatasetError, ReadOptions};
use crate::handlers::{FileHandler, SubUnit};

/// Headered CSV of daily sales per product line
///
/// Exports are sometimes duplicated wholesale, header row included, so
/// repeated headers and duplicate rows are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyLineSales;

impl DailyLineSales {
    pub const FEED: &'static str = "waitroseconnect_daily_line_sales";

    const OUTPUT_COLUMNS: [&'static str; 10] = [
        "Day",
        "Date",
        "Line",
        "Line_Description",
        "Registered_Sales",
        "Sales_SUs",
        "Reduced",
        "Explained_Wastage",
        "Explained_Wastage_Quality",
        "Reductions_pct_Registered_Sales",
    ];

    const POUND_COLUMNS: [&'static str; 4] = [
        "Registered_Sales",
        "Reduced",
        "Explained_Wastage",
        "Explained_Wastage_Quality",
    ];

    pub fn handler() -> FileHandler {
        FileHandler::basic()
    }
}

impl Script for DailyLineSales {
    fn run(&self, _ctx: &ScriptContext, unit: &SubUnit) -> Result<Dataset, ScriptError> {
        let mut data = Dataset::read_delimited(text(unit)?, &ReadOptions::csv())?;

        let date = data
            .column_index("Date")
            .ok_or_else(|| DatasetError::MissingColumn("Date".into()))?;
        data.retain_rows(|row| row[date].as_deref() != Some("Date"));
        data.dedup_rows();

        for column in Self::POUND_COLUMNS {
            data.map_column(column, |cell| cell.map(|v| v.replace('£', "")))?;
        }

        Ok(data.select(&Self::OUTPUT_COLUMNS)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &str = "Day,Date,Line,Line_Description,Registered_Sales,Sales_SUs,Reduced,\
                          Explained_Wastage,Explained_Wastage_Quality,\
                          Reductions_pct_Registered_Sales,Branch";

    fn ctx() -> ScriptContext {
        let day = NaiveDate::from_ymd_opt(2023, 12, 11).unwrap();
        ScriptContext::new(day, day)
    }

    #[test]
    fn test_duplicated_export_is_collapsed() {
        let body = "Mon,2023-12-11,101,Milk,£10.50,5,£0.00,£1.00,£0.50,0.0%,Bath\n\
                    Mon,2023-12-11,102,Bread,£3.20,2,,£0.10,,1.5%,Bath\n";
        let unit = SubUnit::text(format!("{HEADER}\n{body}{HEADER}\n{body}"));

        let data = DailyLineSales.run(&ctx(), &unit).unwrap();

        assert_eq!(data.columns(), &DailyLineSales::OUTPUT_COLUMNS);
        assert_eq!(data.len(), 2);
        assert_eq!(data.value(0, "Registered_Sales"), Some("10.50"));
        assert_eq!(data.value(0, "Explained_Wastage_Quality"), Some("0.50"));
        assert_eq!(data.value(1, "Line_Description"), Some("Bread"));
        assert_eq!(data.value(1, "Reduced"), None);
    }

    #[test]
    fn test_missing_column_fails() {
        let unit = SubUnit::text("Day,Date\nMon,2023-12-11\n");

        assert!(matches!(
            DailyLineSales.run(&ctx(), &unit),
            Err(ScriptError::Dataset(_))
        ));
    }
}
