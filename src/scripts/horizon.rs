use encoding_rs::WINDOWS_1252;
use regex::Regex;
use std::sync::LazyLock;

use super::{Script, ScriptContext, ScriptError, float_columns, format_float, text};
use crate::dataset::{Cell, Dataset, ReadOptions};
use crate::handlers::{FileHandler, SubUnit};

const SOURCE_COLUMNS: [&str; 25] = [
    "SKU",
    "DEPTCOMM",
    "DESCRIPTION",
    "SALESCASH",
    "SALESVOL",
    "WASTAGETOTALVAL",
    "WASTAGETOTALVOL",
    "WASTAGETOTALPCT",
    "AVAILINSTPCT",
    "AVAILVOLPCT",
    "STORESTOCK",
    "MAINSTOCKAVAILABLE",
    "MAINSTOCKHELD",
    "PCCSTOCK",
    "LYINGOUT",
    "BONDSTOCK",
    "DEPOTISSUES",
    "DEPOTSERVICEPCT",
    "SUPPSERVNUMBER",
    "SUPPSERVPCT",
    "LOSTSALESVOL",
    "LOSTSALESVAL",
    "NOREPLEN",
    "VICTIMIND",
    "PROMOIND",
];

const OUTPUT_COLUMNS: [&str; 33] = [
    "ID",
    "SOURCEFILENAME",
    "PROCESSED",
    "RETAILER",
    "DAILY",
    "CATEGORY",
    "SKU",
    "DEPTCOMM",
    "DESCRIPTION",
    "LOSTOPP",
    "SALESCASH",
    "SALESVOL",
    "LOSTSALESVAL",
    "LOSTSALESVOL",
    "WASTAGETOTALVAL",
    "WASTAGETOTALVOL",
    "WASTAGETOTALPCT",
    "AVAILINSTPCT",
    "AVAILVOLPCT",
    "STORESTOCK",
    "MAINSTOCKAVAILABLE",
    "MAINSTOCKHELD",
    "PCCSTOCK",
    "LYINGOUT",
    "BONDSTOCK",
    "DEPOTISSUES",
    "DEPOTSERVICEPCT",
    "SUPPSERVNUMBER",
    "SUPPSERVPCT",
    "STORESRANGED",
    "NOREPLEN",
    "VICTIMIND",
    "PROMOIND",
];

const FLOAT_COLUMNS: [&str; 22] = [
    "SKU",
    "LOSTOPP",
    "SALESCASH",
    "SALESVOL",
    "LOSTSALESVAL",
    "LOSTSALESVOL",
    "WASTAGETOTALVAL",
    "WASTAGETOTALVOL",
    "WASTAGETOTALPCT",
    "AVAILINSTPCT",
    "AVAILVOLPCT",
    "STORESTOCK",
    "MAINSTOCKAVAILABLE",
    "MAINSTOCKHELD",
    "PCCSTOCK",
    "LYINGOUT",
    "BONDSTOCK",
    "DEPOTISSUES",
    "DEPOTSERVICEPCT",
    "SUPPSERVNUMBER",
    "SUPPSERVPCT",
    "NOREPLEN",
];

const SUBTOTAL_LABELS: [&str; 2] = ["Sub-Cat Subtotal", "Overall Sub-Cat Total"];

static DATE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("date row pattern")
});

static SKU_ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("sku pattern"));

/// Report segments start with this marker line
pub fn report_separator() -> String {
    let hashes = "#".repeat(114);
    format!("{hashes}CHUNK{hashes}\n")
}

/// Daily performance report, one segment per store report
///
/// Each segment is a hierarchy: a date row (`DD/MM/YYYY`), category rows,
/// SKU rows and subtotal rows. SKU rows are flattened out carrying the most
/// recent date (as `YYYYMMDD`) and category above them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyPerformanceSales;

impl DailyPerformanceSales {
    pub const FEED: &'static str = "horizon_daily_performance_sales";

    pub fn handler() -> FileHandler {
        FileHandler::Separated {
            separator: report_separator(),
            encoding: WINDOWS_1252,
        }
    }
}

enum RowKind {
    Date(String),
    Sku,
    Subtotal,
    Category,
}

fn classify(sku: &str) -> RowKind {
    if let Some(caps) = DATE_ROW.captures(sku) {
        RowKind::Date(format!("{}{}{}", &caps[3], &caps[2], &caps[1]))
    } else if SKU_ROW.is_match(sku) {
        RowKind::Sku
    } else if SUBTOTAL_LABELS.contains(&sku) {
        RowKind::Subtotal
    } else {
        RowKind::Category
    }
}

impl Script for DailyPerformanceSales {
    fn run(&self, ctx: &ScriptContext, unit: &SubUnit) -> Result<Dataset, ScriptError> {
        let report = Dataset::read_delimited(
            text(unit)?,
            &ReadOptions::csv().names(&SOURCE_COLUMNS),
        )?;

        let mut flattened = Dataset::new(
            SOURCE_COLUMNS
                .iter()
                .copied()
                .chain(["DAILY", "CATEGORY"]),
        );

        let mut daily: Cell = None;
        let mut category: Cell = None;

        // First labelled row is the report's own column header
        let labelled = report.rows().iter().filter(|row| row[0].is_some()).skip(1);
        for row in labelled {
            let Some(sku) = row[0].as_deref() else {
                continue;
            };

            match classify(sku) {
                RowKind::Date(date) => daily = Some(date),
                RowKind::Category => category = Some(sku.to_string()),
                RowKind::Subtotal => {}
                RowKind::Sku => {
                    let mut out = row.clone();
                    out.push(daily.clone());
                    out.push(category.clone());
                    flattened.push_row(out)?;
                }
            }
        }

        let ids = (0..flattened.len()).map(|i| format_float(i as f64)).collect();
        flattened.set_column("ID", ids)?;
        flattened.fill_column("SOURCEFILENAME", Some(ctx.filename.clone()))?;
        flattened.fill_column("PROCESSED", Some(ctx.processed.clone()))?;

        let mut data = flattened.reindex(&OUTPUT_COLUMNS);
        float_columns(&mut data, &FLOAT_COLUMNS)?;

        tracing::debug!(
            filename = %ctx.filename,
            rows = data.len(),
            "Flattened performance report"
        );

        Ok(data)
    }
}
