//! In-memory tabular datasets
//!
//! A [`Dataset`] is a list of named columns and ordered rows of optional
//! string cells. `None` is missing data and is written as an empty field.

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use std::collections::HashSet;
use thiserror::Error;

/// Cell value; `None` is missing data
pub type Cell = Option<String>;

/// Field values read as missing data
pub const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("row has {found} fields, expected {expected}")]
    RowWidth { expected: usize, found: usize },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush csv output: {0}")]
    Io(#[from] std::io::Error),
}

/// How column names are found when reading delimited text
#[derive(Debug, Clone)]
pub enum Header {
    /// First record holds the names
    FirstRow,
    /// No header record; use these names
    Names(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub header: Header,
}

impl ReadOptions {
    pub fn csv() -> Self {
        Self {
            delimiter: b',',
            header: Header::FirstRow,
        }
    }

    pub fn tsv_with_names(names: &[&str]) -> Self {
        Self {
            delimiter: b'\t',
            header: Header::Names(names.iter().map(|n| n.to_string()).collect()),
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn names(mut self, names: &[&str]) -> Self {
        self.header = Header::Names(names.iter().map(|n| n.to_string()).collect());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require(&self, name: &str) -> Result<usize, DatasetError> {
        self.column_index(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), DatasetError> {
        if row.len() != self.columns.len() {
            return Err(DatasetError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Convenience for literal rows; `""` becomes missing data
    pub fn push_values(&mut self, values: &[&str]) -> Result<(), DatasetError> {
        self.push_row(
            values
                .iter()
                .map(|v| (!v.is_empty()).then(|| v.to_string()))
                .collect(),
        )
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Result<Vec<&Cell>, DatasetError> {
        let index = self.require(name)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    /// Replace every cell of a column with `f(cell)`
    pub fn try_map_column<F, E>(&mut self, name: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(Cell) -> Result<Cell, E>,
        E: From<DatasetError>,
    {
        let index = self.require(name)?;
        for row in &mut self.rows {
            let cell = row[index].take();
            row[index] = f(cell)?;
        }
        Ok(())
    }

    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<(), DatasetError>
    where
        F: FnMut(Cell) -> Cell,
    {
        self.try_map_column(name, |cell| Ok::<_, DatasetError>(f(cell)))
    }

    /// Add a column, or overwrite it if it already exists
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<(), DatasetError> {
        if values.len() != self.rows.len() {
            return Err(DatasetError::RowWidth {
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Fill a column with the same value on every row
    pub fn fill_column(&mut self, name: &str, value: Cell) -> Result<(), DatasetError> {
        let values = vec![value; self.rows.len()];
        self.set_column(name, values)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), DatasetError> {
        let index = self.require(from)?;
        self.columns[index] = to.to_string();
        Ok(())
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Drop rows identical to an earlier row
    pub fn dedup_rows(&mut self) {
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Project onto `names`, in that order; every name must exist
    pub fn select(&self, names: &[&str]) -> Result<Dataset, DatasetError> {
        let indices = names
            .iter()
            .map(|name| self.require(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.project(names, &indices))
    }

    /// Project onto `names`, in that order; absent columns are all missing
    pub fn reindex(&self, names: &[&str]) -> Dataset {
        let indices: Vec<Option<usize>> =
            names.iter().map(|name| self.column_index(name)).collect();

        Dataset {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| {
                    indices
                        .iter()
                        .map(|index| index.and_then(|i| row[i].clone()))
                        .collect()
                })
                .collect(),
        }
    }

    fn project(&self, names: &[&str], indices: &[usize]) -> Dataset {
        Dataset {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Parse delimited text; NA markers become missing data
    pub fn read_delimited(text: &str, options: &ReadOptions) -> Result<Dataset, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();

        let mut dataset = match &options.header {
            Header::Names(names) => Dataset::new(names.iter().cloned()),
            Header::FirstRow => match records.next() {
                Some(header) => Dataset::new(header?.iter()),
                None => return Ok(Dataset::default()),
            },
        };

        let width = dataset.columns.len();
        for record in records {
            let record = record?;
            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }
            if record.len() > width {
                return Err(DatasetError::RowWidth {
                    expected: width,
                    found: record.len(),
                });
            }

            let mut row: Vec<Cell> = record.iter().map(na_to_none).collect();
            row.resize(width, None);
            dataset.rows.push(row);
        }

        Ok(dataset)
    }

    /// Row-wise union; columns are the union of all inputs in order of first
    /// appearance and cells absent from a component are missing
    pub fn concat(datasets: Vec<Dataset>) -> Dataset {
        let mut columns: Vec<String> = Vec::new();
        for dataset in &datasets {
            for column in &dataset.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        let mut merged = Dataset::new(names.iter().copied());
        for dataset in &datasets {
            merged.rows.extend(dataset.reindex(&names).rows);
        }
        merged
    }

    /// Comma-delimited UTF-8 with a header row, minimal quoting, `\n` endings
    pub fn to_csv(&self) -> Result<Vec<u8>, DatasetError> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }

        writer
            .into_inner()
            .map_err(|e| DatasetError::Io(e.into_error()))
    }
}

fn na_to_none(field: &str) -> Cell {
    if NA_VALUES.contains(&field) {
        None
    } else {
        Some(field.to_string())
    }
}
