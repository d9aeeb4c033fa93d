use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fileprep::schema::{self, PrepareFile, RequestError};

#[derive(Parser, Debug)]
#[command(name = "fileprep")]
#[command(about = "Prepare supplier files for ingestion", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides FILEPREP_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prepare one file and catalogue the outputs
    Prepare(PrepareArgs),
    /// List registered feeds
    Feeds,
}

#[derive(clap::Args, Debug)]
pub struct PrepareArgs {
    /// JSON request file; replaces all other prepare flags
    #[arg(long, conflicts_with_all = ["feed", "location", "supplier", "start_date", "end_date", "source_created"])]
    pub request: Option<PathBuf>,

    /// Feed identifier, e.g. retaillink_daily_sales
    #[arg(long, required_unless_present = "request")]
    pub feed: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub version: u32,

    /// File URI (s3://..., file://..., memory://...) or local path
    #[arg(long, required_unless_present = "request")]
    pub location: Option<String>,

    #[arg(long, required_unless_present = "request")]
    pub supplier: Option<String>,

    #[arg(long, required_unless_present = "request")]
    pub start_date: Option<NaiveDate>,

    #[arg(long, required_unless_present = "request")]
    pub end_date: Option<NaiveDate>,

    /// When the supplier created the file (RFC 3339; naive values are UTC)
    #[arg(long, required_unless_present = "request", value_parser = parse_timestamp)]
    pub source_created: Option<DateTime<FixedOffset>>,

    /// Write one output file per sub-unit instead of one merged file
    #[arg(long)]
    pub no_concat: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("failed to read request file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("missing --{0}")]
    Missing(&'static str),
}

impl PrepareArgs {
    pub fn into_request(self) -> Result<PrepareFile, ArgsError> {
        if let Some(path) = self.request {
            let json = std::fs::read_to_string(&path)
                .map_err(|source| ArgsError::Read { path, source })?;
            return Ok(PrepareFile::from_json(&json)?);
        }

        let request = PrepareFile {
            feed_identifier: self.feed.ok_or(ArgsError::Missing("feed"))?,
            feed_version: self.version,
            file_location: self.location.ok_or(ArgsError::Missing("location"))?,
            data_supplier: self.supplier.ok_or(ArgsError::Missing("supplier"))?,
            start_date: self.start_date.ok_or(ArgsError::Missing("start-date"))?,
            end_date: self.end_date.ok_or(ArgsError::Missing("end-date"))?,
            source_creation_timestamp: self
                .source_created
                .ok_or(ArgsError::Missing("source-created"))?,
            concat: !self.no_concat,
        };
        request.validate()?;
        Ok(request)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, String> {
    schema::parse_timestamp(value).ok_or_else(|| format!("invalid timestamp: {value}"))
}
