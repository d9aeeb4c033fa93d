//! File handler strategies
//!
//! A [`FileHandler`] opens one stored file and yields a lazy sequence of
//! [`SubUnit`]s, each of which feeds one transformation call.
//!
//! ## Strategies
//!
//! - [`FileHandler::Basic`] - whole file, decoded, one unit
//! - [`FileHandler::Chunked`] - fixed-size blocks extended to the next line break
//! - [`FileHandler::Separated`] - whole file split on a literal marker
//! - [`FileHandler::Zip`] - matching archive members, with encoding inference
//! - [`FileHandler::Binary`] - whole file as raw bytes
//!
//! Only archive members fall back to a detected encoding when the configured
//! one fails; every other strategy reports [`HandlerError::Decode`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use fileprep::handlers::FileHandler;
//!
//! let handler = FileHandler::zip_matching(r".*\.csv$")?.with_encoding("latin1")?;
//! let mut units = handler.open(&storage, "s3://inbox/export.zip").await?;
//! while let Some(unit) = units.next().await {
//!     let unit = unit?;
//!     println!("{:?}: {} bytes", unit.name(), unit.as_bytes().len());
//! }
//! ```

mod archive;
mod chunked;
pub mod encoding;
mod strategy;
mod types;

pub use strategy::{DEFAULT_CHUNK_SIZE, FileHandler, HandlerError, SubUnits, default_separator};
pub use types::{Content, SubUnit};
