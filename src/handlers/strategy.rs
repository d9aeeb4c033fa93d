use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use thiserror::Error;

use super::archive::ArchiveMembers;
use super::chunked::ChunkedReader;
use super::encoding;
use super::types::SubUnit;
use crate::storage::{StorageClient, StorageError};

/// Default block size for the chunked strategy (50 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// Default record separator: 114 `#` followed by `CHUNK`
pub fn default_separator() -> String {
    format!("{}CHUNK", "#".repeat(114))
}

/// File handler errors
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to decode {location} as {encoding}")]
    Decode {
        location: String,
        encoding: &'static str,
    },

    #[error("could not infer encoding of archive member {member}")]
    EncodingIndeterminate { member: String },

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("invalid member pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("unreadable archive {location}: {source}")]
    Archive {
        location: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Strategy for turning one file into a sequence of sub-units
///
/// Handlers hold only their settings, so one value can serve any number of
/// runs concurrently.
#[derive(Debug, Clone)]
pub enum FileHandler {
    /// Whole file decoded into a single text unit
    Basic { encoding: &'static Encoding },
    /// Blocks of `chunk_size` bytes extended to the next line break
    Chunked {
        chunk_size: usize,
        encoding: &'static Encoding,
    },
    /// Whole file split on a literal separator, one trimmed unit per segment
    Separated {
        separator: String,
        encoding: &'static Encoding,
    },
    /// Zip members whose names match `pattern`
    Zip {
        pattern: Regex,
        encoding: &'static Encoding,
        is_binary_file: bool,
    },
    /// Whole file as a single binary unit
    Binary,
}

impl FileHandler {
    pub fn basic() -> Self {
        FileHandler::Basic { encoding: UTF_8 }
    }

    pub fn chunked(chunk_size: usize) -> Self {
        FileHandler::Chunked {
            chunk_size,
            encoding: UTF_8,
        }
    }

    pub fn separated() -> Self {
        Self::separated_by(default_separator())
    }

    pub fn separated_by(separator: impl Into<String>) -> Self {
        FileHandler::Separated {
            separator: separator.into(),
            encoding: UTF_8,
        }
    }

    /// Zip handler yielding every member
    pub fn zip() -> Self {
        FileHandler::Zip {
            pattern: Regex::new("^(?:.*)").expect("match-all pattern compiles"),
            encoding: UTF_8,
            is_binary_file: false,
        }
    }

    /// Zip handler yielding members whose names match `pattern` from the
    /// start of the name
    pub fn zip_matching(pattern: &str) -> Result<Self, HandlerError> {
        Ok(FileHandler::Zip {
            pattern: Regex::new(&format!("^(?:{pattern})"))?,
            encoding: UTF_8,
            is_binary_file: false,
        })
    }

    pub fn binary() -> Self {
        FileHandler::Binary
    }

    /// Replace the text encoding; no-op for binary handlers
    pub fn with_encoding(mut self, label: &str) -> Result<Self, HandlerError> {
        let resolved = encoding::lookup(label)?;
        match &mut self {
            FileHandler::Basic { encoding }
            | FileHandler::Chunked { encoding, .. }
            | FileHandler::Separated { encoding, .. }
            | FileHandler::Zip { encoding, .. } => *encoding = resolved,
            FileHandler::Binary => {}
        }
        Ok(self)
    }

    /// Yield zip members as raw bytes instead of decoding them
    pub fn binary_members(mut self) -> Self {
        if let FileHandler::Zip { is_binary_file, .. } = &mut self {
            *is_binary_file = true;
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileHandler::Basic { .. } => "basic",
            FileHandler::Chunked { .. } => "chunked",
            FileHandler::Separated { .. } => "separated",
            FileHandler::Zip { .. } => "zip",
            FileHandler::Binary => "binary",
        }
    }

    pub fn encoding(&self) -> Option<&'static Encoding> {
        match self {
            FileHandler::Basic { encoding }
            | FileHandler::Chunked { encoding, .. }
            | FileHandler::Separated { encoding, .. }
            | FileHandler::Zip { encoding, .. } => Some(*encoding),
            FileHandler::Binary => None,
        }
    }

    /// Open `location` and return its sub-units
    ///
    /// Storage errors (missing file, denied access) surface here or, for the
    /// chunked strategy, from the sequence itself.
    pub async fn open(
        &self,
        storage: &StorageClient,
        location: &str,
    ) -> Result<SubUnits, HandlerError> {
        tracing::debug!(location, handler = self.kind(), "Opening file");

        let source = match self {
            FileHandler::Basic { encoding } => {
                let raw = storage.read(location).await?;
                let text = encoding::decode_strict(&raw, *encoding, location)?;
                Source::Buffered(vec![SubUnit::text(text)].into_iter())
            }
            FileHandler::Chunked {
                chunk_size,
                encoding,
            } => {
                let stream = storage.read_stream(location).await?;
                Source::Chunked(ChunkedReader::new(location, stream, *chunk_size, *encoding))
            }
            FileHandler::Separated {
                separator,
                encoding,
            } => {
                let raw = storage.read(location).await?;
                let text = encoding::decode_strict(&raw, *encoding, location)?;
                Source::Buffered(split_segments(&text, separator).into_iter())
            }
            FileHandler::Zip {
                pattern,
                encoding,
                is_binary_file,
            } => {
                let raw = storage.read(location).await?;
                Source::Archive(ArchiveMembers::open(
                    location,
                    raw,
                    pattern,
                    *encoding,
                    *is_binary_file,
                )?)
            }
            FileHandler::Binary => {
                let raw = storage.read(location).await?;
                Source::Buffered(vec![SubUnit::binary(raw)].into_iter())
            }
        };

        Ok(SubUnits { source })
    }
}

fn split_segments(text: &str, separator: &str) -> Vec<SubUnit> {
    text.split(separator)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(SubUnit::text)
        .collect()
}

/// Lazy, single-pass sequence of sub-units produced by [`FileHandler::open`]
///
/// Each call to [`SubUnits::next`] hands over ownership of one unit; the
/// sequence cannot be restarted. Open handles are released once the
/// sequence is exhausted, after the first error, or when it is dropped.
pub struct SubUnits {
    source: Source,
}

enum Source {
    Buffered(std::vec::IntoIter<SubUnit>),
    Chunked(ChunkedReader),
    Archive(ArchiveMembers),
}

impl SubUnits {
    pub async fn next(&mut self) -> Option<Result<SubUnit, HandlerError>> {
        match &mut self.source {
            Source::Buffered(units) => units.next().map(Ok),
            Source::Chunked(reader) => reader.next().await,
            Source::Archive(members) => members.next(),
        }
    }

    /// Drain the remaining units, stopping at the first error
    pub async fn collect(mut self) -> Result<Vec<SubUnit>, HandlerError> {
        let mut units = Vec::new();
        while let Some(unit) = self.next().await {
            units.push(unit?);
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::archive::tests::build_zip;
    use encoding_rs::WINDOWS_1252;

    async fn storage_with(location: &str, data: &[u8]) -> StorageClient {
        let storage = StorageClient::in_memory();
        storage.write(location, data.to_vec()).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_basic_yields_single_text_unit() {
        let storage = storage_with("memory://in.csv", b"a,b\n1,2\n").await;

        let units = FileHandler::basic()
            .open(&storage, "memory://in.csv")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units, vec![SubUnit::text("a,b\n1,2\n")]);
    }

    #[tokio::test]
    async fn test_basic_with_latin1() {
        let storage = storage_with("memory://in.csv", b"price\n\xa310\n").await;

        let handler = FileHandler::basic().with_encoding("latin1").unwrap();
        let units = handler
            .open(&storage, "memory://in.csv")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units[0].as_text(), Some("price\n£10\n"));
        assert_eq!(handler.encoding(), Some(WINDOWS_1252));
    }

    #[tokio::test]
    async fn test_basic_decode_error_is_not_inferred() {
        let storage = storage_with("memory://in.csv", b"caf\xe9 cr\xe8me br\xfbl\xe9e\n").await;

        let result = FileHandler::basic().open(&storage, "memory://in.csv").await;

        assert!(matches!(result, Err(HandlerError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_propagates_storage_error() {
        let storage = StorageClient::in_memory();

        let result = FileHandler::basic().open(&storage, "memory://nope.csv").await;

        assert!(matches!(
            result,
            Err(HandlerError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_separated_splits_on_marker() {
        let input = format!("A\n{}\nB\n", default_separator());
        let storage = storage_with("memory://report.txt", input.as_bytes()).await;

        let units = FileHandler::separated()
            .open(&storage, "memory://report.txt")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units, vec![SubUnit::text("A"), SubUnit::text("B")]);
    }

    #[tokio::test]
    async fn test_separated_skips_blank_segments() {
        let input = "--\none\n--\n  \n--\ntwo\n--\n";
        let storage = storage_with("memory://report.txt", input.as_bytes()).await;

        let units = FileHandler::separated_by("--")
            .open(&storage, "memory://report.txt")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units, vec![SubUnit::text("one"), SubUnit::text("two")]);
    }

    #[tokio::test]
    async fn test_chunked_roundtrip_through_storage() {
        let input = "h1,h2\nr1,x\nr2,y\nr3,z\n";
        let storage = storage_with("memory://big.csv", input.as_bytes()).await;

        let units = FileHandler::chunked(7)
            .open(&storage, "memory://big.csv")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert!(units.len() > 1);
        let joined: String = units.iter().filter_map(SubUnit::as_text).collect();
        assert_eq!(joined, input);
    }

    #[tokio::test]
    async fn test_zip_matching_pattern() {
        let data = build_zip(&[("a.csv", b"x\n1\n"), ("b.txt", b"ignored")]);
        let storage = storage_with("memory://bundle.zip", &data).await;

        let units = FileHandler::zip_matching(r".*\.csv$")
            .unwrap()
            .open(&storage, "memory://bundle.zip")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), Some("a.csv"));
    }

    #[tokio::test]
    async fn test_zip_pattern_anchored_at_start() {
        let data = build_zip(&[("data/a.csv", b"1"), ("a.csv", b"2")]);
        let storage = storage_with("memory://bundle.zip", &data).await;

        let units = FileHandler::zip_matching(r"a\.csv")
            .unwrap()
            .open(&storage, "memory://bundle.zip")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), Some("a.csv"));
    }

    #[tokio::test]
    async fn test_zip_binary_members() {
        let data = build_zip(&[("raw.bin", &[0x00, 0xff])]);
        let storage = storage_with("memory://bundle.zip", &data).await;

        let units = FileHandler::zip()
            .binary_members()
            .open(&storage, "memory://bundle.zip")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert!(units[0].is_binary());
        assert_eq!(units[0].name(), Some("raw.bin"));
    }

    #[tokio::test]
    async fn test_binary_yields_raw_bytes() {
        let storage = storage_with("memory://blob", &[0xde, 0xad, 0xbe, 0xef]).await;

        let units = FileHandler::binary()
            .open(&storage, "memory://blob")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(units, vec![SubUnit::binary(vec![0xde, 0xad, 0xbe, 0xef])]);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            FileHandler::zip_matching("("),
            Err(HandlerError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_binary_ignores_encoding() {
        let handler = FileHandler::binary().with_encoding("latin1").unwrap();
        assert_eq!(handler.encoding(), None);
        assert_eq!(handler.kind(), "binary");
    }

    #[test]
    fn test_default_separator_shape() {
        let separator = default_separator();
        assert_eq!(separator.len(), 119);
        assert!(separator.starts_with(&"#".repeat(114)));
        assert!(separator.ends_with("CHUNK"));
    }
}
