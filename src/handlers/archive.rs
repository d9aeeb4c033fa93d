use bytes::Bytes;
use encoding_rs::Encoding;
use regex::Regex;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::encoding;
use super::strategy::HandlerError;
use super::types::SubUnit;

/// Lazily reads matching members of an in-memory zip archive in listing order
pub(crate) struct ArchiveMembers {
    location: String,
    archive: Option<ZipArchive<Cursor<Bytes>>>,
    pending: std::vec::IntoIter<usize>,
    encoding: &'static Encoding,
    is_binary_file: bool,
}

impl ArchiveMembers {
    pub(crate) fn open(
        location: &str,
        data: Bytes,
        pattern: &Regex,
        encoding: &'static Encoding,
        is_binary_file: bool,
    ) -> Result<Self, HandlerError> {
        let mut archive =
            ZipArchive::new(Cursor::new(data)).map_err(|e| archive_error(location, e))?;

        let mut matching = Vec::new();
        for index in 0..archive.len() {
            let member = archive
                .by_index_raw(index)
                .map_err(|e| archive_error(location, e))?;
            if !member.is_dir() && pattern.is_match(member.name()) {
                matching.push(index);
            }
        }

        tracing::debug!(
            location,
            members = archive.len(),
            matching = matching.len(),
            "Opened archive"
        );

        Ok(Self {
            location: location.to_string(),
            archive: Some(archive),
            pending: matching.into_iter(),
            encoding,
            is_binary_file,
        })
    }

    pub(crate) fn next(&mut self) -> Option<Result<SubUnit, HandlerError>> {
        let archive = self.archive.as_mut()?;

        let Some(index) = self.pending.next() else {
            self.archive = None;
            return None;
        };

        let result = read_member(archive, index, &self.location).and_then(|(name, raw)| {
            if self.is_binary_file {
                Ok(SubUnit::binary(raw).named(name))
            } else {
                encoding::decode_or_infer(&raw, self.encoding, &name)
                    .map(|text| SubUnit::text(text).named(name))
            }
        });

        if result.is_err() {
            self.archive = None;
        }
        Some(result)
    }
}

fn read_member(
    archive: &mut ZipArchive<Cursor<Bytes>>,
    index: usize,
    location: &str,
) -> Result<(String, Vec<u8>), HandlerError> {
    let mut member = archive
        .by_index(index)
        .map_err(|e| archive_error(location, e))?;

    let name = member.name().to_string();
    let mut raw = Vec::with_capacity(member.size() as usize);
    member
        .read_to_end(&mut raw)
        .map_err(|e| archive_error(location, e.into()))?;

    tracing::debug!(location, member = %name, size = raw.len(), "Read archive member");

    Ok((name, raw))
}

fn archive_error(location: &str, source: zip::result::ZipError) -> HandlerError {
    HandlerError::Archive {
        location: location.to_string(),
        source,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use encoding_rs::{GBK, UTF_8, WINDOWS_1252};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a zip archive from (name, bytes) pairs
    pub(crate) fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn collect(mut members: ArchiveMembers) -> Vec<SubUnit> {
        let mut units = Vec::new();
        while let Some(unit) = members.next() {
            units.push(unit.unwrap());
        }
        units
    }

    #[test]
    fn test_pattern_filters_members() {
        let data = build_zip(&[("a.csv", b"x,y\n"), ("b.txt", b"notes")]);
        let pattern = Regex::new(r"^(?:.*\.csv$)").unwrap();

        let members =
            ArchiveMembers::open("memory://in.zip", data.into(), &pattern, UTF_8, false).unwrap();
        let units = collect(members);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), Some("a.csv"));
        assert_eq!(units[0].as_text(), Some("x,y\n"));
    }

    #[test]
    fn test_listing_order_preserved() {
        let data = build_zip(&[("z.csv", b"1"), ("a.csv", b"2"), ("m.csv", b"3")]);
        let pattern = Regex::new("^(?:.*)").unwrap();

        let members =
            ArchiveMembers::open("memory://in.zip", data.into(), &pattern, UTF_8, false).unwrap();
        let names: Vec<_> = collect(members)
            .into_iter()
            .map(|u| u.name.unwrap())
            .collect();

        assert_eq!(names, vec!["z.csv", "a.csv", "m.csv"]);
    }

    #[test]
    fn test_binary_members_are_untouched() {
        let data = build_zip(&[("image.bin", &[0xff, 0xd8, 0x00])]);
        let pattern = Regex::new("^(?:.*)").unwrap();

        let members =
            ArchiveMembers::open("memory://in.zip", data.into(), &pattern, UTF_8, true).unwrap();
        let units = collect(members);

        assert!(units[0].is_binary());
        assert_eq!(units[0].as_bytes(), &[0xff, 0xd8, 0x00]);
    }

    #[test]
    fn test_member_encoding_is_inferred() {
        let text = "Fromage affiné, crème fraîche et pâté de campagne pour le déjeuner.";
        let (encoded, _, _) = WINDOWS_1252.encode(text);
        let data = build_zip(&[("latin.csv", &encoded)]);
        let pattern = Regex::new("^(?:.*)").unwrap();

        let members =
            ArchiveMembers::open("memory://in.zip", data.into(), &pattern, UTF_8, false).unwrap();
        let units = collect(members);

        assert_eq!(units[0].as_text(), Some(text));
    }

    #[test]
    fn test_undecodable_member_is_indeterminate() {
        // Stray 0xFF in GBK text: the decoder rejects it, detection still says GBK
        let mut raw = vec![0xff];
        for _ in 0..80 {
            raw.extend_from_slice(b"\xb5\xc4");
        }
        let data = build_zip(&[
            ("ok.csv", b"a,b\n"),
            ("report.csv", raw.as_slice()),
            ("late.csv", b"c\n"),
        ]);
        let pattern = Regex::new("^(?:.*)").unwrap();

        let mut members =
            ArchiveMembers::open("memory://in.zip", data.into(), &pattern, GBK, false).unwrap();

        assert_eq!(members.next().unwrap().unwrap().as_text(), Some("a,b\n"));
        assert!(matches!(
            members.next(),
            Some(Err(HandlerError::EncodingIndeterminate { member })) if member == "report.csv"
        ));
        assert!(members.next().is_none());
    }

    #[test]
    fn test_not_a_zip() {
        let pattern = Regex::new("^(?:.*)").unwrap();
        let result = ArchiveMembers::open(
            "memory://in.zip",
            Bytes::from_static(b"plain text"),
            &pattern,
            UTF_8,
            false,
        );

        assert!(matches!(result, Err(HandlerError::Archive { .. })));
    }
}
