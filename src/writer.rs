//! Streaming OPC package writer.
//!
//! The writer emits parts in the order the caller creates them. A part's
//! relationships sidecar is deferred until the next part is created (or
//! the writer is closed), so the caller may keep populating the pending
//! part's relationships up to that point. On close the package-level
//! sidecars are emitted, the content types stream last.

use crate::constants::{content_type, relationship_type, PACKAGE_RELS_URI};
use crate::error::Result;
use crate::package::Package;
use crate::packuri::PackUri;
use crate::part::{CompressionOption, Part};
use crate::properties::CoreProperties;
use crate::reader::PackageReader;
use crate::rel::{
    encode_relationships, ensure_relationship_ids, validate_relationships, Relationship,
    TargetMode,
};
use chrono::{Datelike, Local, Timelike};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An OPC package writer.
///
/// Parts are created with [`create`] or [`create_part`] and their bodies
/// written through the writer's [`std::io::Write`] implementation. The
/// body must be fully written before the next create call or
/// [`close`].
///
/// [`create`]: PackageWriter::create
/// [`create_part`]: PackageWriter::create_part
/// [`close`]: PackageWriter::close
///
/// ```no_run
/// use std::io::{Cursor, Write};
/// use openpack::{PackageWriter, Part};
///
/// # fn main() -> openpack::Result<()> {
/// let mut w = PackageWriter::new(Cursor::new(Vec::new()));
/// w.create("/docs/hello.xml", "text/xml")?;
/// w.write_all(b"<hello/>")?;
/// w.close()?;
/// # Ok(())
/// # }
/// ```
pub struct PackageWriter<W: Write + Seek> {
    pkg: Package,
    zip: ZipWriter<W>,
    last: Option<String>,

    /// Core properties to emit on close, when any field is set.
    pub properties: CoreProperties,

    /// Package-level relationships, emitted at `/_rels/.rels` on close.
    /// Empty IDs are synthesized before encoding.
    pub relationships: Vec<Relationship>,

    rng: StdRng,
}

impl<W: Write + Seek> PackageWriter<W> {
    /// Create a writer emitting an OPC package to `sink`. The sink is not
    /// closed by the writer.
    pub fn new(sink: W) -> Self {
        Self::with_rng(sink, StdRng::from_os_rng())
    }

    /// Like [`new`](PackageWriter::new) but with a caller-provided RNG for
    /// relationship ID synthesis, so IDs are reproducible from a seed.
    pub fn with_rng(sink: W, rng: StdRng) -> Self {
        Self {
            pkg: Package::new(),
            zip: ZipWriter::new(sink),
            last: None,
            properties: CoreProperties::new(),
            relationships: Vec::new(),
            rng,
        }
    }

    /// Create a writer seeded with the core properties and package
    /// relationships of an existing reader, for round-tripping a package
    /// into a new archive.
    pub fn from_reader(sink: W, reader: &PackageReader) -> Self {
        let mut writer = Self::new(sink);
        writer.properties = reader.properties().clone();
        // the core properties relationship is re-created when the
        // properties are emitted on close
        writer.relationships = reader
            .relationships()
            .iter()
            .filter(|r| r.rel_type != relationship_type::CORE_PROPERTIES)
            .cloned()
            .collect();
        writer
    }

    /// Add a part with the given name and content type, compressed with
    /// the Deflate default method. The part's bytes are then written
    /// through the writer.
    ///
    /// The name must be a conformant part name; use
    /// [`normalize_part_name`](crate::packuri::normalize_part_name) first
    /// for arbitrary input.
    pub fn create(&mut self, name: impl Into<String>, content_type: impl Into<String>) -> Result<()> {
        self.create_part(
            Part::new(name, content_type),
            CompressionOption::Normal,
        )
    }

    /// Add a part to the package.
    ///
    /// The previous part's relationships sidecar is emitted first; from
    /// that moment the previous part is immutable. The new part's
    /// relationships may keep growing through
    /// [`last_part_mut`](PackageWriter::last_part_mut) until the next
    /// create call or close.
    pub fn create_part(&mut self, part: Part, compression: CompressionOption) -> Result<()> {
        self.advance()?;
        let name = part.name.clone();
        self.pkg.add(part)?;
        if let Err(err) = self.start_entry(&name[1..], compression) {
            self.pkg.delete(&name);
            return Err(err);
        }
        trace!("created part {name}");
        self.last = Some(name);
        Ok(())
    }

    /// The most recently created part, still open for relationship
    /// additions. None before the first create call.
    pub fn last_part_mut(&mut self) -> Option<&mut Part> {
        match &self.last {
            Some(name) => self.pkg.part_mut(name),
            None => None,
        }
    }

    /// Finish writing the package: the trailing sidecar, the core
    /// properties, the package relationships and finally the content
    /// types stream. The underlying sink is not closed.
    ///
    /// The archive is finalized even when sidecar emission fails, in
    /// which case the first error is returned.
    pub fn close(mut self) -> Result<()> {
        let result = self.finalize();
        match self.zip.finish() {
            Ok(_) => result,
            Err(err) => result.and(Err(err.into())),
        }
    }

    fn finalize(&mut self) -> Result<()> {
        self.advance()?;
        if !self.properties.is_empty() {
            self.write_core_properties()?;
        }
        if !self.relationships.is_empty() {
            let mut rels = std::mem::take(&mut self.relationships);
            ensure_relationship_ids(&mut rels, &mut self.rng);
            validate_relationships(&rels, "/")?;
            self.write_rels_part(PACKAGE_RELS_URI, &rels)?;
            self.relationships = rels;
        }
        let types = self.pkg.content_types().encode();
        self.start_entry("[Content_Types].xml", CompressionOption::Normal)?;
        self.zip.write_all(types.as_bytes())?;
        debug!("finalized package with {} parts", self.pkg.len());
        Ok(())
    }

    /// Emit the pending part's relationships sidecar, if any, and clear
    /// the pending part.
    fn advance(&mut self) -> Result<()> {
        let Some(name) = self.last.take() else {
            return Ok(());
        };
        let rels = match self.pkg.part(&name) {
            Some(part) if !part.relationships.is_empty() => part.relationships.clone(),
            _ => return Ok(()),
        };
        validate_relationships(&rels, &name)?;
        let rels_uri = PackUri::new(name.as_str())?.rels_uri();
        self.write_rels_part(&rels_uri, &rels)
    }

    fn write_rels_part(&mut self, rels_uri: &str, rels: &[Relationship]) -> Result<()> {
        self.pkg
            .add(Part::new(rels_uri, content_type::RELATIONSHIPS))?;
        if let Err(err) = self.start_entry(&rels_uri[1..], CompressionOption::Normal) {
            self.pkg.delete(rels_uri);
            return Err(err);
        }
        let xml = encode_relationships(rels);
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn write_core_properties(&mut self) -> Result<()> {
        let name = self.properties.part_uri();
        self.pkg
            .add(Part::new(name.as_str(), content_type::CORE_PROPERTIES))?;
        if let Err(err) = self.start_entry(&name[1..], CompressionOption::Normal) {
            self.pkg.delete(&name);
            return Err(err);
        }
        let xml = self.properties.encode();
        self.zip.write_all(xml.as_bytes())?;
        self.relationships.push(Relationship::new(
            self.properties.relationship_id.clone().unwrap_or_default(),
            relationship_type::CORE_PROPERTIES,
            name,
            TargetMode::Internal,
        ));
        Ok(())
    }

    fn start_entry(&mut self, membername: &str, compression: CompressionOption) -> Result<()> {
        let now = Local::now().naive_local();
        let modified = zip::DateTime::from_date_and_time(
            now.year() as u16,
            now.month() as u8,
            now.day() as u8,
            now.hour() as u8,
            now.minute() as u8,
            now.second() as u8,
        )
        .unwrap_or_default();

        let options = SimpleFileOptions::default().last_modified_time(modified);
        let options = match compression {
            CompressionOption::None => options.compression_method(CompressionMethod::Stored),
            CompressionOption::Normal => options.compression_method(CompressionMethod::Deflated),
            CompressionOption::Maximum => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
            CompressionOption::Fast | CompressionOption::SuperFast => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(1)),
        };
        self.zip.start_file(membername, options)?;
        Ok(())
    }
}

/// Body bytes of the part most recently created are written through the
/// writer itself. `flush` propagates to the archive encoder without
/// emitting any package metadata, which is useful for simultaneous
/// writing and reading.
impl<W: Write + Seek> Write for PackageWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.zip.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.zip.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn entry_names(data: Vec<u8>) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn entry_bytes(data: Vec<u8>, name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_empty_package() {
        let mut sink = Cursor::new(Vec::new());
        let writer = PackageWriter::new(&mut sink);
        writer.close().unwrap();

        let names = entry_names(sink.into_inner());
        assert_eq!(names, vec!["[Content_Types].xml"]);
    }

    #[test]
    fn test_single_part_ordering() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        writer.create("/a.xml", "text/xml").unwrap();
        writer.write_all(b"<a/>").unwrap();
        writer.close().unwrap();

        let data = sink.into_inner();
        assert_eq!(
            entry_names(data.clone()),
            vec!["a.xml", "[Content_Types].xml"]
        );
        assert_eq!(entry_bytes(data, "a.xml"), b"<a/>");
    }

    #[test]
    fn test_sidecar_follows_part_body() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);

        let mut p1 = Part::new("/docs/a.xml", "text/xml");
        p1.relationships.push(Relationship::new(
            "rId1",
            "http://example.com/rel",
            "/docs/b.xml",
            TargetMode::Internal,
        ));
        writer.create_part(p1, CompressionOption::Normal).unwrap();
        writer.write_all(b"<a/>").unwrap();

        writer.create("/docs/b.xml", "text/xml").unwrap();
        writer.write_all(b"<b/>").unwrap();
        writer.close().unwrap();

        assert_eq!(
            entry_names(sink.into_inner()),
            vec![
                "docs/a.xml",
                "docs/_rels/a.xml.rels",
                "docs/b.xml",
                "[Content_Types].xml",
            ]
        );
    }

    #[test]
    fn test_relationships_added_after_create() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        writer.create("/a.xml", "text/xml").unwrap();
        writer.write_all(b"<a/>").unwrap();
        writer.last_part_mut().unwrap().relationships.push(
            Relationship::new("rId1", "t", "b.xml", TargetMode::Internal),
        );
        writer.close().unwrap();

        let data = sink.into_inner();
        let rels = entry_bytes(data, "_rels/a.xml.rels");
        let rels = String::from_utf8(rels).unwrap();
        assert!(rels.contains(r#"Target="/b.xml""#));
    }

    #[test]
    fn test_duplicate_part_is_112() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        writer.create("/a.xml", "text/xml").unwrap();
        writer.write_all(b"<a/>").unwrap();
        let err = writer.create("/A.xml", "text/xml").unwrap_err();
        assert_eq!(err.code(), Some(112));
    }

    #[test]
    fn test_invalid_relationships_fail_close() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        let mut part = Part::new("/a.xml", "text/xml");
        part.relationships.push(Relationship::new(
            "",
            "t",
            "/b.xml",
            TargetMode::Internal,
        ));
        writer.create_part(part, CompressionOption::Normal).unwrap();
        writer.write_all(b"<a/>").unwrap();
        let err = writer.close().unwrap_err();
        assert_eq!(err.code(), Some(126));
    }

    #[test]
    fn test_stored_compression() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        writer
            .create_part(
                Part::new("/blob.bin", "application/octet-stream"),
                CompressionOption::None,
            )
            .unwrap();
        writer.write_all(b"raw bytes").unwrap();
        writer.close().unwrap();

        let data = sink.into_inner();
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        let file = archive.by_name("blob.bin").unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Stored);
    }

    #[test]
    fn test_core_properties_and_package_rels() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        writer.properties.title = Some("T".to_string());
        writer.properties.relationship_id = Some("rId99".to_string());
        writer.close().unwrap();

        let data = sink.into_inner();
        let names = entry_names(data.clone());
        assert_eq!(
            names,
            vec!["props/core.xml", "_rels/.rels", "[Content_Types].xml"]
        );

        let rels = String::from_utf8(entry_bytes(data.clone(), "_rels/.rels")).unwrap();
        assert!(rels.contains(r#"Id="rId99""#));
        assert!(rels.contains("core-properties"));
        assert!(rels.contains(r#"Target="/props/core.xml""#));

        let types = String::from_utf8(entry_bytes(data, "[Content_Types].xml")).unwrap();
        assert!(types.contains("core-properties+xml"));
        assert!(types.contains("relationships+xml"));
    }

    #[test]
    fn test_seeded_rng_gives_reproducible_ids() {
        let run = || {
            let mut sink = Cursor::new(Vec::new());
            let mut writer =
                PackageWriter::with_rng(&mut sink, StdRng::seed_from_u64(7));
            writer.relationships.push(Relationship::new(
                "",
                "http://example.com/rel",
                "/a.xml",
                TargetMode::Internal,
            ));
            writer.create("/a.xml", "text/xml").unwrap();
            writer.write_all(b"<a/>").unwrap();
            writer.close().unwrap();
            String::from_utf8(entry_bytes(sink.into_inner(), "_rels/.rels")).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_content_types_stream_is_last() {
        let mut sink = Cursor::new(Vec::new());
        let mut writer = PackageWriter::new(&mut sink);
        writer.properties.creator = Some("x".to_string());
        writer.create("/z.xml", "text/xml").unwrap();
        writer.write_all(b"<z/>").unwrap();
        writer.close().unwrap();

        let names = entry_names(sink.into_inner());
        assert_eq!(names.last().map(String::as_str), Some("[Content_Types].xml"));
    }
}
