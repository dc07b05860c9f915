//! Streaming OPC package reader.
//!
//! Loading discovers the package sidecars first: the content types stream
//! and every relationships part. A second pass then assembles the files,
//! each carrying its part metadata and attached relationships, and
//! decodes the core properties part when the package links one.

use crate::constants::relationship_type;
use crate::content_types::ContentTypes;
use crate::error::{OpcError, Result, Violation};
use crate::package::Package;
use crate::packuri::{normalize_part_name, resolve_relationship, CONTENT_TYPES_URI};
use crate::part::Part;
use crate::properties::CoreProperties;
use crate::rel::{
    decode_relationships, is_relationship_uri, validate_relationships, Relationship, TargetMode,
};
use log::{debug, trace};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use zip::ZipArchive;

/// A part loaded from a package, with its bytes and attached
/// relationships.
///
/// The part metadata is reachable through deref: `file.name`,
/// `file.content_type`, `file.relationships`.
#[derive(Debug, Clone)]
pub struct File {
    part: Part,
    blob: Arc<[u8]>,
}

impl File {
    /// The part metadata carried by this file.
    pub fn part(&self) -> &Part {
        &self.part
    }

    /// Open the file's bytes for reading. Files may be opened any number
    /// of times, concurrently.
    pub fn open(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.blob)
    }

    /// Uncompressed size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.blob.len() as u64
    }
}

impl std::ops::Deref for File {
    type Target = Part;

    fn deref(&self) -> &Part {
        &self.part
    }
}

/// An OPC package reader.
///
/// ```no_run
/// # fn main() -> openpack::Result<()> {
/// let reader = openpack::PackageReader::open("document.docx")?;
/// for file in reader.files() {
///     println!("{} ({})", file.name, file.content_type);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PackageReader {
    files: Vec<File>,
    relationships: Vec<Relationship>,
    properties: CoreProperties,
    pkg: Package,
}

impl PackageReader {
    /// Open an OPC package from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }
        Self::new(std::fs::File::open(path)?)
    }

    /// Read an OPC package from a random access source.
    pub fn new<R: Read + Seek>(source: R) -> Result<Self> {
        let mut archive = ZipArchive::new(source)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            entries.push((entry.name().to_string(), bytes));
        }
        Self::load(entries)
    }

    fn load(entries: Vec<(String, Vec<u8>)>) -> Result<Self> {
        // first pass: content types and relationship sidecars
        let mut content_types: Option<ContentTypes> = None;
        let mut rels_by_owner: HashMap<String, SmallVec<[Relationship; 8]>> = HashMap::new();
        let mut pkg_rels: Vec<Relationship> = Vec::new();

        for (name, bytes) in &entries {
            let part_name = format!("/{name}");
            if part_name.eq_ignore_ascii_case(CONTENT_TYPES_URI) {
                content_types = Some(ContentTypes::decode(bytes, false)?);
            } else if is_relationship_uri(&part_name) {
                let rels = decode_relationships(bytes)?;
                trace!("decoded {} relationships from {part_name}", rels.len());
                match rels_owner(&part_name) {
                    Some(owner) if owner == "/" => {
                        validate_relationships(&rels, "/")?;
                        pkg_rels = rels.into_vec();
                    }
                    Some(owner) => {
                        validate_relationships(&rels, &owner)?;
                        rels_by_owner.insert(owner.to_uppercase(), rels);
                    }
                    None => {}
                }
            }
        }

        let content_types =
            content_types.ok_or_else(|| Violation::new(310, CONTENT_TYPES_URI))?;

        // core properties discovery through the package relationships
        let mut core_upper = None;
        let mut core_rel_id = None;
        for rel in &pkg_rels {
            if rel.rel_type == relationship_type::CORE_PROPERTIES
                && rel.target_mode == TargetMode::Internal
            {
                let resolved = normalize_part_name(&resolve_relationship("/", &rel.target_uri));
                core_upper = Some(resolved.to_uppercase());
                core_rel_id = Some(rel.id.clone());
                break;
            }
        }

        // second pass: resolve every part's content type, then build the
        // package so dictionary updates cannot influence later lookups
        let mut properties = CoreProperties::new();
        let mut pending = Vec::with_capacity(entries.len());
        for (name, bytes) in entries {
            let part_name = format!("/{name}");
            if part_name.eq_ignore_ascii_case(CONTENT_TYPES_URI)
                || is_relationship_uri(&part_name)
            {
                continue;
            }
            if Some(part_name.to_uppercase()) == core_upper {
                properties = CoreProperties::decode(&bytes)?;
                properties.part_name = Some(part_name);
                properties.relationship_id = core_rel_id.clone();
                continue;
            }
            let content_type = content_types.find_type(&part_name)?;
            pending.push((part_name, content_type, bytes));
        }

        let mut pkg = Package::new();
        let mut files = Vec::with_capacity(pending.len());
        for (part_name, content_type, bytes) in pending {
            let relationships = rels_by_owner
                .remove(&part_name.to_uppercase())
                .map(SmallVec::into_vec)
                .unwrap_or_default();
            let part = Part {
                name: part_name,
                content_type,
                relationships,
            };
            pkg.add(part.clone())?;
            files.push(File {
                part,
                blob: bytes.into(),
            });
        }

        debug!(
            "loaded package: {} parts, {} package relationships",
            files.len(),
            pkg_rels.len()
        );
        Ok(Self {
            files,
            relationships: pkg_rels,
            properties,
            pkg,
        })
    }

    /// The files of the package, excluding the package sidecars and the
    /// core properties part.
    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// The package-level relationships.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// The package's core properties. Empty when the package does not
    /// link a core properties part.
    pub fn properties(&self) -> &CoreProperties {
        &self.properties
    }

    /// Number of parts in the package.
    pub fn len(&self) -> usize {
        self.pkg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pkg.is_empty()
    }
}

/// The part owning a relationships sidecar: `/a/b/_rels/foo.xml.rels`
/// belongs to `/a/b/foo.xml`, `/_rels/.rels` to the package itself.
fn rels_owner(rels_name: &str) -> Option<String> {
    if rels_name.eq_ignore_ascii_case("/_rels/.rels") {
        return Some("/".to_string());
    }
    let slash = rels_name.rfind('/')?;
    let (dir, filename) = (&rels_name[..slash], &rels_name[slash + 1..]);
    let stem = strip_suffix_ci(filename, ".rels")?;
    let owner_dir = strip_suffix_ci(dir, "/_rels")?;
    Some(format!("{owner_dir}/{stem}"))
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() >= suffix.len() && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix) {
        Some(&s[..s.len() - suffix.len()])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap()
    }

    const TYPES: &[u8] = br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
</Types>"#;

    #[test]
    fn test_load_minimal_package() {
        let mut source = build_zip(&[
            ("[Content_Types].xml", TYPES),
            ("word/document.xml", b"<document/>"),
        ]);
        source.set_position(0);
        let reader = PackageReader::new(source).unwrap();

        assert_eq!(reader.files().len(), 1);
        let file = &reader.files()[0];
        assert_eq!(file.name, "/word/document.xml");
        assert_eq!(file.content_type, "application/xml");
        assert_eq!(file.size(), 11);

        let mut body = String::new();
        file.open().read_to_string(&mut body).unwrap();
        assert_eq!(body, "<document/>");
    }

    #[test]
    fn test_missing_content_types_is_310() {
        let mut source = build_zip(&[("word/document.xml", b"<document/>")]);
        source.set_position(0);
        let err = PackageReader::new(source).unwrap_err();
        assert_eq!(err.code(), Some(310));
    }

    #[test]
    fn test_part_without_content_type_is_208() {
        let mut source = build_zip(&[
            ("[Content_Types].xml", TYPES),
            ("media/image.png", b"\x89PNG"),
        ]);
        source.set_position(0);
        let err = PackageReader::new(source).unwrap_err();
        assert_eq!(err.code(), Some(208));
    }

    #[test]
    fn test_relationships_attached_to_owner() {
        let rels = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId1" Type="http://example.com/styles" Target="styles.xml"/>
        </Relationships>"#;
        let mut source = build_zip(&[
            ("[Content_Types].xml", TYPES),
            ("word/document.xml", b"<document/>"),
            ("word/_rels/document.xml.rels", rels),
            ("word/styles.xml", b"<styles/>"),
        ]);
        source.set_position(0);
        let reader = PackageReader::new(source).unwrap();

        let doc = reader
            .files()
            .iter()
            .find(|f| f.name == "/word/document.xml")
            .unwrap();
        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].id, "rId1");
        assert_eq!(doc.relationships[0].target_uri, "styles.xml");

        // the sidecar itself is not a file
        assert!(reader
            .files()
            .iter()
            .all(|f| !f.name.contains("_rels")));
    }

    #[test]
    fn test_package_relationships_and_core_properties() {
        let pkg_rels = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId5" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="props/core.xml"/>
        </Relationships>"#;
        let core = br#"<coreProperties xmlns="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
            xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></coreProperties>"#;
        let mut source = build_zip(&[
            ("[Content_Types].xml", TYPES),
            ("_rels/.rels", pkg_rels),
            ("props/core.xml", core),
        ]);
        source.set_position(0);
        let reader = PackageReader::new(source).unwrap();

        assert_eq!(reader.relationships().len(), 1);
        assert_eq!(reader.properties().title.as_deref(), Some("T"));
        assert_eq!(
            reader.properties().part_name.as_deref(),
            Some("/props/core.xml")
        );
        assert_eq!(reader.properties().relationship_id.as_deref(), Some("rId5"));
        // the core properties part is not listed among the files
        assert!(reader.files().is_empty());
    }

    #[test]
    fn test_equivalent_part_names_abort_load() {
        let mut source = build_zip(&[
            ("[Content_Types].xml", TYPES),
            ("a.xml", b"<a/>"),
            ("A.XML", b"<a/>"),
        ]);
        source.set_position(0);
        let err = PackageReader::new(source).unwrap_err();
        assert_eq!(err.code(), Some(112));
    }

    #[test]
    fn test_rels_owner() {
        assert_eq!(rels_owner("/_rels/.rels").as_deref(), Some("/"));
        assert_eq!(
            rels_owner("/word/_rels/document.xml.rels").as_deref(),
            Some("/word/document.xml")
        );
        assert_eq!(
            rels_owner("/_rels/doc.xml.rels").as_deref(),
            Some("/doc.xml")
        );
        assert_eq!(rels_owner("/word/document.xml"), None);
    }
}
