//! Relationship objects for OPC packages.
//!
//! A relationship expresses a directed, typed link from a source (a part or
//! the package itself) to a target part or external resource. Relationships
//! are serialized into `.rels` sidecar parts located by naming convention
//! next to their source.

use crate::error::Violation;
use crate::packuri::resolve_relationship;
use crate::xmlutil::escape_xml;
use quick_xml::events::Event;
use quick_xml::Reader;
use rand::Rng;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Target mode of a relationship.
///
/// Internal targets point to a part within the package and must be
/// relative; external targets point outside the package and may be
/// absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

/// A relationship between a source and a target.
///
/// The ID must be unique within the owning source. A target of the
/// relationship need not be present in the package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Relationship {
    /// Relationship ID, unique within the owning source.
    pub id: String,

    /// Relationship type URI.
    pub rel_type: String,

    /// Target reference, a relative part reference or an external URI.
    pub target_uri: String,

    /// Whether the target is inside or outside the package.
    pub target_mode: TargetMode,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        rel_type: impl Into<String>,
        target_uri: impl Into<String>,
        target_mode: TargetMode,
    ) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            target_uri: target_uri.into(),
            target_mode,
        }
    }

    /// Validate this relationship against the constraints of ISO/IEC
    /// 29500-2 §9.3, resolving internal targets against `source_uri`.
    pub fn validate(&self, source_uri: &str) -> Result<(), Violation> {
        if self.id.trim().is_empty() {
            return Err(Violation::with_relationship(126, source_uri, self.id.as_str()));
        }
        if self.rel_type.trim().is_empty() {
            return Err(Violation::with_relationship(127, source_uri, self.id.as_str()));
        }
        let target = self.target_uri.trim();
        if target.is_empty() || !is_uri_reference(target) {
            return Err(Violation::with_relationship(128, source_uri, self.id.as_str()));
        }
        if self.target_mode == TargetMode::Internal {
            if has_scheme(target) {
                return Err(Violation::with_relationship(129, source_uri, self.id.as_str()));
            }
            if is_relationship_uri(&resolve_relationship(source_uri, target)) {
                return Err(Violation::with_relationship(125, source_uri, self.id.as_str()));
            }
        }
        Ok(())
    }
}

/// Validate every relationship in a collection and the uniqueness of their
/// IDs within it.
pub fn validate_relationships(rels: &[Relationship], source_uri: &str) -> Result<(), Violation> {
    let mut ids = HashSet::with_capacity(rels.len());
    for rel in rels {
        rel.validate(source_uri)?;
        if !ids.insert(rel.id.as_str()) {
            return Err(Violation::with_relationship(126, source_uri, rel.id.as_str()));
        }
    }
    Ok(())
}

/// Fill in empty relationship IDs with random 8-character alphanumeric
/// strings, avoiding collisions with the IDs already present.
pub(crate) fn ensure_relationship_ids(rels: &mut [Relationship], rng: &mut impl Rng) {
    let mut used: HashSet<String> = rels.iter().map(|r| r.id.clone()).collect();
    for rel in rels.iter_mut().filter(|r| r.id.is_empty()) {
        loop {
            let id: String = (0..8)
                .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
                .collect();
            if used.insert(id.clone()) {
                rel.id = id;
                break;
            }
        }
    }
}

/// Serialize a relationship collection as a `.rels` document.
///
/// `TargetMode` is omitted for internal relationships. Internal targets
/// lacking a leading `/`, `\` or `.` are given a `/` prefix at encode
/// time.
pub(crate) fn encode_relationships(rels: &[Relationship]) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\n');
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    xml.push('\n');

    for rel in rels {
        let target = if rel.target_mode == TargetMode::Internal
            && !rel.target_uri.starts_with(['/', '\\', '.'])
        {
            format!("/{}", rel.target_uri)
        } else {
            rel.target_uri.clone()
        };
        let target_mode = match rel.target_mode {
            TargetMode::Internal => "",
            TargetMode::External => r#" TargetMode="External""#,
        };
        xml.push_str(&format!(
            "  <Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"{}/>\n",
            escape_xml(&rel.id),
            escape_xml(&rel.rel_type),
            escape_xml(&target),
            target_mode
        ));
    }

    xml.push_str("</Relationships>");
    xml
}

/// Parse a `.rels` document. Missing or unknown target modes default to
/// Internal.
pub(crate) fn decode_relationships(
    xml: &[u8],
) -> crate::error::Result<SmallVec<[Relationship; 8]>> {
    let mut rels = SmallVec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut rel = Relationship::default();
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Id" => rel.id = attr.unescape_value()?.to_string(),
                            b"Type" => rel.rel_type = attr.unescape_value()?.to_string(),
                            b"Target" => rel.target_uri = attr.unescape_value()?.to_string(),
                            b"TargetMode" => {
                                if attr.unescape_value()?.as_ref()
                                    == crate::constants::target_mode::EXTERNAL
                                {
                                    rel.target_mode = TargetMode::External;
                                }
                            }
                            _ => {}
                        }
                    }
                    rels.push(rel);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(crate::error::OpcError::Xml(format!(
                    "relationships parse error: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Whether a name points to a relationships part: `/_rels/.rels` or any
/// `**/_rels/*.rels`, compared case-insensitively.
pub fn is_relationship_uri(uri: &str) -> bool {
    let up = uri.to_uppercase();
    if !up.ends_with(".RELS") {
        return false;
    }
    if up == "/_RELS/.RELS" {
        return true;
    }
    let segments: Vec<&str> = up.split('/').collect();
    let ls = segments.len();
    ls >= 3 && segments[ls - 1].len() > ".RELS".len() && segments[ls - 2] == "_RELS"
}

/// Target references must at least be URI references: no control
/// characters, percent escapes well formed.
fn is_uri_reference(target: &str) -> bool {
    let bytes = target.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_control() {
            return false;
        }
        if b == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Whether a URI reference carries a scheme, which makes it absolute.
fn has_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for c in chars {
        match c {
            ':' => return true,
            c if c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.') => {}
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rel(id: &str, target: &str, mode: TargetMode) -> Relationship {
        Relationship::new(id, "http://example.com/rel", target, mode)
    }

    #[test]
    fn test_validate_ok() {
        assert!(rel("rId1", "/b.xml", TargetMode::Internal)
            .validate("/a.xml")
            .is_ok());
        assert!(rel("rId1", "b.xml", TargetMode::Internal)
            .validate("/a.xml")
            .is_ok());
        assert!(rel("rId1", "http://example.com/", TargetMode::External)
            .validate("/a.xml")
            .is_ok());
    }

    #[test]
    fn test_validate_blank_id_is_126() {
        let err = rel("  ", "/b.xml", TargetMode::Internal)
            .validate("/a.xml")
            .unwrap_err();
        assert_eq!(err.code(), 126);
    }

    #[test]
    fn test_validate_blank_type_is_127() {
        let r = Relationship::new("rId1", " ", "/b.xml", TargetMode::Internal);
        assert_eq!(r.validate("/a.xml").unwrap_err().code(), 127);
    }

    #[test]
    fn test_validate_bad_target_is_128() {
        for target in ["", "  ", "/b%zz.xml", "/b\u{1}.xml"] {
            let err = rel("rId1", target, TargetMode::Internal)
                .validate("/a.xml")
                .unwrap_err();
            assert_eq!(err.code(), 128, "{target:?}");
        }
    }

    #[test]
    fn test_validate_absolute_internal_is_129() {
        let err = rel("rId1", "http://e.com/b.xml", TargetMode::Internal)
            .validate("/a.xml")
            .unwrap_err();
        assert_eq!(err.code(), 129);
        assert_eq!(err.relationship_id(), Some("rId1"));
    }

    #[test]
    fn test_validate_rels_target_is_125() {
        let err = rel("rId1", "/_rels/.rels", TargetMode::Internal)
            .validate("/")
            .unwrap_err();
        assert_eq!(err.code(), 125);

        let err = rel("rId1", "_rels/doc.xml.rels", TargetMode::Internal)
            .validate("/doc.xml")
            .unwrap_err();
        assert_eq!(err.code(), 125);

        // an external target may look like a rels part
        assert!(rel("rId1", "/_rels/.rels", TargetMode::External)
            .validate("/")
            .is_ok());
    }

    #[test]
    fn test_validate_collection_duplicate_id_is_126() {
        let rels = vec![
            rel("rId1", "/b.xml", TargetMode::Internal),
            rel("rId1", "/c.xml", TargetMode::Internal),
        ];
        let err = validate_relationships(&rels, "/a.xml").unwrap_err();
        assert_eq!(err.code(), 126);
        assert_eq!(err.relationship_id(), Some("rId1"));
    }

    #[test]
    fn test_ensure_relationship_ids_deterministic() {
        let mut a = vec![
            rel("", "/b.xml", TargetMode::Internal),
            rel("fixed", "/c.xml", TargetMode::Internal),
            rel("", "/d.xml", TargetMode::Internal),
        ];
        let mut b = a.clone();

        let mut rng = StdRng::seed_from_u64(42);
        ensure_relationship_ids(&mut a, &mut rng);
        let mut rng = StdRng::seed_from_u64(42);
        ensure_relationship_ids(&mut b, &mut rng);

        assert_eq!(a, b);
        assert_eq!(a[1].id, "fixed");
        assert_eq!(a[0].id.len(), 8);
        assert!(a[0].id.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(a[0].id, a[2].id);
    }

    #[test]
    fn test_encode() {
        let rels = vec![
            rel("rId1", "b.xml", TargetMode::Internal),
            rel("rId2", "http://example.com/", TargetMode::External),
            rel("rId3", "../c.xml", TargetMode::Internal),
        ];
        let xml = encode_relationships(&rels);
        assert!(xml.contains(
            r#"<Relationship Id="rId1" Type="http://example.com/rel" Target="/b.xml"/>"#
        ));
        assert!(xml.contains(
            r#"<Relationship Id="rId2" Type="http://example.com/rel" Target="http://example.com/" TargetMode="External"/>"#
        ));
        assert!(xml.contains(r#"Target="../c.xml"/>"#));
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(xml.ends_with("</Relationships>"));
    }

    #[test]
    fn test_decode() {
        let xml = br#"<?xml version="1.0"?>
            <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="t1" Target="word/document.xml"/>
                <Relationship Id="rId2" Type="t2" Target="http://example.com/" TargetMode="External"/>
                <Relationship Id="rId3" Type="t3" Target="b.xml" TargetMode="Bogus"/>
            </Relationships>"#;
        let rels = decode_relationships(xml).unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[0].id, "rId1");
        assert_eq!(rels[0].target_mode, TargetMode::Internal);
        assert_eq!(rels[1].target_mode, TargetMode::External);
        // unknown mode strings default to Internal
        assert_eq!(rels[2].target_mode, TargetMode::Internal);
    }

    #[test]
    fn test_is_relationship_uri() {
        assert!(is_relationship_uri("/_rels/.rels"));
        assert!(is_relationship_uri("/_RELS/.RELS"));
        assert!(is_relationship_uri("/word/_rels/document.xml.rels"));
        assert!(is_relationship_uri("/_rels/doc.xml.rels"));
        assert!(!is_relationship_uri("/word/document.xml"));
        assert!(!is_relationship_uri("/b.rels"));
        assert!(!is_relationship_uri("/word/rels/document.xml.rels"));
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("http://example.com"));
        assert!(has_scheme("mailto:a@b.com"));
        assert!(!has_scheme("/a.xml"));
        assert!(!has_scheme("a/b:c"));
        assert!(!has_scheme("./a.xml"));
        assert!(!has_scheme("3fa:x"));
    }
}
