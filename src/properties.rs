//! Core properties: the Dublin Core and OPC metadata of a package.
//!
//! The core properties part is located at a caller-chosen part name
//! (default `/props/core.xml`) and linked from the package root by a
//! relationship of the well-known core properties type. Date values are
//! carried as W3CDTF strings and written with an
//! `xsi:type="dcterms:W3CDTF"` attribute.

use crate::constants::DEFAULT_CORE_PROPERTIES_URI;
use crate::error::{OpcError, Result};
use crate::xmlutil::{escape_xml, read_element_text};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Package metadata following the Dublin Core standard and its OPC
/// extensions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreProperties {
    /// Categorization of the content (e.g. "Letter", "Financial").
    pub category: Option<String>,
    /// Status of the content (e.g. "Draft", "Final").
    pub content_status: Option<String>,
    /// Creation date, as a W3CDTF string.
    pub created: Option<String>,
    /// Entity primarily responsible for making the content.
    pub creator: Option<String>,
    /// Explanation of the content.
    pub description: Option<String>,
    /// Unambiguous reference to the resource within a given context.
    pub identifier: Option<String>,
    /// Delimited set of keywords supporting search and indexing.
    pub keywords: Option<String>,
    /// Language of the intellectual content.
    pub language: Option<String>,
    /// User who performed the last modification.
    pub last_modified_by: Option<String>,
    /// Date of the last printing, as a W3CDTF string.
    pub last_printed: Option<String>,
    /// Modification date, as a W3CDTF string.
    pub modified: Option<String>,
    /// Revision number.
    pub revision: Option<String>,
    /// Topic of the content.
    pub subject: Option<String>,
    /// Name given to the resource.
    pub title: Option<String>,
    /// Version designator.
    pub version: Option<String>,

    /// Part name the properties are stored at. Defaults to
    /// `/props/core.xml` when unset.
    pub part_name: Option<String>,

    /// ID for the package relationship pointing at the properties part.
    /// Synthesized when unset.
    pub relationship_id: Option<String>,
}

impl CoreProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every metadata field is unset. The part name and
    /// relationship ID do not count as content.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v, _)| v.is_none())
    }

    /// The part name the properties will be stored at.
    pub fn part_uri(&self) -> String {
        match &self.part_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => DEFAULT_CORE_PROPERTIES_URI.to_string(),
        }
    }

    /// Serialize as a `coreProperties` document.
    pub fn encode(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(concat!(
            r#"<coreProperties xmlns="http://schemas.openxmlformats.org/package/2006/metadata/core-properties""#,
            r#" xmlns:dc="http://purl.org/dc/elements/1.1/""#,
            r#" xmlns:dcterms="http://purl.org/dc/terms/""#,
            r#" xmlns:dcmitype="http://purl.org/dc/dcmitype/""#,
            r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
        ));

        for (tag, value, is_date) in self.fields() {
            if let Some(value) = value {
                if is_date {
                    xml.push_str(&format!(
                        r#"<{tag} xsi:type="dcterms:W3CDTF">{}</{tag}>"#,
                        escape_xml(value)
                    ));
                } else {
                    xml.push_str(&format!("<{tag}>{}</{tag}>", escape_xml(value)));
                }
            }
        }

        xml.push_str("</coreProperties>");
        xml
    }

    /// Parse a `coreProperties` document. Elements are matched by local
    /// name so any namespace prefixes are accepted.
    pub fn decode(xml: &[u8]) -> Result<Self> {
        let mut props = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let field = match e.local_name().as_ref() {
                        b"category" => Some(&mut props.category),
                        b"contentStatus" => Some(&mut props.content_status),
                        b"created" => Some(&mut props.created),
                        b"creator" => Some(&mut props.creator),
                        b"description" => Some(&mut props.description),
                        b"identifier" => Some(&mut props.identifier),
                        b"keywords" => Some(&mut props.keywords),
                        b"language" => Some(&mut props.language),
                        b"lastModifiedBy" => Some(&mut props.last_modified_by),
                        b"lastPrinted" => Some(&mut props.last_printed),
                        b"modified" => Some(&mut props.modified),
                        b"revision" => Some(&mut props.revision),
                        b"subject" => Some(&mut props.subject),
                        b"title" => Some(&mut props.title),
                        b"version" => Some(&mut props.version),
                        _ => None,
                    };
                    if let Some(field) = field {
                        let mut inner = Vec::new();
                        *field = Some(read_element_text(&mut reader, &mut inner)?);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::Xml(format!("core properties parse error: {e}")));
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(props)
    }

    /// The metadata fields with their element names, in document order.
    fn fields(&self) -> [(&'static str, &Option<String>, bool); 15] {
        [
            ("dc:title", &self.title, false),
            ("dc:subject", &self.subject, false),
            ("dc:creator", &self.creator, false),
            ("keywords", &self.keywords, false),
            ("dc:description", &self.description, false),
            ("lastModifiedBy", &self.last_modified_by, false),
            ("revision", &self.revision, false),
            ("dc:language", &self.language, false),
            ("dc:identifier", &self.identifier, false),
            ("category", &self.category, false),
            ("contentStatus", &self.content_status, false),
            ("version", &self.version, false),
            ("dcterms:created", &self.created, true),
            ("dcterms:modified", &self.modified, true),
            ("lastPrinted", &self.last_printed, true),
        ]
    }
}
