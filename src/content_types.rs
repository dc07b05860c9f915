//! The content types dictionary and its physical stream.
//!
//! Every part in a package has a content type, assigned either through a
//! `Default` entry keyed by file extension or an `Override` entry keyed by
//! part name. The dictionary is serialized as the `[Content_Types].xml`
//! stream, the last item written into the archive.

use crate::error::{OpcError, Result, Violation};
use crate::packuri::CONTENT_TYPES_URI;
use crate::xmlutil::escape_xml;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// Content type dictionary with `Default` and `Override` entries.
///
/// Lookup checks overrides first (case-insensitive on part name), then
/// defaults keyed by the part's file extension (lowercased, no leading
/// dot).
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    /// extension (lowercase) -> content type
    defaults: HashMap<String, String>,

    /// upper-cased part name -> (display part name, content type)
    overrides: HashMap<String, (String, String)>,
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a part's content type, following the Default/Override
    /// election process of ISO/IEC 29500-2 §10.1.2.3.
    ///
    /// The media type is canonicalized by parsing and re-serializing it.
    /// Parts without an extension always get an override; parts whose
    /// extension already maps to a different default get an override too.
    pub fn add(&mut self, part_name: &str, content_type: &str) -> std::result::Result<(), Violation> {
        if content_type.is_empty() {
            return Ok(());
        }
        let content_type = canonical_media_type(content_type)
            .ok_or_else(|| Violation::new(113, part_name))?;

        let ext = match extension_of(part_name) {
            Some(ext) => ext.to_lowercase(),
            None => {
                self.add_override(part_name, &content_type);
                return Ok(());
            }
        };
        match self.defaults.get(&ext) {
            Some(current) if *current == content_type => {}
            Some(_) => self.add_override(part_name, &content_type),
            None => {
                self.defaults.insert(ext, content_type);
            }
        }
        Ok(())
    }

    fn add_override(&mut self, part_name: &str, content_type: &str) {
        self.overrides.insert(
            part_name.to_uppercase(),
            (part_name.to_string(), content_type.to_string()),
        );
    }

    fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_string(), content_type.to_string());
    }

    /// Resolve the content type for a part name. Overrides win over
    /// defaults; a part without either fails with code 208.
    pub fn find_type(&self, part_name: &str) -> std::result::Result<String, Violation> {
        if let Some((_, ct)) = self.overrides.get(&part_name.to_uppercase()) {
            return Ok(ct.clone());
        }
        if let Some(ext) = extension_of(part_name) {
            if let Some(ct) = self.defaults.get(&ext.to_lowercase()) {
                return Ok(ct.clone());
            }
        }
        Err(Violation::new(208, part_name))
    }

    /// Serialize the dictionary as the `[Content_Types].xml` document.
    ///
    /// Entries are emitted over sorted keys so the encoding is
    /// deterministic.
    pub fn encode(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push('\n');

        let mut exts: Vec<&String> = self.defaults.keys().collect();
        exts.sort();
        for ext in exts {
            xml.push_str(&format!(
                "  <Default Extension=\"{}\" ContentType=\"{}\"/>\n",
                escape_xml(ext),
                escape_xml(&self.defaults[ext])
            ));
        }

        let mut keys: Vec<&String> = self.overrides.keys().collect();
        keys.sort();
        for key in keys {
            let (part_name, content_type) = &self.overrides[key];
            xml.push_str(&format!(
                "  <Override PartName=\"{}\" ContentType=\"{}\"/>\n",
                escape_xml(part_name),
                escape_xml(content_type)
            ));
        }

        xml.push_str("</Types>");
        xml
    }

    /// Parse a `[Content_Types].xml` stream.
    ///
    /// Duplicate extensions and duplicate part name overrides fail with
    /// code 205, an empty extension with 206. Unknown child elements are
    /// ignored unless `strict` is set.
    pub fn decode(xml: &[u8], strict: bool) -> Result<Self> {
        let mut ct = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Types" => {}
                        b"Default" => {
                            let mut extension = String::new();
                            let mut content_type = String::new();
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        extension =
                                            attr.unescape_value()?.to_lowercase();
                                    }
                                    b"ContentType" => {
                                        content_type = attr.unescape_value()?.to_string();
                                    }
                                    _ => {}
                                }
                            }
                            if extension.is_empty() {
                                return Err(Violation::new(206, CONTENT_TYPES_URI).into());
                            }
                            if ct.defaults.contains_key(&extension) {
                                return Err(Violation::new(205, CONTENT_TYPES_URI).into());
                            }
                            ct.add_default(&extension, &content_type);
                        }
                        b"Override" => {
                            let mut part_name = String::new();
                            let mut content_type = String::new();
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        part_name = attr.unescape_value()?.to_string();
                                    }
                                    b"ContentType" => {
                                        content_type = attr.unescape_value()?.to_string();
                                    }
                                    _ => {}
                                }
                            }
                            if ct.overrides.contains_key(&part_name.to_uppercase()) {
                                return Err(Violation::new(205, part_name.as_str()).into());
                            }
                            ct.add_override(&part_name, &content_type);
                        }
                        other if strict => {
                            return Err(OpcError::Xml(format!(
                                "content types stream has an element with an unexpected type: {}",
                                String::from_utf8_lossy(other)
                            )));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::Xml(format!("content types parse error: {e}")));
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(ct)
    }

    #[cfg(test)]
    fn default_for(&self, ext: &str) -> Option<&str> {
        self.defaults.get(ext).map(String::as_str)
    }

    #[cfg(test)]
    fn override_for(&self, part_name: &str) -> Option<&str> {
        self.overrides
            .get(&part_name.to_uppercase())
            .map(|(_, ct)| ct.as_str())
    }
}

/// Validate a part's content type against RFC 2616 §3.7.
///
/// Empty content types fail with code 102, leading/trailing or embedded
/// linear whitespace with 114, malformed media type syntax with 113.
pub fn validate_content_type(part_name: &str, content_type: &str) -> std::result::Result<(), Violation> {
    if content_type.trim().is_empty() {
        return Err(Violation::new(102, part_name));
    }
    if content_type.starts_with(' ') || content_type.ends_with(' ') {
        return Err(Violation::new(114, part_name));
    }
    if content_type.contains(['\t', '\r', '\n']) {
        return Err(Violation::new(114, part_name));
    }
    if parse_media_type(content_type).is_none() {
        return Err(Violation::new(113, part_name));
    }
    Ok(())
}

/// The extension of a part name, without the leading dot. None when the
/// filename carries no usable extension.
fn extension_of(part_name: &str) -> Option<&str> {
    let filename = match part_name.rfind('/') {
        Some(pos) => &part_name[pos + 1..],
        None => part_name,
    };
    match filename.rfind('.') {
        Some(pos) if pos + 1 < filename.len() => Some(&filename[pos + 1..]),
        _ => None,
    }
}

/// Parse a media type into its lowercased `type/subtype` form plus
/// parameters. Returns None when the syntax does not fit RFC 2616 §3.7.
fn parse_media_type(s: &str) -> Option<(String, Vec<(String, String)>)> {
    let (ty, rest) = take_token(s)?;
    let rest = rest.strip_prefix('/')?;
    let (subty, mut rest) = take_token(rest)?;

    let mut params = Vec::new();
    loop {
        let trimmed = rest.trim_start_matches(' ');
        if trimmed.is_empty() {
            break;
        }
        let after_semi = trimmed.strip_prefix(';')?.trim_start_matches(' ');
        let (name, r) = take_token(after_semi)?;
        let r = r.strip_prefix('=')?;
        let (value, r) = if let Some(quoted) = r.strip_prefix('"') {
            take_quoted(quoted)?
        } else {
            take_token(r)?
        };
        params.push((name.to_lowercase(), value));
        rest = r;
    }

    Some((
        format!("{}/{}", ty.to_lowercase(), subty.to_lowercase()),
        params,
    ))
}

/// Serialize a parsed media type back to its canonical form:
/// `type/subtype; name=value` with values quoted only when needed.
fn format_media_type(media_type: &str, params: &[(String, String)]) -> String {
    let mut out = String::from(media_type);
    for (name, value) in params {
        out.push_str("; ");
        out.push_str(name);
        out.push('=');
        if !value.is_empty() && value.bytes().all(is_token_char) {
            out.push_str(value);
        } else {
            out.push('"');
            for c in value.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
    out
}

fn canonical_media_type(s: &str) -> Option<String> {
    let (media_type, params) = parse_media_type(s)?;
    Some(format_media_type(&media_type, &params))
}

fn take_token(s: &str) -> Option<(String, &str)> {
    let end = s
        .bytes()
        .position(|b| !is_token_char(b))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((s[..end].to_string(), &s[end..]))
}

fn take_quoted(s: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &s[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(escaped);
            }
            _ => value.push(c),
        }
    }
    None
}

fn is_token_char(b: u8) -> bool {
    (0x21..=0x7e).contains(&b)
        && !matches!(
            b,
            b'(' | b')'
                | b'<'
                | b'>'
                | b'@'
                | b','
                | b';'
                | b':'
                | b'\\'
                | b'"'
                | b'/'
                | b'['
                | b']'
                | b'?'
                | b'='
                | b'{'
                | b'}'
        )
}
