//! The part name value type and utilities for working with package URIs.
//!
//! Part names follow the restricted URI grammar of ISO/IEC 29500-2 §9.1.1:
//! they begin with a forward slash, use forward slashes as separators, and
//! every segment is limited to pchar characters with percent-encoding in
//! uppercase and never applied to unreserved characters.

use crate::error::Violation;
use std::fmt::Write as _;

/// The package pseudo-partname, representing the package itself.
pub const PACKAGE_URI: &str = "/";

/// The reserved name of the content types stream. It is recognized by the
/// package model but never treated as a part.
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// A validated part name within an OPC package.
///
/// `PackUri` always begins with a forward slash and provides access to the
/// derived components used by the physical mapping: the base URI
/// (directory), filename, extension, ZIP membername and the name of the
/// relationships sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackUri {
    uri: String,
}

impl PackUri {
    /// Create a new `PackUri`, validating the full part name grammar.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self, Violation> {
        let uri = uri.into();
        validate_part_name(&uri)?;
        Ok(PackUri { uri })
    }

    /// The full part name string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The base URI (directory portion), e.g. "/ppt/slides" for
    /// "/ppt/slides/slide1.xml". Root-level names return "/".
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// The filename portion, e.g. "slide1.xml" for "/ppt/slides/slide1.xml".
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// The extension portion without the leading period, e.g. "xml" for
    /// "/word/document.xml". Empty when the filename has no period.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// The name with the leading slash stripped. This is the form used as
    /// the ZIP membername for the package item.
    #[inline]
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// The name of the relationships sidecar corresponding to this part,
    /// e.g. "/word/_rels/document.xml.rels" for "/word/document.xml".
    pub fn rels_uri(&self) -> String {
        let base_uri = self.base_uri();
        if base_uri == "/" {
            format!("/_rels/{}.rels", self.filename())
        } else {
            format!("{}/_rels/{}.rels", base_uri, self.filename())
        }
    }
}

impl std::fmt::Display for PackUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackUri {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// Validate a part name against the restricted URI grammar.
///
/// Each failing clause reports its own conformance code, see
/// [`Violation::code`].
pub fn validate_part_name(name: &str) -> Result<(), Violation> {
    if name.is_empty() {
        return Err(Violation::new(101, name));
    }
    if !name.starts_with('/') {
        return Err(Violation::new(104, name));
    }
    if name.ends_with('/') {
        return Err(Violation::new(105, name));
    }
    for segment in name[1..].split('/') {
        validate_segment(name, segment)?;
    }
    Ok(())
}

fn validate_segment(name: &str, segment: &str) -> Result<(), Violation> {
    if segment.is_empty() {
        return Err(Violation::new(103, name));
    }
    if segment.bytes().all(|b| b == b'.') {
        return Err(Violation::new(110, name));
    }
    if segment.ends_with('.') {
        return Err(Violation::new(109, name));
    }
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let value = match percent_value(bytes, i) {
                Some(v) => v,
                None => return Err(Violation::new(106, name)),
            };
            if value == b'/' || value == b'\\' {
                return Err(Violation::new(107, name));
            }
            if is_unreserved(value) {
                return Err(Violation::new(108, name));
            }
            // uppercase hex is mandatory
            if bytes[i + 1].is_ascii_lowercase() || bytes[i + 2].is_ascii_lowercase() {
                return Err(Violation::new(106, name));
            }
            i += 3;
        } else if is_pchar(b) {
            i += 1;
        } else {
            return Err(Violation::new(106, name));
        }
    }
    Ok(())
}

/// Transform arbitrary input into a conformant part name, best effort.
///
/// Normalization never fails: unrecoverable input comes back unchanged or
/// empty. It trims whitespace, drops any fragment, turns backslashes into
/// forward slashes, collapses duplicate separators, decodes percent-encoded
/// unreserved characters, escapes everything outside the pchar set using
/// uppercase hex, removes dot segments and trims a trailing slash.
///
/// ```
/// use openpack::packuri::normalize_part_name;
///
/// assert_eq!(normalize_part_name("\\docs\\a.xml"), "/docs/a.xml");
/// assert_eq!(normalize_part_name("/%41/%61.xml"), "/A/a.xml");
/// assert_eq!(normalize_part_name("/../a.xml"), "/a.xml");
/// ```
pub fn normalize_part_name(name: &str) -> String {
    let trimmed = name.trim();
    if matches!(trimmed, "" | "/" | "\\" | ".") {
        return String::new();
    }
    let mut s = match trimmed.find('#') {
        Some(i) => trimmed[..i].to_string(),
        None => trimmed.to_string(),
    };
    s = s.replace('\\', "/");
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    let s = decode_unreserved(&s);
    let s = encode_non_pchar(&s);
    let s = remove_dot_segments(&s);
    s.trim_end_matches('/').to_string()
}

/// Resolve a relationship target reference against its source part name.
///
/// A source of "/" (or "\") stands for the package itself; the target is
/// then rooted at the package. Absolute targets are returned with their
/// separators normalized. Relative targets are resolved against the
/// directory containing the source.
pub fn resolve_relationship(source: &str, rel: &str) -> String {
    let rel = rel.replace('\\', "/");
    if source == "/" || source == "\\" {
        if rel.starts_with('/') {
            return rel;
        }
        return format!("/{rel}");
    }
    if rel.starts_with('/') {
        return rel;
    }
    let dir = match source.rfind('/') {
        Some(i) => &source[..i],
        None => "",
    };
    format!("{dir}/{rel}")
}

/// Percent-decode only unreserved characters, leaving reserved and
/// structural escapes intact. A stray percent not followed by two hex
/// digits is rewritten to "%25".
fn decode_unreserved(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            match percent_value(bytes, i) {
                Some(v) if is_unreserved(v) => {
                    out.push(v);
                    i += 3;
                }
                Some(_) => {
                    out.extend_from_slice(&bytes[i..i + 3]);
                    i += 3;
                }
                None => {
                    out.extend_from_slice(b"%25");
                    i += 1;
                }
            }
        } else {
            out.push(b);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

/// Percent-encode every byte outside the pchar set, uppercase existing
/// escapes.
fn encode_non_pchar(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            if percent_value(bytes, i).is_some() {
                out.push('%');
                out.push(bytes[i + 1].to_ascii_uppercase() as char);
                out.push(bytes[i + 2].to_ascii_uppercase() as char);
                i += 3;
            } else {
                out.push_str("%25");
                i += 1;
            }
        } else if b == b'/' || is_pchar(b) {
            out.push(b as char);
            i += 1;
        } else {
            let _ = write!(out, "%{b:02X}");
            i += 1;
        }
    }
    out
}

/// Remove "." and ".." segments. ".." is dropped, not resolved to the
/// parent: "/x/../a.xml" becomes "/x/a.xml".
fn remove_dot_segments(s: &str) -> String {
    let kept: Vec<&str> = s.split('/').filter(|seg| *seg != "." && *seg != "..").collect();
    kept.join("/")
}

fn percent_value(bytes: &[u8], i: usize) -> Option<u8> {
    if i + 2 >= bytes.len() {
        return None;
    }
    let h1 = hex_value(bytes[i + 1])?;
    let h2 = hex_value(bytes[i + 2])?;
    Some(h1 * 16 + h2)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn is_sub_delim(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

fn is_pchar(b: u8) -> bool {
    is_unreserved(b) || is_sub_delim(b) || b == b':' || b == b'@'
}
