//! Error types for OPC package operations.

use thiserror::Error;

/// A violation of the OPC conformance rules.
///
/// Every violation carries the numeric code of the rule it breaks, the name
/// of the offending part and, for relationship rules, the relationship ID.
/// The first digit of the code is the top level topic and the second and
/// third digits are the specific rule:
///
/// 1. Package model requirements
/// 2. Physical package requirements
/// 3. ZIP physical mapping requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    code: u16,
    part_name: String,
    rel_id: Option<String>,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "opc: {}: {}", self.part_name, self.message())
    }
}

impl std::error::Error for Violation {}

impl Violation {
    pub(crate) fn new(code: u16, part_name: impl Into<String>) -> Self {
        Self {
            code,
            part_name: part_name.into(),
            rel_id: None,
        }
    }

    pub(crate) fn with_relationship(
        code: u16,
        part_name: impl Into<String>,
        rel_id: impl Into<String>,
    ) -> Self {
        Self {
            code,
            part_name: part_name.into(),
            rel_id: Some(rel_id.into()),
        }
    }

    /// Numeric code of the violated rule.
    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Name of the part associated with the violation.
    #[inline]
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// ID of the relationship associated with the violation, if any.
    #[inline]
    pub fn relationship_id(&self) -> Option<&str> {
        self.rel_id.as_deref()
    }

    /// Human readable statement of the violated rule.
    pub fn message(&self) -> &'static str {
        match self.code {
            101 => "a part name shall not be empty",
            102 => "a part content type shall not be empty",
            103 => "a part name shall not have empty segments",
            104 => "a part name shall start with a forward slash character",
            105 => "a part name shall not have a forward slash as the last character",
            106 => "a part name segment shall not hold any characters other than pchar characters",
            107 => "a part name segment shall not contain percent-encoded forward slash or backward slash characters",
            108 => "a part name segment shall not contain percent-encoded unreserved characters",
            109 => "a part name segment shall not end with a dot character",
            110 => "a part name segment shall include at least one non-dot character",
            111 => "a package shall not contain a part with a part name derived from another part name by appending segments to it",
            112 => "a package shall not contain equivalent part names",
            113 => "a part content type shall fit the definition and syntax for media types as specified in RFC 2616",
            114 => "a part content type shall not have linear, leading or trailing white space",
            125 => "a relationships part shall not have relationships to any other part",
            126 => "a relationship identifier cannot be empty and shall be unique within the relationships part",
            127 => "a relationship type cannot be empty",
            128 => "a relationship target URI reference shall be a URI or a relative reference",
            129 => "a relationship target URI must be relative if the TargetMode is Internal",
            205 => "a Default element shall not have more than one content type for each extension and an Override shall not have more than one content type for each PartName",
            206 => "a package shall not have an empty extension in a Default element",
            208 => "a part content type shall appear in [Content_Types].xml",
            310 => "a package shall contain a file named [Content_Types].xml to store all the data content types",
            _ => "unknown conformance rule",
        }
    }
}

/// Error type for OPC package operations.
#[derive(Error, Debug)]
pub enum OpcError {
    /// An OPC conformance rule was violated.
    #[error(transparent)]
    Violation(#[from] Violation),

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("quick-xml error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attr(String),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::Attr(err.to_string())
    }
}

impl OpcError {
    /// The conformance code carried by the error, if it is a [`Violation`].
    pub fn code(&self) -> Option<u16> {
        match self {
            OpcError::Violation(v) => Some(v.code()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
