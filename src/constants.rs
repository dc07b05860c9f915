//! Constant values related to the Open Packaging Conventions.
//!
//! Content type URIs (like MIME-types) that specify a part's format,
//! XML namespaces, and relationship types used in OPC packages.

/// Content type URIs for the parts the package model itself defines.
pub mod content_type {
    /// Core properties part content type.
    pub const CORE_PROPERTIES: &str =
        "application/vnd.openxmlformats-package.core-properties+xml";

    /// Relationships part content type.
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
}

/// XML namespace URIs used in OPC packages.
pub mod namespace {
    /// OPC content types namespace.
    pub const CONTENT_TYPES: &str =
        "http://schemas.openxmlformats.org/package/2006/content-types";

    /// OPC relationships namespace.
    pub const RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships";

    /// OPC core properties namespace.
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";

    /// Dublin Core elements namespace.
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";

    /// Dublin Core terms namespace.
    pub const DCTERMS: &str = "http://purl.org/dc/terms/";

    /// Dublin Core DCMI type vocabulary namespace.
    pub const DCMITYPE: &str = "http://purl.org/dc/dcmitype/";

    /// XML Schema instance namespace.
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
}

/// Relationship type URIs defined by the package model.
pub mod relationship_type {
    /// Core properties relationship.
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";

    /// Thumbnail relationship.
    pub const THUMBNAIL: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail";

    /// Digital signature relationship.
    pub const DIGITAL_SIGNATURE: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/signature";

    /// Digital signature origin relationship.
    pub const DIGITAL_SIGNATURE_ORIGIN: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/origin";

    /// Digital signature certificate relationship.
    pub const DIGITAL_SIGNATURE_CERTIFICATE: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/certificate";
}

/// Open XML relationship target modes.
pub mod target_mode {
    /// Internal relationship target mode (default).
    pub const INTERNAL: &str = "Internal";

    /// External relationship target mode.
    pub const EXTERNAL: &str = "External";
}

/// Default part name for the core properties part.
pub const DEFAULT_CORE_PROPERTIES_URI: &str = "/props/core.xml";

/// Part name of the package relationships part.
pub const PACKAGE_RELS_URI: &str = "/_rels/.rels";
