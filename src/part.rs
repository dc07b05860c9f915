//! Package parts.
//!
//! A part is a named stream of bytes with a content type. Parts may own
//! relationships to other parts or external resources; the relationships
//! are dropped together with their owning part.

use crate::content_types::validate_content_type;
use crate::error::Violation;
use crate::packuri::validate_part_name;
use crate::rel::Relationship;

/// Compression applied to a part's bytes in the physical package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionOption {
    /// No compression, the bytes are stored as-is.
    None,
    /// Reasonable compromise between size and performance.
    #[default]
    Normal,
    /// Optimized for size.
    Maximum,
    /// Optimized for performance.
    Fast,
    /// Optimized for super performance.
    SuperFast,
}

/// An OPC package part.
///
/// The caller constructs parts and hands them to the writer; a part
/// becomes immutable once its relationships sidecar has been emitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Part {
    /// Part name, a conformant `/`-rooted path. [`normalize_part_name`]
    /// turns arbitrary input into this form.
    ///
    /// [`normalize_part_name`]: crate::packuri::normalize_part_name
    pub name: String,

    /// RFC 2616 media type of the part's bytes.
    pub content_type: String,

    /// Relationships owned by this part.
    pub relationships: Vec<Relationship>,
}

impl Part {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            relationships: Vec::new(),
        }
    }

    /// Validate the part's name grammar and content type syntax.
    pub fn validate(&self) -> Result<(), Violation> {
        validate_part_name(&self.name)?;
        validate_content_type(&self.name, &self.content_type)
    }
}
