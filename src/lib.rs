//! openpack - a Rust library for reading and writing Open Packaging
//! Conventions (OPC) packages.
//!
//! The Open Packaging Conventions (ISO/IEC 29500-2) describe an abstract
//! model and physical format conventions for the use of XML, Unicode, ZIP
//! and other openly available technologies to organize the content and
//! resources of a document within a package. OPC is the foundation
//! technology for many file formats: .docx, .xlsx, .pptx, .3mf, .dwfx and
//! more.
//!
//! # Features
//!
//! - **Streaming writer**: parts are compressed into the archive as they
//!   are written, with relationship sidecars and the content types stream
//!   emitted in the order tools expect
//! - **Validating reader**: part names, content types and relationships
//!   are checked against the OPC conformance rules while loading
//! - **Core properties**: Dublin Core package metadata on both paths
//!
//! # Example - Writing a package
//!
//! ```no_run
//! use std::io::Write;
//! use openpack::{PackageWriter, Part, Relationship, TargetMode};
//!
//! # fn main() -> openpack::Result<()> {
//! let sink = std::io::Cursor::new(Vec::new());
//! let mut writer = PackageWriter::new(sink);
//!
//! let mut part = Part::new("/docs/report.xml", "text/xml");
//! part.relationships.push(Relationship::new(
//!     "rId1",
//!     "http://example.com/style",
//!     "/docs/style.xml",
//!     TargetMode::Internal,
//! ));
//! writer.create_part(part, openpack::CompressionOption::Normal)?;
//! writer.write_all(b"<report/>")?;
//!
//! writer.create("/docs/style.xml", "text/xml")?;
//! writer.write_all(b"<style/>")?;
//!
//! writer.properties.title = Some("Annual report".to_string());
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Reading a package
//!
//! ```no_run
//! # fn main() -> openpack::Result<()> {
//! let reader = openpack::PackageReader::open("report.docx")?;
//! for file in reader.files() {
//!     println!("{} ({})", file.name, file.content_type);
//!     for rel in &file.relationships {
//!         println!("  {} -> {}", rel.id, rel.target_uri);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod packuri;
pub mod part;
pub mod properties;
pub mod reader;
pub mod rel;
pub mod writer;

mod content_types;
mod package;
mod xmlutil;

pub use error::{OpcError, Result, Violation};
pub use packuri::{normalize_part_name, resolve_relationship, PackUri};
pub use part::{CompressionOption, Part};
pub use properties::CoreProperties;
pub use reader::{File, PackageReader};
pub use rel::{is_relationship_uri, Relationship, TargetMode};
pub use writer::PackageWriter;
