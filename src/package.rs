//! The logical package: a collection of parts with package-wide
//! uniqueness rules and the content types dictionary.

use crate::content_types::ContentTypes;
use crate::error::Violation;
use crate::part::Part;
use std::collections::HashMap;

/// A container holding a collection of parts.
///
/// Part names are stored under their upper-cased form so equivalence and
/// prefix-derivation checks are case-insensitive; the display name is
/// preserved in the part itself.
#[derive(Debug, Default)]
pub struct Package {
    parts: HashMap<String, Part>,
    content_types: ContentTypes,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part, enforcing the package model rules: the part must be
    /// valid, its name must not duplicate an existing one (code 112) and
    /// must not be derived from an existing one by appending segments
    /// (code 111). The content types dictionary is updated on success.
    pub fn add(&mut self, part: Part) -> Result<(), Violation> {
        part.validate()?;
        let upper = part.name.to_uppercase();
        if self.parts.contains_key(&upper) {
            return Err(Violation::new(112, part.name.as_str()));
        }
        if self.has_prefix_collision(&upper) {
            return Err(Violation::new(111, part.name.as_str()));
        }
        self.content_types.add(&part.name, &part.content_type)?;
        self.parts.insert(upper, part);
        Ok(())
    }

    /// Remove a part by name. No-op when the part is absent.
    pub fn delete(&mut self, name: &str) {
        self.parts.remove(&name.to_uppercase());
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.get(&name.to_uppercase())
    }

    pub fn part_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.parts.get_mut(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Whether inserting `upper` would make one part name a strict
    /// segmented prefix of another.
    ///
    /// The candidate is placed among the sorted existing keys and compared
    /// to its lexicographic neighbors only: a collision can only occur
    /// between a name and its immediate neighbor in sort order.
    fn has_prefix_collision(&self, upper: &str) -> bool {
        let mut keys: Vec<&str> = self.parts.keys().map(String::as_str).collect();
        keys.push(upper);
        keys.sort_unstable();

        let i = keys.iter().position(|k| *k == upper).unwrap_or(0);
        if i > 0 && is_segment_prefix(upper, keys[i - 1]) {
            return true;
        }
        if i + 1 < keys.len() && is_segment_prefix(keys[i + 1], upper) {
            return true;
        }
        false
    }
}

/// True when `longer` equals `shorter` followed by "/" and at least one
/// more character.
fn is_segment_prefix(longer: &str, shorter: &str) -> bool {
    longer.len() > shorter.len()
        && longer.starts_with(shorter)
        && longer.as_bytes()[shorter.len()] == b'/'
}
