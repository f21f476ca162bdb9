//! Section lookup by header name.
//!
//! Header names are matched case-insensitively (`[Polygons]` and `[POLYGONS]`
//! are the same section). When a header appears twice, the first occurrence wins.

use std::collections::HashMap;
use std::ops::Range;

use crate::document::Section;

/// Header name -> position in the document's section list.
#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    positions: HashMap<String, usize>,
}

impl SectionIndex {
    /// Build the index in one pass over the sections.
    pub fn build(sections: &[Section]) -> Self {
        let mut positions = HashMap::with_capacity(sections.len());
        for (pos, section) in sections.iter().enumerate() {
            positions.entry(normalize(section.name())).or_insert(pos);
        }
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&normalize(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_uppercase()
}

/// Location of a section in the serialized file (0-based line numbers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub header_line: usize,
    /// Body lines (comments and records), excluding the blank terminator.
    pub body: Range<usize>,
}
