//! Structured model of a SWMM-style network file.
//!
//! A file is a preamble followed by bracketed sections. Each section body runs
//! from its header to the first blank line; anything after that blank line and
//! before the next header is kept verbatim as the section trailer. Every line
//! keeps its original text, so serializing an unmodified document reproduces the
//! input byte for byte.

use std::fmt;
use std::path::Path;

use crate::error::{NetworkError, NetworkResult};
use crate::index::{SectionIndex, SectionSpan, normalize};
use crate::records::{SectionRecord, node_reference_fields};

/// Leading character of a comment line and start of inline comments.
pub const COMMENT: char = ';';

/// Separator used when a record is built from fields rather than cloned.
const FIELD_SEPARATOR: &str = "    ";

/// A data line: whitespace-separated positional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    text: String,
}

impl Record {
    pub fn parse(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let text = fields
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR);
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte ranges of the fields, ignoring any inline comment.
    fn spans(&self) -> Vec<(usize, usize)> {
        let data_end = self.text.find(COMMENT).unwrap_or(self.text.len());
        let mut spans = Vec::new();
        let mut start = None;
        for (i, c) in self.text[..data_end].char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    spans.push((s, i));
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(s) = start {
            spans.push((s, data_end));
        }
        spans
    }

    pub fn fields(&self) -> Vec<&str> {
        self.spans()
            .into_iter()
            .map(|(s, e)| &self.text[s..e])
            .collect()
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.spans().get(index).map(|&(s, e)| &self.text[s..e])
    }

    pub fn id(&self) -> Option<&str> {
        self.field(0)
    }

    /// Rewrite one positional field.
    ///
    /// When the next field is separated by plain spaces, the padding is adjusted
    /// so the following columns keep their position (at least one space remains).
    /// Returns false if the record has no such field.
    pub fn set_field(&mut self, index: usize, value: &str) -> bool {
        let spans = self.spans();
        let Some(&(start, end)) = spans.get(index) else {
            return false;
        };
        let mut rebuilt = String::with_capacity(self.text.len() + value.len());
        rebuilt.push_str(&self.text[..start]);
        rebuilt.push_str(value);
        match spans.get(index + 1) {
            Some(&(next, _)) if self.text[end..next].bytes().all(|b| b == b' ') => {
                let width = (next - end) as isize + (end - start) as isize - value.len() as isize;
                rebuilt.push_str(&" ".repeat(width.max(1) as usize));
                rebuilt.push_str(&self.text[next..]);
            }
            _ => rebuilt.push_str(&self.text[end..]),
        }
        self.text = rebuilt;
        true
    }

    /// Replace every field exactly equal to `old`. Substrings of longer fields
    /// are never touched. Returns the number of fields rewritten.
    pub fn replace_token(&mut self, old: &str, new: &str) -> usize {
        let matches: Vec<usize> = self
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == old)
            .map(|(i, _)| i)
            .collect();
        for &i in &matches {
            self.set_field(i, new);
        }
        matches.len()
    }

    /// Like [`Record::replace_token`], restricted to the given field positions.
    pub fn replace_token_at(&mut self, positions: &[usize], old: &str, new: &str) -> usize {
        let matches: Vec<usize> = positions
            .iter()
            .copied()
            .filter(|&i| self.field(i) == Some(old))
            .collect();
        for &i in &matches {
            self.set_field(i, new);
        }
        matches.len()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One non-blank line inside a section body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Comment(String),
    Record(Record),
}

impl Line {
    fn classify(raw: &str) -> Self {
        if raw.trim_start().starts_with(COMMENT) {
            Line::Comment(raw.to_string())
        } else {
            Line::Record(Record::parse(raw))
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Line::Comment(text) => text,
            Line::Record(record) => record.text(),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Line::Record(record) => Some(record),
            Line::Comment(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    header: String,
    body: Vec<Line>,
    trailer: Vec<String>,
}

impl Section {
    fn new(header: &str) -> Self {
        Self {
            name: header
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string(),
            header: header.to_string(),
            body: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Name as written between the brackets.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[Line] {
        &self.body
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.body.iter().filter_map(Line::as_record)
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.body.iter_mut().filter_map(|line| match line {
            Line::Record(record) => Some(record),
            Line::Comment(_) => None,
        })
    }

    /// Body position of the first record whose id is `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.body
            .iter()
            .position(|line| line.as_record().and_then(Record::id) == Some(id))
    }

    pub fn insert(&mut self, position: usize, record: Record) -> NetworkResult<()> {
        if position > self.body.len() {
            return Err(NetworkError::PositionOutOfRange {
                section: self.name.clone(),
                position,
                len: self.body.len(),
            });
        }
        self.body.insert(position, Line::Record(record));
        Ok(())
    }

    /// Append a record at the end of the body, before the blank terminator.
    pub fn push(&mut self, record: Record) {
        self.body.push(Line::Record(record));
    }

    /// Keep comments and the records for which `keep` returns true.
    pub fn retain_records(&mut self, mut keep: impl FnMut(&Record) -> bool) {
        self.body.retain(|line| match line {
            Line::Record(record) => keep(record),
            Line::Comment(_) => true,
        });
    }

    fn line_count(&self) -> usize {
        1 + self.body.len() + self.trailer.len()
    }
}

fn is_header(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.len() > 2 && trimmed.starts_with('[') && trimmed.ends_with(']')
}

/// A parsed network file.
#[derive(Debug, Clone)]
pub struct NetworkFile {
    preamble: Vec<String>,
    sections: Vec<Section>,
    index: SectionIndex,
    line_ending: &'static str,
    final_newline: bool,
}

impl NetworkFile {
    pub fn parse(text: &str) -> Self {
        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let final_newline = text.ends_with(line_ending);
        let mut raw_lines: Vec<&str> = text.split(line_ending).collect();
        if final_newline || text.is_empty() {
            raw_lines.pop();
        }

        let mut preamble = Vec::new();
        let mut sections: Vec<Section> = Vec::new();
        let mut in_body = false;
        for raw in raw_lines {
            if is_header(raw) {
                sections.push(Section::new(raw));
                in_body = true;
                continue;
            }
            let Some(section) = sections.last_mut() else {
                preamble.push(raw.to_string());
                continue;
            };
            if in_body && !raw.trim().is_empty() {
                section.body.push(Line::classify(raw));
            } else {
                in_body = false;
                section.trailer.push(raw.to_string());
            }
        }

        let index = SectionIndex::build(&sections);
        Self {
            preamble,
            sections,
            index,
            line_ending,
            final_newline,
        }
    }

    pub fn load(path: &Path) -> NetworkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| NetworkError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Rewrite the whole file. There is no incremental patching and no locking.
    pub fn save(&self, path: &Path) -> NetworkResult<()> {
        std::fs::write(path, self.to_string()).map_err(|e| NetworkError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn section(&self, name: &str) -> NetworkResult<&Section> {
        let pos = self.position(name)?;
        Ok(&self.sections[pos])
    }

    pub fn section_mut(&mut self, name: &str) -> NetworkResult<&mut Section> {
        let pos = self.position(name)?;
        Ok(&mut self.sections[pos])
    }

    fn position(&self, name: &str) -> NetworkResult<usize> {
        self.index
            .position(name)
            .ok_or_else(|| NetworkError::SectionNotFound {
                section: normalize(name),
            })
    }

    /// Line range of a section in the serialized file.
    pub fn find_section(&self, name: &str) -> NetworkResult<SectionSpan> {
        let pos = self.position(name)?;
        let header_line = self.preamble.len()
            + self.sections[..pos]
                .iter()
                .map(Section::line_count)
                .sum::<usize>();
        let body_start = header_line + 1;
        Ok(SectionSpan {
            header_line,
            body: body_start..body_start + self.sections[pos].body.len(),
        })
    }

    /// Records of a section as owned field tuples, comments skipped.
    pub fn parse_records(&self, name: &str) -> NetworkResult<Vec<Vec<String>>> {
        Ok(self
            .section(name)?
            .records()
            .map(|r| r.fields().into_iter().map(str::to_string).collect())
            .collect())
    }

    /// Typed records of a required section.
    pub fn records<T: SectionRecord>(&self) -> NetworkResult<Vec<T>> {
        self.section(T::SECTION)?
            .records()
            .map(|record| {
                T::from_fields(&record.fields()).map_err(|reason| NetworkError::MalformedRecord {
                    section: T::SECTION,
                    line: record.text().trim().to_string(),
                    reason,
                })
            })
            .collect()
    }

    /// Typed records of a section that may be absent (absent = empty).
    pub fn optional_records<T: SectionRecord>(&self) -> NetworkResult<Vec<T>> {
        if self.has_section(T::SECTION) {
            self.records()
        } else {
            Ok(Vec::new())
        }
    }

    pub fn insert_record<S: AsRef<str>>(
        &mut self,
        name: &str,
        position: usize,
        fields: &[S],
    ) -> NetworkResult<()> {
        self.section_mut(name)?
            .insert(position, Record::from_fields(fields))
    }

    /// Rename a node wherever a record refers to it as a node.
    ///
    /// Only the positions listed by [`node_reference_fields`] are considered, so
    /// a numeric id never rewrites elevations, lengths or coordinates that
    /// happen to share its text. Returns the number of fields rewritten.
    pub fn rename_node(&mut self, old: &str, new: &str) -> usize {
        let mut count = 0;
        for section in &mut self.sections {
            let positions = node_reference_fields(section.name());
            if positions.is_empty() {
                continue;
            }
            for record in section.records_mut() {
                count += record.replace_token_at(positions, old, new);
            }
        }
        count
    }

    /// Insert an empty section directly after `anchor`.
    pub fn insert_section_after(
        &mut self,
        anchor: &str,
        name: &str,
        comments: &[&str],
    ) -> NetworkResult<()> {
        let pos = self.position(anchor)?;
        if self.sections[pos].trailer.is_empty() {
            self.sections[pos].trailer.push(String::new());
        }
        let mut section = Section::new(&format!("[{}]", name));
        section.body = comments
            .iter()
            .map(|c| Line::Comment((*c).to_string()))
            .collect();
        section.trailer.push(String::new());
        self.sections.insert(pos + 1, section);
        self.index = SectionIndex::build(&self.sections);
        Ok(())
    }
}

impl fmt::Display for NetworkFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<&str> = self.preamble.iter().map(String::as_str).collect();
        for section in &self.sections {
            lines.push(&section.header);
            lines.extend(section.body.iter().map(Line::text));
            lines.extend(section.trailer.iter().map(String::as_str));
        }
        f.write_str(&lines.join(self.line_ending))?;
        if self.final_newline {
            f.write_str(self.line_ending)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[TITLE]\n;;Project Title/Notes\n\n[JUNCTIONS]\n;;Name  Elevation\nJ1      10.5\nJ10     8\n\n[CONDUITS]\nC1  J10  J1  40\n";

    #[test]
    fn unmodified_round_trip_is_exact() {
        let doc = NetworkFile::parse(SAMPLE);
        assert_eq!(doc.to_string(), SAMPLE);

        let crlf = SAMPLE.replace('\n', "\r\n");
        assert_eq!(NetworkFile::parse(&crlf).to_string(), crlf);

        let no_final = SAMPLE.trim_end();
        assert_eq!(NetworkFile::parse(no_final).to_string(), no_final);
    }

    #[test]
    fn find_section_reports_line_numbers() {
        let doc = NetworkFile::parse(SAMPLE);
        let span = doc.find_section("junctions").unwrap();
        assert_eq!(span.header_line, 3);
        assert_eq!(span.body, 4..7);

        let err = doc.find_section("SUBCATCHMENTS").unwrap_err();
        assert_eq!(
            err,
            NetworkError::SectionNotFound {
                section: "SUBCATCHMENTS".into()
            }
        );
    }

    #[test]
    fn parse_records_skips_comments() {
        let doc = NetworkFile::parse(SAMPLE);
        let recs = doc.parse_records("JUNCTIONS").unwrap();
        assert_eq!(recs, vec![vec!["J1", "10.5"], vec!["J10", "8"]]);
    }

    #[test]
    fn replace_token_matches_whole_fields_only() {
        let mut rec = Record::parse("C1  J10  J1  40");
        assert_eq!(rec.replace_token("J1", "J1_m"), 1);
        assert_eq!(rec.fields(), vec!["C1", "J10", "J1_m", "40"]);
    }

    #[test]
    fn rename_node_skips_value_fields() {
        let text = "[JUNCTIONS]\n10  10  0\n20  12  0\n\n[CONDUITS]\nC1  10  20  10\n\n[XSECTIONS]\nC1  CIRCULAR  10\n\n[COORDINATES]\n10  10  5\n20  10  10\n";
        let mut doc = NetworkFile::parse(text);
        assert_eq!(doc.rename_node("10", "10_m"), 3);
        assert_eq!(
            doc.parse_records("JUNCTIONS").unwrap(),
            vec![vec!["10_m", "10", "0"], vec!["20", "12", "0"]]
        );
        assert_eq!(doc.parse_records("CONDUITS").unwrap()[0], vec!["C1", "10_m", "20", "10"]);
        assert_eq!(doc.parse_records("XSECTIONS").unwrap()[0], vec!["C1", "CIRCULAR", "10"]);
        assert_eq!(
            doc.parse_records("COORDINATES").unwrap(),
            vec![vec!["10_m", "10", "5"], vec!["20", "10", "10"]]
        );
    }

    #[test]
    fn set_field_keeps_columns_aligned() {
        let mut rec = Record::parse("J1      10.5    0");
        rec.set_field(0, "J1_m");
        assert_eq!(rec.text(), "J1_m    10.5    0");
        rec.set_field(1, "9");
        assert_eq!(rec.text(), "J1_m    9       0");
        assert!(!rec.set_field(5, "x"));
    }

    #[test]
    fn inline_comment_is_not_a_field() {
        let rec = Record::parse("J1  10 ;upstream inlet");
        assert_eq!(rec.fields(), vec!["J1", "10"]);
    }

    #[test]
    fn insert_record_keeps_terminator() {
        let mut doc = NetworkFile::parse(SAMPLE);
        doc.insert_record("JUNCTIONS", 3, &["J2", "7"]).unwrap();
        assert!(doc.to_string().contains("J10     8\nJ2    7\n\n[CONDUITS]"));

        let err = doc.insert_record("JUNCTIONS", 99, &["J3", "1"]).unwrap_err();
        assert!(matches!(err, NetworkError::PositionOutOfRange { .. }));
    }

    #[test]
    fn new_section_is_indexed() {
        let mut doc = NetworkFile::parse(SAMPLE);
        doc.insert_section_after("JUNCTIONS", "TREATMENT", &[";;Node"])
            .unwrap();
        assert!(doc.has_section("TREATMENT"));
        assert!(
            doc.to_string()
                .contains("J10     8\n\n[TREATMENT]\n;;Node\n\n[CONDUITS]")
        );
    }
}
