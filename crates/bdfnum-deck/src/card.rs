//! A single bulk data record and its text rendering.

use crate::lex::{parse_id, parse_int, RawCard};

const SMALL: usize = 8;
const LARGE: usize = 16;

/// One bulk data card.
///
/// Field 0 is the first data field (normally the primary ID). Every
/// small-field physical line holds 8 slots, so field `8 * k + c` is column `c`
/// of continuation line `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    name: String,
    fields: Vec<String>,
    comments: Vec<String>,
    lines: Vec<String>,
    modified: bool,
}

impl Card {
    /// Build a card programmatically. It has no source text and renders from fields.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            fields,
            comments: Vec::new(),
            lines: Vec::new(),
            modified: true,
        }
    }

    pub fn from_raw(raw: RawCard) -> Self {
        Self {
            name: raw.name,
            fields: raw.fields,
            comments: raw.comments,
            lines: raw.lines,
            modified: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field text, empty when the slot is past the end of the card.
    pub fn field(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn int(&self, idx: usize) -> Option<i64> {
        parse_int(self.field(idx))
    }

    /// Primary ID: field 0 as a positive integer.
    pub fn id(&self) -> Option<u32> {
        parse_id(self.field(0))
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Original physical lines (empty for programmatic cards).
    pub fn source_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_field(&mut self, idx: usize, value: impl Into<String>) {
        let value = value.into();
        if self.field(idx) == value {
            return;
        }
        if idx >= self.fields.len() {
            self.fields.resize(idx + 1, String::new());
        }
        self.fields[idx] = value;
        self.modified = true;
    }

    /// Replace every field from `start` on.
    pub fn replace_tail(&mut self, start: usize, values: Vec<String>) {
        if self.fields.len() > start && self.fields[start..] == values[..] {
            return;
        }
        self.fields.truncate(start);
        if self.fields.len() < start {
            self.fields.resize(start, String::new());
        }
        self.fields.extend(values);
        self.modified = true;
    }

    /// Text lines for this card: comments, then the card itself. Unmodified
    /// cards are reproduced from their source lines.
    pub fn render(&self) -> Vec<String> {
        let mut out = self.comments.clone();
        if !self.modified && !self.lines.is_empty() {
            out.extend(self.lines.iter().cloned());
        } else {
            out.extend(self.render_fields());
        }
        out
    }

    /// Render from fields, choosing the narrowest format every value fits.
    pub fn render_fields(&self) -> Vec<String> {
        let widest = self.fields.iter().map(|f| f.chars().count()).max().unwrap_or(0);
        if widest <= SMALL && self.name.len() < SMALL {
            self.render_fixed(SMALL)
        } else if widest <= LARGE && self.name.len() < SMALL {
            self.render_fixed(LARGE)
        } else {
            self.render_free()
        }
    }

    fn render_fixed(&self, width: usize) -> Vec<String> {
        let per_line = if width == SMALL { 8 } else { 4 };
        let (first, cont) = if width == SMALL {
            (self.name.clone(), "+".to_string())
        } else {
            (format!("{}*", self.name), "*".to_string())
        };

        let mut lines = Vec::new();
        let chunks: Vec<&[String]> = if self.fields.is_empty() {
            vec![&self.fields[..]]
        } else {
            self.fields.chunks(per_line).collect()
        };
        for (i, chunk) in chunks.into_iter().enumerate() {
            let lead = if i == 0 { &first } else { &cont };
            let mut line = format!("{:<8}", lead);
            for value in chunk {
                line.push_str(&format!("{:<width$}", value, width = width));
            }
            lines.push(line.trim_end().to_string());
        }
        lines
    }

    fn render_free(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let chunks: Vec<&[String]> = if self.fields.is_empty() {
            vec![&self.fields[..]]
        } else {
            self.fields.chunks(8).collect()
        };
        for (i, chunk) in chunks.into_iter().enumerate() {
            let lead = if i == 0 { self.name.as_str() } else { "+" };
            let mut line = lead.to_string();
            for value in chunk {
                line.push(',');
                line.push_str(value);
            }
            lines.push(line);
        }
        lines
    }
}
