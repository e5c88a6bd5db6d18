use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use super::transcript_pair::{TranscriptCollection, TranscriptPair};
use crate::shared::constants::CSV_EXTENSION;

const FIELDS_PER_LINE: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("input is empty: expected a header line")]
    MissingHeader,
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line}: duplicate utterance id '{id}' (first seen on line {first_line})")]
    DuplicateId {
        line: usize,
        id: String,
        first_line: usize,
    },
}

impl ParseError {
    /// 1-based line number of the offending line, if there is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::MissingHeader => None,
            ParseError::Malformed { line, .. } | ParseError::DuplicateId { line, .. } => {
                Some(*line)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Separator {
    Comma,
    Tab,
}

impl Separator {
    /// `.csv` files are comma separated, everything else is tab separated.
    pub fn for_filename(filename: &str) -> Self {
        let is_csv = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(CSV_EXTENSION));
        if is_csv {
            Separator::Comma
        } else {
            Separator::Tab
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Separator::Comma => ',',
            Separator::Tab => '\t',
        }
    }
}

/// Parses delimited transcript text into labels and ordered transcript pairs.
///
/// The first non-blank line is the header; its second and third fields are
/// the column labels. Every later non-blank line must have exactly three
/// fields (`id`, `left`, `right`). Parsing stops at the first bad line.
pub fn parse(filename: &str, raw_text: &str) -> Result<TranscriptCollection, ParseError> {
    let sep = Separator::for_filename(filename).as_char();

    let mut lines = raw_text
        .split('\n')
        .map(str::trim)
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header) = lines.next().ok_or(ParseError::MissingHeader)?;
    let [_, label_left, label_right] = split_fields(header, sep, header_line)?;
    let labels = [label_left.to_string(), label_right.to_string()];

    let mut rows = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (line_no, line) in lines {
        let [id, left, right] = split_fields(line, sep, line_no)?;
        if id.is_empty() {
            return Err(ParseError::Malformed {
                line: line_no,
                reason: "empty utterance id".to_string(),
            });
        }
        if let Some(&first_line) = seen.get(id) {
            return Err(ParseError::DuplicateId {
                line: line_no,
                id: id.to_string(),
                first_line,
            });
        }
        seen.insert(id.to_string(), line_no);
        rows.push(TranscriptPair::new(id, left, right));
    }

    log::debug!("Parsed {} transcript pairs from {filename}", rows.len());

    Ok(TranscriptCollection {
        filename: filename.to_string(),
        labels,
        rows,
    })
}

fn split_fields(line: &str, sep: char, line_no: usize) -> Result<[&str; FIELDS_PER_LINE], ParseError> {
    let fields: Vec<&str> = line.split(sep).collect();
    match fields.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(ParseError::Malformed {
            line: line_no,
            reason: format!(
                "expected {FIELDS_PER_LINE} {}-separated fields, found {}",
                separator_name(sep),
                fields.len()
            ),
        }),
    }
}

fn separator_name(sep: char) -> &'static str {
    if sep == ',' {
        "comma"
    } else {
        "tab"
    }
}
