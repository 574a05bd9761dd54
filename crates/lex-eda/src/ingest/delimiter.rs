//! Field delimiter detection for delimited text.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading bytes inspected for delimiter detection.
pub const DELIMITER_SAMPLE_BYTES: usize = 1_000;

/// Number of leading lines considered.
const SAMPLE_LINES: usize = 5;

/// Score multiplier for a delimiter with the same count on every line.
const CONSISTENCY_BONUS: usize = 10;

/// Candidate field delimiters, in tie-breaking order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
}

impl Delimiter {
    pub const CANDIDATES: [Delimiter; 4] = [
        Delimiter::Comma,
        Delimiter::Tab,
        Delimiter::Semicolon,
        Delimiter::Pipe,
    ];

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
            Delimiter::Semicolon => ';',
            Delimiter::Pipe => '|',
        }
    }

    pub fn as_byte(self) -> u8 {
        self.as_char() as u8
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Tab => f.write_str("\\t"),
            other => write!(f, "{}", other.as_char()),
        }
    }
}

/// Detect the field delimiter of a delimited-text buffer.
///
/// The sample is decoded with `encoding`; if that fails it is decoded as
/// UTF-8 with undecodable bytes dropped.
pub fn detect_delimiter(bytes: &[u8], encoding: &'static Encoding) -> Delimiter {
    let sample = &bytes[..bytes.len().min(DELIMITER_SAMPLE_BYTES)];
    let text = match encoding.decode_without_bom_handling_and_without_replacement(sample) {
        Some(text) => text.into_owned(),
        None => String::from_utf8_lossy(sample)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect(),
    };
    detect_delimiter_in_text(&text)
}

/// Score each candidate over the first lines of `text` and pick the best.
pub fn detect_delimiter_in_text(text: &str) -> Delimiter {
    let lines: Vec<&str> = text
        .split('\n')
        .take(SAMPLE_LINES)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut best = Delimiter::Comma;
    let mut best_score = 0usize;
    for candidate in Delimiter::CANDIDATES {
        let score = score_delimiter(&lines, candidate.as_char());
        // Strictly greater keeps the earliest candidate on ties.
        if score > best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}

fn score_delimiter(lines: &[&str], delimiter: char) -> usize {
    let counts: Vec<usize> = lines
        .iter()
        .map(|line| line.matches(delimiter).count())
        .collect();

    match counts.first() {
        None => 0,
        Some(&first) if first > 0 && counts.iter().all(|&c| c == first) => {
            first * CONSISTENCY_BONUS
        }
        Some(_) => counts.iter().sum(),
    }
}
