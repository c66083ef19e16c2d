//! Field extraction from recognized text
//!
//! Splits the recognized text into positional fields, pads the field list to a
//! fixed width and decodes the composite date/issuer field.

use serde::{Deserialize, Serialize};

/// Minimum number of positions every field set exposes
pub const MIN_FIELDS: usize = 20;

/// Number of characters in the `YYYY.MM.DD` date prefix of a composite field
const DATE_WIDTH: usize = 10;

/// Split a recognized text blob into trimmed lines, one per document field.
///
/// Empty lines are kept so that positions stay aligned with the printed
/// layout. A trailing line break does not add an extra empty field.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(|line| line.trim().to_string()).collect()
}

/// Positional document fields with guaranteed minimum width
///
/// Positions the recognizer never produced hold `None`, which is distinct
/// from a line that was recognized as empty (`Some("")`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<Option<String>>,
}

impl FieldSet {
    /// Pad `lines` with absent markers up to `min_width` entries. Never truncates.
    ///
    /// A `min_width` below [`MIN_FIELDS`] is raised to it, so every field set
    /// exposes at least that many positions.
    pub fn normalize(lines: Vec<String>, min_width: usize) -> Self {
        let width = min_width.max(MIN_FIELDS);
        let mut fields: Vec<Option<String>> = lines.into_iter().map(Some).collect();
        if fields.len() < width {
            fields.resize(width, None);
        }
        Self { fields }
    }

    /// Split and normalize in one step using [`MIN_FIELDS`]
    pub fn from_text(text: &str) -> Self {
        Self::normalize(split_lines(text), MIN_FIELDS)
    }

    /// Field at `index`, `None` when absent
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(|f| f.as_deref())
    }

    /// Whether the position was filled by the recognizer
    pub fn is_present(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Total number of positions, including padding
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Number of positions that came from recognized text
    pub fn present_count(&self) -> usize {
        (0..self.len()).filter(|&idx| self.is_present(idx)).count()
    }
}

/// Date and issuer decoded from a single composite line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateIssuerPair {
    pub date: String,
    pub issuer: String,
}

/// Split a `YYYY.MM.DD <issuer>` field at fixed character offsets.
///
/// The first ten characters are taken as the date without validation, one
/// separator character is skipped and the rest is the issuer. Short input
/// yields whatever prefix exists and an empty issuer.
pub fn split_date_issuer(field: &str) -> DateIssuerPair {
    let date: String = field.chars().take(DATE_WIDTH).collect();
    let issuer: String = field.chars().skip(DATE_WIDTH + 1).collect();
    DateIssuerPair { date, issuer }
}

/// Kind of identity document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DriverLicense,
    GenericId,
}

impl DocumentType {
    /// Classify from the coded type in field 0.
    ///
    /// Any occurrence of '1' or '2' in the type field marks a driver license.
    /// This is a substring heuristic, not a code table lookup: a generic id
    /// whose type text happens to contain those digits is misclassified.
    pub fn classify(fields: &FieldSet) -> Self {
        let Some(type_field) = fields.get(0) else {
            return DocumentType::GenericId;
        };

        let lowered = type_field.to_lowercase();
        if lowered.contains('1') || lowered.contains('2') {
            DocumentType::DriverLicense
        } else {
            DocumentType::GenericId
        }
    }

    /// Storage table that holds records of this type
    pub fn table_name(&self) -> &'static str {
        match self {
            DocumentType::DriverLicense => "drivecard",
            DocumentType::GenericId => "idcard",
        }
    }
}
