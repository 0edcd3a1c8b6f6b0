//! Identity document field extraction from recognized text
//!
//! Parsing is total: text with nothing recognizable gives empty fields, never
//! an error.

pub mod fields;
pub mod gazetteer;
pub mod normalize;

use serde::{Deserialize, Serialize};

use fields::{first_match, run_name_rules, BIRTH_DATE_RULES, BIRTH_PLACE_RULES};

/// Nationality recorded for Turkish national ID cards
pub const NATIONAL_ID_NATIONALITY: &str = "T.C.";
/// Nationality recorded for Turkish passports
pub const PASSPORT_NATIONALITY: &str = "TUR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    NationalId,
    Passport,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::NationalId => "national_id",
            DocumentType::Passport => "passport",
        }
    }

    pub fn nationality(&self) -> &'static str {
        match self {
            DocumentType::NationalId => NATIONAL_ID_NATIONALITY,
            DocumentType::Passport => PASSPORT_NATIONALITY,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" | "national-id" | "national_id" => Ok(DocumentType::NationalId),
            "passport" => Ok(DocumentType::Passport),
            other => Err(format!("unknown document type: {} (expected id or passport)", other)),
        }
    }
}

/// The document's own number; which one depends on the document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentIdentifier {
    /// 11-digit national identity number
    #[serde(rename = "idNumber")]
    IdNumber(String),
    #[serde(rename = "documentNumber")]
    DocumentNumber(String),
}

impl DocumentIdentifier {
    pub fn empty(document_type: DocumentType) -> Self {
        Self::new(document_type, String::new())
    }

    pub fn new(document_type: DocumentType, value: String) -> Self {
        match document_type {
            DocumentType::NationalId => DocumentIdentifier::IdNumber(value),
            DocumentType::Passport => DocumentIdentifier::DocumentNumber(value),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            DocumentIdentifier::IdNumber(v) | DocumentIdentifier::DocumentNumber(v) => v,
        }
    }
}

/// Parsed personal data. Every field is present; unknown ones are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub name: String,
    pub surname: String,
    #[serde(flatten)]
    pub identifier: DocumentIdentifier,
    pub birth_date: String,
    pub birth_place: String,
    pub nationality: String,
}

impl ExtractedFields {
    /// All-empty fields for a document type (nationality still set)
    pub fn empty(document_type: DocumentType) -> Self {
        Self {
            name: String::new(),
            surname: String::new(),
            identifier: DocumentIdentifier::empty(document_type),
            birth_date: String::new(),
            birth_place: String::new(),
            nationality: document_type.nationality().to_string(),
        }
    }

    /// Whether anything was actually read off the document. Nationality is a
    /// constant per document type and does not count.
    pub fn has_data(&self) -> bool {
        !self.name.is_empty()
            || !self.surname.is_empty()
            || !self.identifier.value().is_empty()
            || !self.birth_date.is_empty()
            || !self.birth_place.is_empty()
    }
}

/// Raw recognized text to [`ExtractedFields`]
pub struct DocumentFieldParser;

impl DocumentFieldParser {
    pub fn parse(raw_text: &str, document_type: DocumentType) -> ExtractedFields {
        let text = normalize::normalize(raw_text);

        let identifier = first_match(fields::identifier_rules(document_type), &text)
            .map(|(_, v)| v)
            .unwrap_or_default();
        let names = run_name_rules(fields::name_rules(document_type), &text);
        let birth_date = first_match(BIRTH_DATE_RULES, &text).map(|(_, v)| v).unwrap_or_default();
        let birth_place = match first_match(BIRTH_PLACE_RULES, &text) {
            Some((rule, place)) => {
                log::debug!("[Rules] birth place from {}", rule);
                place
            }
            None => String::new(),
        };

        let fields = ExtractedFields {
            name: names.given.unwrap_or_default(),
            surname: names.surname.unwrap_or_default(),
            identifier: DocumentIdentifier::new(document_type, identifier),
            birth_date,
            birth_place,
            nationality: document_type.nationality().to_string(),
        };

        log::info!(
            "[Rules] parsed {} ({} chars): has_data={}",
            document_type,
            text.len(),
            fields.has_data()
        );
        fields
    }
}

pub fn parse(raw_text: &str, document_type: DocumentType) -> ExtractedFields {
    DocumentFieldParser::parse(raw_text, document_type)
}
